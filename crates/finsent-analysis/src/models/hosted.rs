//! Client for hosted inference endpoints (`POST {base}/models/{model_ref}`).

use std::time::Duration;

use async_trait::async_trait;
use finsent_core::ModelSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{NerModel, SentimentModel};
use crate::error::AnalysisError;
use crate::types::{RawEntity, RawSentiment};

/// Longest error body kept in an [`AnalysisError::Inference`] message.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a [&'a str],
    parameters: Value,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Batched endpoints answer with one list per input; single-input calls
/// sometimes come back flat.
#[derive(Deserialize)]
#[serde(untagged)]
enum PerInput<T> {
    Batched(Vec<Vec<T>>),
    Flat(Vec<T>),
}

impl<T> PerInput<T> {
    fn into_batched(self, input_count: usize) -> Vec<Vec<T>> {
        match self {
            PerInput::Batched(outputs) if outputs.is_empty() && input_count == 1 => vec![vec![]],
            PerInput::Batched(outputs) => outputs,
            PerInput::Flat(outputs) if input_count == 1 => vec![outputs],
            PerInput::Flat(outputs) => outputs.into_iter().map(|o| vec![o]).collect(),
        }
    }
}

/// Shared HTTP client for every hosted model. Cheap to clone.
#[derive(Clone)]
pub struct HostedClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl std::fmt::Debug for HostedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedClient")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .finish_non_exhaustive()
    }
}

impl HostedClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("finsent/0.1 (financial-news-sentiment)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Post `texts` to one hosted model and decode one output list per input.
    async fn infer<T: DeserializeOwned>(
        &self,
        model_name: &str,
        model_ref: &str,
        texts: &[&str],
        parameters: Value,
    ) -> Result<Vec<Vec<T>>, AnalysisError> {
        let url = format!("{}/models/{model_ref}", self.base_url);
        let request = InferenceRequest {
            inputs: texts,
            parameters,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| body.chars().take(MAX_ERROR_BODY_CHARS).collect());
            return Err(AnalysisError::Inference {
                model: model_name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let outputs = serde_json::from_str::<PerInput<T>>(&body)
            .map_err(|source| AnalysisError::Deserialize {
                model: model_name.to_string(),
                source,
            })?
            .into_batched(texts.len());

        if outputs.len() != texts.len() {
            return Err(AnalysisError::CountMismatch {
                model: model_name.to_string(),
                expected: texts.len(),
                got: outputs.len(),
            });
        }
        Ok(outputs)
    }

    /// Text-generation call; returns the generated text per input.
    pub(crate) async fn generate(
        &self,
        model_name: &str,
        model_ref: &str,
        prompts: &[&str],
        parameters: Value,
    ) -> Result<Vec<String>, AnalysisError> {
        #[derive(Deserialize)]
        struct Generated {
            generated_text: String,
        }

        let outputs: Vec<Vec<Generated>> = self
            .infer(model_name, model_ref, prompts, parameters)
            .await?;
        outputs
            .into_iter()
            .map(|candidates| {
                candidates
                    .into_iter()
                    .next()
                    .map(|g| g.generated_text)
                    .ok_or_else(|| AnalysisError::EmptyOutput {
                        model: model_name.to_string(),
                    })
            })
            .collect()
    }
}

/// Hosted text-classification sentiment model.
#[derive(Debug)]
pub struct HostedSentimentModel {
    spec: &'static ModelSpec,
    label_count: u8,
    client: HostedClient,
}

impl HostedSentimentModel {
    #[must_use]
    pub fn new(spec: &'static ModelSpec, label_count: u8, client: HostedClient) -> Self {
        Self {
            spec,
            label_count,
            client,
        }
    }
}

#[async_trait]
impl SentimentModel for HostedSentimentModel {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn label_count(&self) -> u8 {
        self.label_count
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<RawSentiment>, AnalysisError> {
        let outputs: Vec<Vec<RawSentiment>> = self
            .client
            .infer(
                self.spec.name,
                self.spec.model_ref,
                texts,
                serde_json::json!({ "truncation": true }),
            )
            .await?;

        outputs
            .into_iter()
            .map(|candidates| {
                candidates
                    .into_iter()
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .ok_or_else(|| AnalysisError::EmptyOutput {
                        model: self.spec.name.to_string(),
                    })
            })
            .collect()
    }
}

/// Hosted token-classification NER model with simple entity grouping.
#[derive(Debug)]
pub struct HostedNerModel {
    spec: &'static ModelSpec,
    client: HostedClient,
}

impl HostedNerModel {
    #[must_use]
    pub fn new(spec: &'static ModelSpec, client: HostedClient) -> Self {
        Self { spec, client }
    }
}

#[async_trait]
impl NerModel for HostedNerModel {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn extract_batch(&self, texts: &[&str]) -> Result<Vec<Vec<RawEntity>>, AnalysisError> {
        self.client
            .infer(
                self.spec.name,
                self.spec.model_ref,
                texts,
                serde_json::json!({ "aggregation_strategy": "simple" }),
            )
            .await
    }
}
