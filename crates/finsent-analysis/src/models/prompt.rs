//! Sentiment from a general text-generation model via a fixed prompt.

use async_trait::async_trait;
use finsent_core::ModelSpec;

use super::hosted::HostedClient;
use super::SentimentModel;
use crate::error::AnalysisError;
use crate::types::RawSentiment;

const PROMPT_PREFIX: &str = "Analyze the sentiment of this financial news: ";
const PROMPT_SUFFIX: &str = "\nSentiment:";

/// Confidence assigned when the generated text names a polarity.
const POLAR_CONFIDENCE: f64 = 0.9;
/// Confidence assigned when it names neither.
const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Read a sentiment out of free-form generated text.
///
/// "positive" wins over "negative" when both appear; text mentioning
/// neither is neutral.
#[must_use]
pub fn parse_generated_sentiment(generated: &str) -> RawSentiment {
    let lowered = generated.to_lowercase();
    let (label, score) = if lowered.contains("positive") {
        ("positive", POLAR_CONFIDENCE)
    } else if lowered.contains("negative") {
        ("negative", POLAR_CONFIDENCE)
    } else {
        ("neutral", NEUTRAL_CONFIDENCE)
    };
    RawSentiment {
        label: label.to_string(),
        score,
    }
}

#[derive(Debug)]
pub struct PromptSentimentModel {
    spec: &'static ModelSpec,
    client: HostedClient,
}

impl PromptSentimentModel {
    #[must_use]
    pub fn new(spec: &'static ModelSpec, client: HostedClient) -> Self {
        Self { spec, client }
    }
}

#[async_trait]
impl SentimentModel for PromptSentimentModel {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<RawSentiment>, AnalysisError> {
        let prompts: Vec<String> = texts
            .iter()
            .map(|text| format!("{PROMPT_PREFIX}{text}{PROMPT_SUFFIX}"))
            .collect();
        let prompt_refs: Vec<&str> = prompts.iter().map(String::as_str).collect();

        let generated = self
            .client
            .generate(
                self.spec.name,
                self.spec.model_ref,
                &prompt_refs,
                serde_json::json!({ "max_new_tokens": 50, "return_full_text": false }),
            )
            .await?;

        Ok(generated
            .iter()
            .map(|g| parse_generated_sentiment(g))
            .collect())
    }
}
