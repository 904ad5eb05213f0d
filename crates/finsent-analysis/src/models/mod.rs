//! Model backends behind two small traits.
//!
//! Every backend exposes a batch entry point that returns exactly one output
//! per input, in input order. The runner relies on that contract and treats
//! any count mismatch as a failed batch.

mod hosted;
mod lexicon;
mod prompt;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use finsent_core::{ModelBackend, ModelKind, ModelSpec};

use crate::error::AnalysisError;
use crate::types::{RawEntity, RawSentiment};

pub use hosted::{HostedClient, HostedNerModel, HostedSentimentModel};
pub use lexicon::{lexicon_score, LexiconModel};
pub use prompt::{parse_generated_sentiment, PromptSentimentModel};

#[async_trait]
pub trait SentimentModel: Send + Sync + fmt::Debug {
    /// Registry name, stored in `model_name` columns.
    fn name(&self) -> &str;

    /// How many classes index labels (`LABEL_n`) range over.
    fn label_count(&self) -> u8 {
        3
    }

    /// Classify each text, returning one top-ranked label per input.
    async fn classify_batch(&self, texts: &[&str]) -> Result<Vec<RawSentiment>, AnalysisError>;
}

#[async_trait]
pub trait NerModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Extract grouped entities for each text, one list per input.
    async fn extract_batch(&self, texts: &[&str]) -> Result<Vec<Vec<RawEntity>>, AnalysisError>;
}

/// Models selected for one pipeline execution, in configured order.
#[derive(Debug, Default, Clone)]
pub struct ModelSet {
    pub sentiment: Vec<Arc<dyn SentimentModel>>,
    pub ner: Vec<Arc<dyn NerModel>>,
}

impl ModelSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sentiment.is_empty() && self.ner.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sentiment.len() + self.ner.len()
    }
}

/// Build a sentiment model from its registry entry.
///
/// # Errors
///
/// Returns [`AnalysisError::WrongKind`] if `spec` is not a sentiment model.
pub fn build_sentiment_model(
    spec: &'static ModelSpec,
    client: &HostedClient,
) -> Result<Arc<dyn SentimentModel>, AnalysisError> {
    match (spec.kind, spec.backend) {
        (ModelKind::Sentiment, ModelBackend::TextClassification { label_count }) => Ok(Arc::new(
            HostedSentimentModel::new(spec, label_count, client.clone()),
        )),
        (ModelKind::Sentiment, ModelBackend::TextGeneration) => {
            Ok(Arc::new(PromptSentimentModel::new(spec, client.clone())))
        }
        (ModelKind::Sentiment, ModelBackend::Lexicon) => Ok(Arc::new(LexiconModel::new(spec))),
        _ => Err(AnalysisError::WrongKind(
            spec.name.to_string(),
            ModelKind::Sentiment,
        )),
    }
}

/// Build a NER model from its registry entry.
///
/// # Errors
///
/// Returns [`AnalysisError::WrongKind`] if `spec` is not a NER model.
pub fn build_ner_model(
    spec: &'static ModelSpec,
    client: &HostedClient,
) -> Result<Arc<dyn NerModel>, AnalysisError> {
    match (spec.kind, spec.backend) {
        (ModelKind::Ner, ModelBackend::TokenClassification) => {
            Ok(Arc::new(HostedNerModel::new(spec, client.clone())))
        }
        _ => Err(AnalysisError::WrongKind(spec.name.to_string(), ModelKind::Ner)),
    }
}

/// Build every model in `sentiment` and `ner` against one shared client.
///
/// # Errors
///
/// Returns the first [`AnalysisError::WrongKind`] encountered.
pub fn build_model_set(
    sentiment: &[&'static ModelSpec],
    ner: &[&'static ModelSpec],
    client: &HostedClient,
) -> Result<ModelSet, AnalysisError> {
    Ok(ModelSet {
        sentiment: sentiment
            .iter()
            .map(|spec| build_sentiment_model(spec, client))
            .collect::<Result<_, _>>()?,
        ner: ner
            .iter()
            .map(|spec| build_ner_model(spec, client))
            .collect::<Result<_, _>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsent_core::find_model;

    fn client() -> HostedClient {
        HostedClient::new("http://localhost:9", None, 5).expect("client")
    }

    #[test]
    fn builds_every_registered_model() {
        let sentiment: Vec<_> = ["twitter-roberta", "distilbert-sst2", "llama-sentiment", "lexicon"]
            .iter()
            .map(|n| find_model(n).expect("registered"))
            .collect();
        let ner = vec![find_model("bert-base-ner").expect("registered")];
        let set = build_model_set(&sentiment, &ner, &client()).expect("model set");
        assert_eq!(set.len(), 5);
        assert_eq!(set.sentiment[1].name(), "distilbert-sst2");
        assert_eq!(set.sentiment[1].label_count(), 2);
        assert_eq!(set.ner[0].name(), "bert-base-ner");
    }

    #[test]
    fn ner_spec_is_not_a_sentiment_model() {
        let spec = find_model("bert-base-ner").expect("registered");
        let err = build_sentiment_model(spec, &client()).unwrap_err();
        assert!(matches!(err, AnalysisError::WrongKind(ref name, ModelKind::Sentiment) if name == "bert-base-ner"));
    }
}
