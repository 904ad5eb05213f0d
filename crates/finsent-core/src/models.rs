//! Registry of the sentiment and NER models the pipeline knows how to run.

use std::fmt;

use serde::Serialize;

use crate::ConfigError;

/// What a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Sentiment,
    Ner,
}

impl ModelKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Sentiment => "sentiment",
            ModelKind::Ner => "ner",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a model is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// Hosted text-classification endpoint. `label_count` decides how
    /// index labels (`LABEL_0`, ...) map onto sentiment labels.
    TextClassification { label_count: u8 },
    /// Hosted text-generation endpoint driven by a sentiment prompt.
    TextGeneration,
    /// Hosted token-classification endpoint with grouped entities.
    TokenClassification,
    /// Built-in finance lexicon scorer; runs offline.
    Lexicon,
}

/// One entry of [`MODEL_REGISTRY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Short name used in config, CLI flags, and the `model_name` columns.
    pub name: &'static str,
    pub kind: ModelKind,
    pub backend: ModelBackend,
    /// Hosted model identifier, or a versioned tag for built-in models.
    pub model_ref: &'static str,
}

pub const MODEL_REGISTRY: &[ModelSpec] = &[
    ModelSpec {
        name: "twitter-roberta",
        kind: ModelKind::Sentiment,
        backend: ModelBackend::TextClassification { label_count: 3 },
        model_ref: "cardiffnlp/twitter-roberta-base-sentiment-latest",
    },
    ModelSpec {
        name: "distilbert-sst2",
        kind: ModelKind::Sentiment,
        backend: ModelBackend::TextClassification { label_count: 2 },
        model_ref: "distilbert-base-uncased-finetuned-sst-2-english",
    },
    ModelSpec {
        name: "finbert",
        kind: ModelKind::Sentiment,
        backend: ModelBackend::TextClassification { label_count: 3 },
        model_ref: "yiyanghkust/finbert-tone",
    },
    ModelSpec {
        name: "llama-sentiment",
        kind: ModelKind::Sentiment,
        backend: ModelBackend::TextGeneration,
        model_ref: "meta-llama/Llama-2-7b-chat-hf",
    },
    ModelSpec {
        name: "lexicon",
        kind: ModelKind::Sentiment,
        backend: ModelBackend::Lexicon,
        model_ref: "finsent/lexicon-v1",
    },
    ModelSpec {
        name: "bert-base-ner",
        kind: ModelKind::Ner,
        backend: ModelBackend::TokenClassification,
        model_ref: "dslim/bert-base-NER",
    },
    ModelSpec {
        name: "bert-large-ner",
        kind: ModelKind::Ner,
        backend: ModelBackend::TokenClassification,
        model_ref: "dslim/bert-large-NER",
    },
];

/// Look up a model by its short name.
#[must_use]
pub fn find_model(name: &str) -> Option<&'static ModelSpec> {
    MODEL_REGISTRY.iter().find(|spec| spec.name == name)
}

/// Split a comma-separated model list, trimming blanks and dropping
/// duplicates while keeping first-seen order.
#[must_use]
pub fn parse_model_list(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }
    names
}

/// Resolve model names of one kind against the registry.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownModel`] for a name that is not registered
/// or is registered under the other kind.
pub fn resolve_models(
    names: &[String],
    kind: ModelKind,
) -> Result<Vec<&'static ModelSpec>, ConfigError> {
    names
        .iter()
        .map(|name| {
            find_model(name)
                .filter(|spec| spec.kind == kind)
                .ok_or_else(|| ConfigError::UnknownModel {
                    name: name.clone(),
                    kind,
                    known: known_names(kind),
                })
        })
        .collect()
}

fn known_names(kind: ModelKind) -> String {
    MODEL_REGISTRY
        .iter()
        .filter(|spec| spec.kind == kind)
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}
