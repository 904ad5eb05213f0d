use std::fmt;

use serde::{Deserialize, Serialize};

/// One article handed to the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub article_id: i64,
    pub text: String,
}

/// Top-ranked label a sentiment model reported for one input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSentiment {
    pub label: String,
    pub score: f64,
}

/// One grouped entity as reported by a token-classification model.
///
/// Offsets are character positions into the input text. Some models omit
/// them; such entities are dropped during normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEntity {
    #[serde(alias = "entity")]
    pub entity_group: String,
    pub word: String,
    pub score: f64,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment mapped onto the bounded label set.
///
/// `confidence` is in `[0, 1]`; `signed_score` is `+confidence` for
/// positive, `-confidence` for negative and `0` for neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedSentiment {
    pub label: SentimentLabel,
    pub confidence: f64,
    pub signed_score: f64,
}

/// Entity span that passed validation. `start < end`, both in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEntity {
    pub text: String,
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
}

/// Article a model could not score, with the last error seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Unscored {
    pub article_id: i64,
    pub model_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSentiment {
    pub article_id: i64,
    pub sentiment: NormalizedSentiment,
}

/// Entities found in one article. An empty list still means "scored".
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleEntities {
    pub article_id: i64,
    pub entities: Vec<NormalizedEntity>,
}

/// Normalized results of one batch for one model.
///
/// Handed to the [`BatchSink`](crate::runner::BatchSink) as soon as the batch
/// finishes so it can be persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub model_name: String,
    pub batch_index: usize,
    pub sentiments: Vec<ArticleSentiment>,
    pub entities: Vec<ArticleEntities>,
    pub unscored: Vec<Unscored>,
}

impl BatchOutcome {
    pub(crate) fn new(model_name: &str, batch_index: usize) -> Self {
        Self {
            model_name: model_name.to_string(),
            batch_index,
            sentiments: Vec::new(),
            entities: Vec::new(),
            unscored: Vec::new(),
        }
    }

    /// Number of articles that received a result in this batch.
    #[must_use]
    pub fn scored_count(&self) -> usize {
        self.sentiments.len() + self.entities.len()
    }
}

/// Per-model totals after the runner has finished a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSummary {
    pub model_name: String,
    pub batches: usize,
    pub requested: usize,
    pub scored: usize,
    pub unscored: usize,
}
