//! Sentiment and entity analysis for financial news.
//!
//! Runs the configured models over batches of articles, maps their raw output
//! onto bounded labels and validated entity spans, and hands each finished
//! batch to a caller-provided sink for persistence.

pub mod error;
pub mod models;
pub mod normalize;
pub mod runner;
pub mod text;
pub mod types;

pub use error::{AnalysisError, NormalizeError};
pub use models::{
    build_model_set, build_ner_model, build_sentiment_model, lexicon_score, HostedClient,
    ModelSet, NerModel, SentimentModel,
};
pub use normalize::{company_names, is_company_name, normalize_entities, normalize_sentiment};
pub use runner::{BatchRunner, BatchSink, CollectSink, RunnerConfig};
pub use types::{
    AnalysisInput, ArticleEntities, ArticleSentiment, BatchOutcome, ModelSummary,
    NormalizedEntity, NormalizedSentiment, RawEntity, RawSentiment, SentimentLabel, Unscored,
};
