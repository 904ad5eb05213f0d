use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article as delivered by a source adapter, before it has a database id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    /// Canonical article URL; the natural key for deduplication.
    pub url: String,
    pub title: String,
    /// Text handed to the models (title plus description for NewsAPI).
    pub content: String,
    /// Publisher name as reported by the feed, if any.
    pub source_name: Option<String>,
    pub published_at: DateTime<Utc>,
}
