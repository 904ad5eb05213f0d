//! Read-only queries behind the dashboard.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{DbError, TimeRange};

/// A row from `sentiment_results`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentResultRow {
    pub article_id: i64,
    pub model_name: String,
    pub label: String,
    pub confidence: f64,
    pub signed_score: f64,
    pub model_run_id: i64,
    pub analyzed_at: DateTime<Utc>,
}

/// A row from `entity_results`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntityResultRow {
    pub article_id: i64,
    pub model_name: String,
    pub entity_index: i64,
    pub entity_text: String,
    pub entity_type: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub confidence: f64,
    pub model_run_id: i64,
}

/// A sentiment result joined with its article.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentListRow {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub source_name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub model_name: String,
    pub label: String,
    pub confidence: f64,
    pub signed_score: f64,
    pub analyzed_at: DateTime<Utc>,
}

/// Aggregate sentiment for one model across every scored article.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelSentimentSummaryRow {
    pub model_name: String,
    pub article_count: i64,
    pub mean_signed_score: f64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopEntityRow {
    pub entity_text: String,
    pub entity_type: String,
    pub mention_count: i64,
    pub article_count: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TopEntitiesFilter<'a> {
    pub model_name: Option<&'a str>,
    pub entity_type: Option<&'a str>,
}

/// Every model's sentiment for one article.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sentiment_for_article(
    pool: &SqlitePool,
    article_id: i64,
) -> Result<Vec<SentimentResultRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentResultRow>(
        "SELECT article_id, model_name, label, confidence, signed_score, model_run_id, analyzed_at \
         FROM sentiment_results \
         WHERE article_id = ?1 \
         ORDER BY model_name",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every model's entities for one article, in span order per model.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_entities_for_article(
    pool: &SqlitePool,
    article_id: i64,
) -> Result<Vec<EntityResultRow>, DbError> {
    let rows = sqlx::query_as::<_, EntityResultRow>(
        "SELECT article_id, model_name, entity_index, entity_text, entity_type, \
                start_offset, end_offset, confidence, model_run_id \
         FROM entity_results \
         WHERE article_id = ?1 \
         ORDER BY model_name, entity_index",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Sentiment results joined with articles, newest articles first.
///
/// `model_name` and `range` narrow the result when given.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sentiment_by_model(
    pool: &SqlitePool,
    model_name: Option<&str>,
    range: TimeRange,
    limit: i64,
) -> Result<Vec<SentimentListRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentListRow>(
        "SELECT s.article_id, a.title, a.url, a.source_name, a.published_at, \
                s.model_name, s.label, s.confidence, s.signed_score, s.analyzed_at \
         FROM sentiment_results s \
         JOIN articles a ON a.id = s.article_id \
         WHERE (?1 IS NULL OR s.model_name = ?1) \
           AND (?2 IS NULL OR julianday(a.published_at) >= julianday(?2)) \
           AND (?3 IS NULL OR julianday(a.published_at) <= julianday(?3)) \
         ORDER BY julianday(a.published_at) DESC, s.article_id DESC, s.model_name \
         LIMIT ?4",
    )
    .bind(model_name)
    .bind(range.from)
    .bind(range.to)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every model's sentiment for the `article_limit` most recently published
/// scored articles, newest first.
///
/// The limit counts articles, so each returned article carries all of its
/// model rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_article_sentiment(
    pool: &SqlitePool,
    article_limit: i64,
) -> Result<Vec<SentimentListRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentListRow>(
        "WITH recent AS ( \
             SELECT a.id FROM articles a \
             WHERE EXISTS (SELECT 1 FROM sentiment_results s WHERE s.article_id = a.id) \
             ORDER BY julianday(a.published_at) DESC, a.id DESC \
             LIMIT ?1 \
         ) \
         SELECT s.article_id, a.title, a.url, a.source_name, a.published_at, \
                s.model_name, s.label, s.confidence, s.signed_score, s.analyzed_at \
         FROM sentiment_results s \
         JOIN articles a ON a.id = s.article_id \
         WHERE s.article_id IN (SELECT id FROM recent) \
         ORDER BY julianday(a.published_at) DESC, s.article_id DESC, s.model_name",
    )
    .bind(article_limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count, mean signed score, and label distribution per model.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sentiment_summary_by_model(
    pool: &SqlitePool,
) -> Result<Vec<ModelSentimentSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, ModelSentimentSummaryRow>(
        "SELECT model_name, \
                COUNT(*) AS article_count, \
                CAST(AVG(signed_score) AS REAL) AS mean_signed_score, \
                SUM(CASE WHEN label = 'positive' THEN 1 ELSE 0 END) AS positive_count, \
                SUM(CASE WHEN label = 'negative' THEN 1 ELSE 0 END) AS negative_count, \
                SUM(CASE WHEN label = 'neutral' THEN 1 ELSE 0 END) AS neutral_count \
         FROM sentiment_results \
         GROUP BY model_name \
         ORDER BY model_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Most frequently mentioned entities, optionally for one model or type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_entities(
    pool: &SqlitePool,
    filter: TopEntitiesFilter<'_>,
    limit: i64,
) -> Result<Vec<TopEntityRow>, DbError> {
    let rows = sqlx::query_as::<_, TopEntityRow>(
        "SELECT entity_text, entity_type, \
                COUNT(*) AS mention_count, \
                COUNT(DISTINCT article_id) AS article_count \
         FROM entity_results \
         WHERE (?1 IS NULL OR model_name = ?1) \
           AND (?2 IS NULL OR entity_type = ?2) \
         GROUP BY entity_text, entity_type \
         ORDER BY mention_count DESC, entity_text \
         LIMIT ?3",
    )
    .bind(filter.model_name)
    .bind(filter.entity_type)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
