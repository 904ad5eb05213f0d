//! Idempotent writes of per-model analysis results.
//!
//! Every write is an upsert keyed on the table's uniqueness constraint, so
//! re-running a model over the same article updates rows in place instead
//! of adding new ones. One batch is written in one transaction.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::DbError;

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentWrite {
    pub article_id: i64,
    pub label: String,
    pub confidence: f64,
    pub signed_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityWrite {
    pub entity_text: String,
    pub entity_type: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub confidence: f64,
}

/// The complete entity list one model produced for one article.
///
/// The list replaces whatever that model stored for the article before;
/// an empty list clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleEntitiesWrite {
    pub article_id: i64,
    pub entities: Vec<EntityWrite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnscoredWrite {
    pub article_id: i64,
    pub error_message: String,
}

/// Results of one batch from one model run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWrite {
    pub model_run_id: i64,
    pub model_name: String,
    pub sentiments: Vec<SentimentWrite>,
    pub entities: Vec<ArticleEntitiesWrite>,
    pub unscored: Vec<UnscoredWrite>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWriteSummary {
    pub sentiment_rows: u64,
    pub entity_rows: u64,
    pub stale_entity_rows_removed: u64,
    pub unscored_rows: u64,
}

/// Writes one batch atomically.
///
/// Sentiment rows upsert on `(article_id, model_name)`, entity rows on
/// `(article_id, model_name, entity_index)`, and higher-indexed entity rows
/// left over from a previous run are deleted. Each scored article is
/// recorded in `scored_articles`; each failed one in `unscored_articles`.
/// Any failure rolls the whole batch back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails. A
/// reference to an unknown article violates a foreign key and fails the
/// batch.
pub async fn persist_batch(
    pool: &SqlitePool,
    batch: &BatchWrite,
) -> Result<BatchWriteSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = BatchWriteSummary::default();

    for sentiment in &batch.sentiments {
        summary.sentiment_rows += upsert_sentiment(&mut tx, batch, sentiment).await?;
        mark_scored(&mut tx, batch, sentiment.article_id).await?;
    }

    for article in &batch.entities {
        for (index, entity) in article.entities.iter().enumerate() {
            let entity_index = i64::try_from(index).unwrap_or(i64::MAX);
            summary.entity_rows +=
                upsert_entity(&mut tx, batch, article.article_id, entity_index, entity).await?;
        }
        let keep = i64::try_from(article.entities.len()).unwrap_or(i64::MAX);
        summary.stale_entity_rows_removed += sqlx::query(
            "DELETE FROM entity_results \
             WHERE article_id = ?1 AND model_name = ?2 AND entity_index >= ?3",
        )
        .bind(article.article_id)
        .bind(&batch.model_name)
        .bind(keep)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        mark_scored(&mut tx, batch, article.article_id).await?;
    }

    for unscored in &batch.unscored {
        summary.unscored_rows += sqlx::query(
            "INSERT INTO unscored_articles (model_run_id, article_id, error_message, recorded_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (model_run_id, article_id) DO UPDATE SET \
                 error_message = excluded.error_message, \
                 recorded_at = excluded.recorded_at",
        )
        .bind(batch.model_run_id)
        .bind(unscored.article_id)
        .bind(&unscored.error_message)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(summary)
}

async fn upsert_sentiment(
    conn: &mut SqliteConnection,
    batch: &BatchWrite,
    sentiment: &SentimentWrite,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "INSERT INTO sentiment_results \
             (article_id, model_name, label, confidence, signed_score, model_run_id, analyzed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT (article_id, model_name) DO UPDATE SET \
             label = excluded.label, \
             confidence = excluded.confidence, \
             signed_score = excluded.signed_score, \
             model_run_id = excluded.model_run_id, \
             analyzed_at = excluded.analyzed_at",
    )
    .bind(sentiment.article_id)
    .bind(&batch.model_name)
    .bind(&sentiment.label)
    .bind(sentiment.confidence)
    .bind(sentiment.signed_score)
    .bind(batch.model_run_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

async fn upsert_entity(
    conn: &mut SqliteConnection,
    batch: &BatchWrite,
    article_id: i64,
    entity_index: i64,
    entity: &EntityWrite,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "INSERT INTO entity_results \
             (article_id, model_name, entity_index, entity_text, entity_type, \
              start_offset, end_offset, confidence, model_run_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT (article_id, model_name, entity_index) DO UPDATE SET \
             entity_text = excluded.entity_text, \
             entity_type = excluded.entity_type, \
             start_offset = excluded.start_offset, \
             end_offset = excluded.end_offset, \
             confidence = excluded.confidence, \
             model_run_id = excluded.model_run_id",
    )
    .bind(article_id)
    .bind(&batch.model_name)
    .bind(entity_index)
    .bind(&entity.entity_text)
    .bind(&entity.entity_type)
    .bind(entity.start_offset)
    .bind(entity.end_offset)
    .bind(entity.confidence)
    .bind(batch.model_run_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

async fn mark_scored(
    conn: &mut SqliteConnection,
    batch: &BatchWrite,
    article_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO scored_articles (article_id, model_name, model_run_id, scored_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (article_id, model_name) DO UPDATE SET \
             model_run_id = excluded.model_run_id, \
             scored_at = excluded.scored_at",
    )
    .bind(article_id)
    .bind(&batch.model_name)
    .bind(batch.model_run_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Returns which of `article_ids` already have results from `model_name`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn scored_article_ids(
    pool: &SqlitePool,
    model_name: &str,
    article_ids: &[i64],
) -> Result<HashSet<i64>, DbError> {
    if article_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut builder: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new("SELECT article_id FROM scored_articles WHERE model_name = ");
    builder.push_bind(model_name);
    builder.push(" AND article_id IN (");
    let mut separated = builder.separated(", ");
    for id in article_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let ids = builder
        .build_query_scalar::<i64>()
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}
