//! Database operations for `model_runs` and `unscored_articles`.
//!
//! A run moves `queued -> running -> succeeded | failed`. Every transition is
//! a guarded `UPDATE ... WHERE status = ...`; an update that matches no row
//! is reported as [`DbError::InvalidModelRunTransition`].

use chrono::{DateTime, Utc};
use finsent_core::ModelKind;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `model_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub model_name: String,
    pub model_kind: String,
    pub model_ref: String,
    pub batch_size: i64,
    pub status: String,
    pub articles_requested: i64,
    pub articles_scored: i64,
    pub articles_unscored: i64,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An unscored article joined with its title and URL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnscoredArticleRow {
    pub model_run_id: i64,
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub error_message: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewModelRun<'a> {
    pub model_name: &'a str,
    pub model_kind: ModelKind,
    pub model_ref: &'a str,
    pub batch_size: usize,
}

const RUN_COLUMNS: &str = "id, public_id, model_name, model_kind, model_ref, batch_size, status, \
     articles_requested, articles_scored, articles_unscored, error_message, \
     started_at, completed_at, created_at";

/// Creates a new model run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_model_run(
    pool: &SqlitePool,
    run: &NewModelRun<'_>,
) -> Result<ModelRunRow, DbError> {
    let batch_size = i64::try_from(run.batch_size).unwrap_or(i64::MAX);

    let row = sqlx::query_as::<_, ModelRunRow>(&format!(
        "INSERT INTO model_runs \
             (public_id, model_name, model_kind, model_ref, batch_size, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(run.model_name)
    .bind(run.model_kind.as_str())
    .bind(run.model_ref)
    .bind(batch_size)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and records how many articles it was given.
///
/// # Errors
///
/// Returns [`DbError::InvalidModelRunTransition`] if the run is not `queued`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_model_run(
    pool: &SqlitePool,
    id: i64,
    articles_requested: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE model_runs \
         SET status = 'running', started_at = ?1, articles_requested = ?2 \
         WHERE id = ?3 AND status = 'queued'",
    )
    .bind(Utc::now())
    .bind(articles_requested)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidModelRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` with its final counts.
///
/// # Errors
///
/// Returns [`DbError::InvalidModelRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_model_run(
    pool: &SqlitePool,
    id: i64,
    articles_scored: i64,
    articles_unscored: i64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE model_runs \
         SET status = 'succeeded', completed_at = ?1, \
             articles_scored = ?2, articles_unscored = ?3 \
         WHERE id = ?4 AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(articles_scored)
    .bind(articles_unscored)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidModelRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `queued` or `running` run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidModelRunTransition`] if the run already
/// finished, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_model_run(
    pool: &SqlitePool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE model_runs \
         SET status = 'failed', completed_at = ?1, error_message = ?2 \
         WHERE id = ?3 AND status IN ('queued', 'running')",
    )
    .bind(Utc::now())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidModelRunTransition {
            id,
            expected_status: "queued or running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_model_run(pool: &SqlitePool, id: i64) -> Result<ModelRunRow, DbError> {
    sqlx::query_as::<_, ModelRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM model_runs WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_model_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<ModelRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ModelRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM model_runs \
         ORDER BY julianday(created_at) DESC, id DESC \
         LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists the articles a run could not score.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unscored_articles(
    pool: &SqlitePool,
    model_run_id: i64,
) -> Result<Vec<UnscoredArticleRow>, DbError> {
    let rows = sqlx::query_as::<_, UnscoredArticleRow>(
        "SELECT u.model_run_id, u.article_id, a.title, a.url, u.error_message, u.recorded_at \
         FROM unscored_articles u \
         JOIN articles a ON a.id = u.article_id \
         WHERE u.model_run_id = ?1 \
         ORDER BY u.article_id",
    )
    .bind(model_run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
