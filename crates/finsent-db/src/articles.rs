//! Database operations for the `articles` table.

use chrono::{DateTime, Utc};
use finsent_core::NewArticle;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::DbError;

/// A row from the `articles` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: String,
    pub source_name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// Optional inclusive bounds on `published_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

const ARTICLE_COLUMNS: &str =
    "id, url, title, content, source_name, published_at, fetched_at";

/// Inserts an article, or returns the id of the stored article with the same URL.
///
/// A known URL leaves the stored row untouched: articles are immutable once
/// stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_article(pool: &SqlitePool, article: &NewArticle) -> Result<i64, DbError> {
    // The no-op update makes RETURNING yield the existing id on conflict.
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO articles (url, title, content, source_name, published_at, fetched_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT (url) DO UPDATE SET url = articles.url \
         RETURNING id",
    )
    .bind(&article.url)
    .bind(&article.title)
    .bind(&article.content)
    .bind(article.source_name.as_deref())
    .bind(article.published_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a single article by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_article(pool: &SqlitePool, id: i64) -> Result<ArticleRow, DbError> {
    sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches the articles with the given ids, ordered by id. Unknown ids are
/// ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_articles_by_ids(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<ArticleRow>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<'_, Sqlite> =
        QueryBuilder::new(format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id IN ("));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let rows = builder
        .build_query_as::<ArticleRow>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Lists the most recently published articles, optionally within `range`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_articles(
    pool: &SqlitePool,
    range: TimeRange,
    limit: i64,
) -> Result<Vec<ArticleRow>, DbError> {
    let rows = sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles \
         WHERE (?1 IS NULL OR julianday(published_at) >= julianday(?1)) \
           AND (?2 IS NULL OR julianday(published_at) <= julianday(?2)) \
         ORDER BY julianday(published_at) DESC, id DESC \
         LIMIT ?3"
    ))
    .bind(range.from)
    .bind(range.to)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
