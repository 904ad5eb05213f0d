use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use finsent_db::{ArticleRow, EntityResultRow, SentimentResultRow};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, time_range, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ArticleItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub source_name: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl From<ArticleRow> for ArticleItem {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            title: row.title,
            source_name: row.source_name,
            published_at: row.published_at,
            fetched_at: row.fetched_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SentimentItem {
    pub model_name: String,
    pub label: String,
    pub confidence: f64,
    pub signed_score: f64,
    pub model_run_id: i64,
    pub analyzed_at: DateTime<Utc>,
}

impl From<SentimentResultRow> for SentimentItem {
    fn from(row: SentimentResultRow) -> Self {
        Self {
            model_name: row.model_name,
            label: row.label,
            confidence: row.confidence,
            signed_score: row.signed_score,
            model_run_id: row.model_run_id,
            analyzed_at: row.analyzed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct EntityItem {
    pub model_name: String,
    pub text: String,
    pub entity_type: String,
    pub start: i64,
    pub end: i64,
    pub confidence: f64,
}

impl From<EntityResultRow> for EntityItem {
    fn from(row: EntityResultRow) -> Self {
        Self {
            model_name: row.model_name,
            text: row.entity_text,
            entity_type: row.entity_type,
            start: row.start_offset,
            end: row.end_offset,
            confidence: row.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ArticleDetail {
    #[serde(flatten)]
    pub article: ArticleItem,
    pub content: String,
    pub sentiment: Vec<SentimentItem>,
    pub entities: Vec<EntityItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ArticlesQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub(super) async fn list_articles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<ApiResponse<Vec<ArticleItem>>>, ApiError> {
    let range = time_range(&req_id.0, query.from, query.to)?;
    let rows = finsent_db::list_articles(&state.pool, range, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(ArticleItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn get_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ArticleDetail>>, ApiError> {
    let row = finsent_db::get_article(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let sentiment = finsent_db::list_sentiment_for_article(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let entities = finsent_db::list_entities_for_article(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let content = row.content.clone();
    let data = ArticleDetail {
        article: ArticleItem::from(row),
        content,
        sentiment: sentiment.into_iter().map(SentimentItem::from).collect(),
        entities: entities.into_iter().map(EntityItem::from).collect(),
    };
    Ok(Json(ApiResponse::new(data, req_id.0)))
}
