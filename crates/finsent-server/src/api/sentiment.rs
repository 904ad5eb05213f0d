use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, time_range, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SentimentListItem {
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

#[derive(Debug, Serialize)]
pub(super) struct SentimentSummaryItem {
    pub model_name: String,
    pub article_count: i64,
    pub mean_signed_score: f64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct SentimentQuery {
    pub model: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub(super) async fn list_sentiment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SentimentQuery>,
) -> Result<Json<ApiResponse<Vec<SentimentListItem>>>, ApiError> {
    let range = time_range(&req_id.0, query.from, query.to)?;
    let rows = finsent_db::list_sentiment_by_model(
        &state.pool,
        query.model.as_deref(),
        range,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SentimentListItem {
            article_id: row.article_id,
            title: row.title,
            url: row.url,
            source_name: row.source_name,
            published_at: row.published_at,
            model_name: row.model_name,
            label: row.label,
            confidence: row.confidence,
            signed_score: row.signed_score,
            analyzed_at: row.analyzed_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn sentiment_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SentimentSummaryItem>>>, ApiError> {
    let rows = finsent_db::sentiment_summary_by_model(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SentimentSummaryItem {
            model_name: row.model_name,
            article_count: row.article_count,
            mean_signed_score: row.mean_signed_score,
            positive_count: row.positive_count,
            negative_count: row.negative_count,
            neutral_count: row.neutral_count,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
