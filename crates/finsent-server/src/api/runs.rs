use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ModelRunItem {
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

#[derive(Debug, Serialize)]
pub(super) struct UnscoredItem {
    pub article_id: i64,
    pub title: String,
    pub url: String,
    pub error_message: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<ModelRunItem>>>, ApiError> {
    let rows = finsent_db::list_model_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ModelRunItem {
            id: row.id,
            public_id: row.public_id,
            model_name: row.model_name,
            model_kind: row.model_kind,
            model_ref: row.model_ref,
            batch_size: row.batch_size,
            status: row.status,
            articles_requested: row.articles_requested,
            articles_scored: row.articles_scored,
            articles_unscored: row.articles_unscored,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_unscored(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<UnscoredItem>>>, ApiError> {
    // 404 for an unknown run rather than an empty list.
    finsent_db::get_model_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let rows = finsent_db::list_unscored_articles(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| UnscoredItem {
            article_id: row.article_id,
            title: row.title,
            url: row.url,
            error_message: row.error_message,
            recorded_at: row.recorded_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
