use axum::{
    extract::{Query, State},
    Extension, Json,
};
use finsent_analysis::is_company_name;
use finsent_db::TopEntitiesFilter;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

/// Rows scanned before the company filter is applied.
const COMPANY_SCAN_LIMIT: i64 = 500;

#[derive(Debug, Serialize)]
pub(super) struct TopEntityItem {
    pub text: String,
    pub entity_type: String,
    pub mention_count: i64,
    pub article_count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct TopEntitiesQuery {
    pub model: Option<String>,
    pub entity_type: Option<String>,
    /// Keep only ORG entities that look like company names.
    #[serde(default)]
    pub companies: bool,
    pub limit: Option<i64>,
}

pub(super) async fn top_entities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TopEntitiesQuery>,
) -> Result<Json<ApiResponse<Vec<TopEntityItem>>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let entity_type = if query.companies {
        Some("ORG")
    } else {
        query.entity_type.as_deref()
    };
    let filter = TopEntitiesFilter {
        model_name: query.model.as_deref(),
        entity_type,
    };
    let scan_limit = if query.companies {
        COMPANY_SCAN_LIMIT
    } else {
        limit
    };

    let rows = finsent_db::top_entities(&state.pool, filter, scan_limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .filter(|row| !query.companies || is_company_name(&row.entity_text))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|row| TopEntityItem {
            text: row.entity_text,
            entity_type: row.entity_type,
            mention_count: row.mention_count,
            article_count: row.article_count,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
