//! Axum route handlers for the Jobs and Index APIs.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::matching::catalog::JobRecord;
use crate::matching::index::IndexStatus;
use crate::matching::normalize::normalize;
use crate::matching::strategy::{MatchResult, RankingMode, SearchRequest};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<MatchResult>,
    pub total: usize,
    pub mode: RankingMode,
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub country: Option<String>,
    pub city: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub jobs: Vec<JobRecord>,
    pub total: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/search
///
/// Ranks the catalog against a free-text skills query.
/// An empty `results` list means "no matches", never a failure.
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if request.query_text.trim().is_empty() {
        return Err(AppError::Validation("query_text cannot be empty".to_string()));
    }
    if normalize(&request.query_text).is_empty() {
        return Err(AppError::Validation(
            "query_text has no searchable characters".to_string(),
        ));
    }
    if request.top_n == 0 {
        return Err(AppError::Validation("top_n must be at least 1".to_string()));
    }

    let results = state.engine.search(&request).await?;

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        mode: request.mode,
    }))
}

/// GET /api/v1/jobs?country=&city=&limit=
///
/// Lists jobs at a location without skill scoring.
pub async fn handle_browse(
    State(state): State<AppState>,
    Query(params): Query<BrowseQuery>,
) -> Json<BrowseResponse> {
    let limit = params.limit.unwrap_or(state.config.browse_limit);
    let jobs = state
        .engine
        .browse(params.country.as_deref(), params.city.as_deref(), limit);
    Json(BrowseResponse {
        total: jobs.len(),
        jobs,
    })
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .engine
        .catalog()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// GET /api/v1/index/status
pub async fn handle_index_status(State(state): State<AppState>) -> Json<IndexStatus> {
    Json(state.engine.index_status())
}

/// POST /api/v1/index/rebuild
///
/// Forces a full re-encode of the catalog. The previous index keeps serving if it fails.
pub async fn handle_index_rebuild(
    State(state): State<AppState>,
) -> Result<Json<IndexStatus>, AppError> {
    Ok(Json(state.engine.rebuild().await?))
}
