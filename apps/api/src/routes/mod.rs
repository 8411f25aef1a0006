pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::matching::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs API
        .route("/api/v1/jobs", get(handlers::handle_browse))
        .route("/api/v1/jobs/search", post(handlers::handle_search))
        .route("/api/v1/jobs/:id", get(handlers::handle_get_job))
        // Index API
        .route("/api/v1/index/status", get(handlers::handle_index_status))
        .route("/api/v1/index/rebuild", post(handlers::handle_index_rebuild))
        .with_state(state)
}
