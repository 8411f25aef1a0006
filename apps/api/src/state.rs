use std::sync::Arc;

use crate::config::Config;
use crate::matching::engine::MatchEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Catalog, encoder and embedding index, built once at startup.
    pub engine: Arc<MatchEngine>,
    pub config: Config,
}
