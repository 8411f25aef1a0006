mod config;
mod errors;
mod matching;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::matching::catalog::Catalog;
use crate::matching::encoder::{Encoder, HashEncoder, HttpEncoder};
use crate::matching::engine::MatchEngine;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobMatch API v{}", env!("CARGO_PKG_VERSION"));

    // Load the job catalog
    let catalog = Catalog::from_path(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {}", config.catalog_path.display()))?;

    // Initialize encoder (hashing encoder unless ENCODER_URL is set)
    let encoder = build_encoder(&config)?;
    info!("Encoder initialized (model: {})", encoder.model_id());

    let engine = Arc::new(MatchEngine::new(
        catalog,
        encoder,
        config.index_cache_dir.clone(),
        config.similarity_threshold,
    ));

    // Warm the index; a failure here is retried lazily on the first semantic query
    match engine.warm_up().await {
        Ok(status) => info!(
            "Index ready: {} jobs, dimension {}",
            status.jobs, status.dimension
        ),
        Err(e) => warn!("Index warm-up failed, will retry on first query: {e}"),
    }

    // Build app state
    let state = AppState {
        engine,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Picks the remote embeddings encoder when configured, the local hashing encoder otherwise.
fn build_encoder(config: &Config) -> Result<Arc<dyn Encoder>> {
    match &config.encoder_url {
        Some(url) => {
            let encoder = HttpEncoder::new(
                url,
                config.encoder_model.clone(),
                config.encoder_api_key.clone(),
                config.encode_batch_size,
            )
            .context("Failed to build HTTP encoder")?;
            Ok(Arc::new(encoder))
        }
        None => Ok(Arc::new(HashEncoder::new(config.encoder_dim))),
    }
}
