use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_path: PathBuf,
    /// `None` disables the on-disk index cache.
    pub index_cache_dir: Option<PathBuf>,
    /// OpenAI-compatible embeddings base URL; `None` selects the hashing encoder.
    pub encoder_url: Option<String>,
    pub encoder_model: String,
    pub encoder_api_key: Option<String>,
    pub encoder_dim: usize,
    pub encode_batch_size: usize,
    pub similarity_threshold: f32,
    pub browse_limit: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            catalog_path: PathBuf::from(require_env("CATALOG_PATH")?),
            index_cache_dir: match std::env::var("INDEX_CACHE_DIR") {
                Ok(dir) if dir.trim().is_empty() => None,
                Ok(dir) => Some(PathBuf::from(dir)),
                Err(_) => Some(PathBuf::from(".cache/jobmatch")),
            },
            encoder_url: optional_env("ENCODER_URL"),
            encoder_model: std::env::var("ENCODER_MODEL")
                .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
            encoder_api_key: optional_env("ENCODER_API_KEY"),
            encoder_dim: parse_env("ENCODER_DIM", 384)?,
            encode_batch_size: parse_env("ENCODE_BATCH_SIZE", 64)?,
            similarity_threshold: parse_env("SIMILARITY_THRESHOLD", 0.35)?,
            browse_limit: parse_env("BROWSE_LIMIT", 12)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}
