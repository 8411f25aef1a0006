//! Error taxonomy for the matching core.
//!
//! An empty result list is never an error: "no matches" is `Ok(vec![])`.

use std::path::PathBuf;

use thiserror::Error;

/// The job catalog could not be read or holds no jobs.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog graph: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog contains no job nodes")]
    NoJobNodes,
}

/// The external encoder failed or returned an unusable payload.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Encoder API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Encoder response parse error: {0}")]
    Parse(String),

    #[error("Encoder returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

/// Building the embedding index failed. Any previously built index stays in place.
#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("Encoder failed during index build: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Encoder returned {got} rows for {expected} job sentences")]
    RowCountMismatch { expected: usize, got: usize },

    #[error("Inconsistent embedding dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Disk-cache read/write failure. Recovered locally: logged, never surfaced.
#[derive(Debug, Error)]
pub enum CacheIoError {
    #[error("Index cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index cache codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Index cache blob is corrupt: {0}")]
    Corrupt(String),
}

/// Failure of a search operation. Callers must not conflate this with an empty result.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    IndexBuild(#[from] IndexBuildError),

    #[error("Query encoding failed: {0}")]
    QueryEncoding(#[source] EncoderError),

    #[error("Query vector has dimension {got}, index has {expected}")]
    QueryDimension { expected: usize, got: usize },
}
