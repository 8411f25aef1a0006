use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::matching::error::MatchError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Matching error: {0}")]
    Matching(#[from] MatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Matching(e @ (MatchError::IndexBuild(_) | MatchError::QueryEncoding(_))) => {
                tracing::error!("Encoder error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ENCODER_UNAVAILABLE",
                    "The embedding encoder is unavailable".to_string(),
                )
            }
            AppError::Matching(e @ MatchError::QueryDimension { .. }) => {
                tracing::error!("Index mismatch: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INDEX_MISMATCH",
                    "The embedding index does not match the encoder".to_string(),
                )
            }
            AppError::Matching(e @ MatchError::Catalog(_)) => {
                tracing::error!("Catalog error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CATALOG_ERROR",
                    "The job catalog is unavailable".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
