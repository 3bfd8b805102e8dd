use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::prefetch::PrefetchError;
use crate::sync::{SourceError, SyncError};
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] SourceError),

    #[error("Image fetcher error: {0}")]
    Prefetch(#[from] PrefetchError),

    #[error("Missing or invalid API key")]
    Unauthorized,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::Template(TemplateError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "TEMPLATE_NOT_FOUND")
            }
            AppError::Template(TemplateError::UnknownKind(_)) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_TEMPLATE_KIND")
            }
            AppError::Template(_) => (StatusCode::BAD_REQUEST, "INVALID_TEMPLATE"),
            AppError::Sync(SyncError::Source(SourceError::NotFound(_)))
            | AppError::Upstream(SourceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "TEMPLATE_NOT_FOUND")
            }
            AppError::Sync(SyncError::InvalidKey(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_TEMPLATE_KEY")
            }
            AppError::Sync(SyncError::Partial { .. }) => (StatusCode::NOT_FOUND, "PARTIAL_FETCH"),
            AppError::Sync(SyncError::NotSynced) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NOT_SYNCED")
            }
            AppError::Sync(_) | AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Prefetch(_) => (StatusCode::BAD_GATEWAY, "IMAGE_FETCH_ERROR"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let log_message = self.to_string();

        // Hide internals from clients in production, keep client errors verbatim
        let client_message = if status.is_server_error() && is_production() {
            status
                .canonical_reason()
                .unwrap_or("Internal server error")
                .to_string()
        } else {
            log_message.clone()
        };

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
