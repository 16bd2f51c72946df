//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by an endpoint pipeline or its HTTP boundary.
///
/// Business operations return this type too, so their errors travel through
/// every outer middleware unchanged.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("ERR-104:policy enforcement failed: {0}")]
    Enforcement(String),

    #[error("ERR-102:user not authorised")]
    NotAuthorized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) | AppError::Enforcement(_) => StatusCode::UNAUTHORIZED,
            AppError::NotAuthorized => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) | AppError::JsonError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError | AppError::Configuration(_) | AppError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether a circuit breaker should count this error against the
    /// downstream dependency. Rejections caused by the caller do not.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(
            self,
            AppError::Authentication(_)
                | AppError::NotAuthorized
                | AppError::BadRequest(_)
                | AppError::NotFound(_)
                | AppError::RateLimited
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::InternalServerError => self.to_string(),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                "Internal server error".to_string()
            }
            AppError::JsonError(err) => {
                tracing::error!("JSON error: {:?}", err);
                "Invalid JSON data".to_string()
            }
            AppError::Enforcement(msg) => {
                tracing::warn!("Policy enforcement error: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
