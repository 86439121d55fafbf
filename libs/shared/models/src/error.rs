use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    StateConflict(String),

    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StateConflict(_) => StatusCode::CONFLICT,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Caller-correctable errors carry their detail; the rest stay generic.
        let message = match &self {
            AppError::Auth(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::StateConflict(msg)
            | AppError::Authorization(msg) => {
                tracing::warn!("Request rejected: {}: {}", status, msg);
                msg.clone()
            }
            AppError::ExternalService(msg) => {
                tracing::error!("External service failure: {}", msg);
                "An upstream service is unavailable, please retry".to_string()
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence failure: {}", msg);
                "The request could not be stored, please retry".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
