//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::EngineError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client, before the engine was involved.
    BadRequest(String),
    /// Engine error carrying its own status mapping.
    Engine(EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(err) => engine_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn engine_error_to_response(err: EngineError) -> (StatusCode, String) {
    match &err {
        EngineError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        EngineError::ItemNotFound(_) | EngineError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        EngineError::InsufficientStock { .. } | EngineError::InvalidState { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        EngineError::Internal(store::StoreError::LockTimeout { .. }) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        EngineError::Internal(inner) => {
            tracing::error!(error = %inner, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        ApiError::Engine(EngineError::Internal(err))
    }
}
