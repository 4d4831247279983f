//! Response envelope and error mapping
//!
//! Every API response is `{"data": …}` on success or `{"error": "…"}` on
//! failure with the appropriate status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::errors::{AppError, TranscoderError};

/// Wrap a payload in the success envelope
pub fn data<T: Serialize>(value: T) -> Json<serde_json::Value> {
    Json(json!({ "data": value }))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Transcoder(TranscoderError::NotRunning(_)) => StatusCode::NOT_FOUND,
            AppError::Transcoder(TranscoderError::AlreadyRunning(_)) => StatusCode::CONFLICT,
            AppError::Transcoder(_)
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
