//! API response types
//!
//! Every endpoint answers with `{success: true, data, meta?}` or
//! `{success: false, error: {code, message, details?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error codes shared by all feature slices
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
    pub const PROCESSOR_UNAVAILABLE: &str = "PROCESSOR_UNAVAILABLE";
    pub const NOT_ELIGIBLE: &str = "NOT_ELIGIBLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }

    pub fn success_with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            meta: Some(meta),
        }
    }

    /// Serialize with an explicit status (201 for creations, 202 for accepted work)
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }

    pub fn validation(message: impl Into<String>) -> Response {
        Self::new(codes::VALIDATION_ERROR, message).with_status(StatusCode::BAD_REQUEST)
    }

    pub fn not_found(message: impl Into<String>) -> Response {
        Self::new(codes::NOT_FOUND, message).with_status(StatusCode::NOT_FOUND)
    }

    pub fn conflict(message: impl Into<String>) -> Response {
        Self::new(codes::CONFLICT, message).with_status(StatusCode::CONFLICT)
    }

    /// Log the underlying failure and answer with a generic 500
    pub fn internal(context: &str, error: &dyn std::fmt::Display) -> Response {
        tracing::error!(error = %error, "Database error during {}", context);
        Self::new(codes::INTERNAL_ERROR, "A database error occurred")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
