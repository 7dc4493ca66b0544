//! HTTP error handling and conversion.
//!
//! Application errors map onto status codes through
//! [`ApplicationError::http_status`]. Every error body has the shape
//! `{"error": CODE, "message": text, "request_id": id}`.

use crate::middleware::request_id::current_request_id;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use customer_analytics_application::ApplicationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// API-specific error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Application layer error
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Bad request
    #[error("{0}")]
    BadRequest(String),

    /// Unknown route
    #[error("Endpoint not found")]
    EndpointNotFound,

    /// Internal server error
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Application(err) => StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::EndpointNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API response
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Application(err) => err.error_code(),
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::EndpointNotFound => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Standardized error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub error: String,

    /// Human-readable message
    pub message: String,

    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Add request ID to the error response
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            let detail = match &self {
                Self::Internal(detail) => detail.clone(),
                other => other.to_string(),
            };
            error!(error_code, detail = %detail, "Request error");
        } else {
            warn!(error_code, message = %message, "Request rejected");
        }

        let mut body = ErrorResponse::new(error_code, message);
        if let Some(request_id) = current_request_id() {
            body = body.with_request_id(request_id);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
