//! Unified error handling
//!
//! `GatewayError` covers calls to the AI gateway, `FlowError` is what the
//! dashboard flows return, and `ApiError` turns either into a consistent JSON
//! response at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::session::OperationKind;

const GENERIC_GATEWAY_MESSAGE: &str = "An unknown error occurred while communicating with the AI service. Please check your connection and try again.";

/// Failure talking to the AI gateway. Never retried.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("AI gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI gateway returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("AI gateway blocked the response: {0}")]
    Blocked(String),

    #[error("AI gateway returned no content")]
    EmptyResponse,

    #[error("AI gateway returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl GatewayError {
    /// Human-readable message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => {
                let lower = message.to_lowercase();
                if lower.contains("api key not valid") {
                    "The provided API key is invalid or has expired.".to_string()
                } else if lower.contains("quota") {
                    "You have exceeded your API request quota.".to_string()
                } else {
                    GENERIC_GATEWAY_MESSAGE.to_string()
                }
            }
            _ => GENERIC_GATEWAY_MESSAGE.to_string(),
        }
    }
}

/// Errors surfaced by the dashboard flows.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(String),

    #[error("Task '{0}' not found in the dashboard")]
    TaskNotFound(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("No dashboard has been generated or loaded in this session")]
    NoDocument,

    #[error("A {0} request is already in progress for this session")]
    Busy(OperationKind),

    #[error("Session was closed before the request completed")]
    SessionClosed,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Storage error")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::BadGateway(_) => "AI_GATEWAY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::BadGateway(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Validation(_) | FlowError::UnsupportedFile(_) | FlowError::NoDocument => {
                Self::BadRequest(err.to_string())
            }
            FlowError::TaskNotFound(_) | FlowError::SessionClosed => Self::NotFound(err.to_string()),
            FlowError::Busy(_) => Self::Conflict(err.to_string()),
            FlowError::Gateway(e) => {
                tracing::warn!(error = %e, "AI gateway call failed");
                Self::BadGateway(e.user_message())
            }
            FlowError::Storage(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log internal errors
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None, // Will be populated by middleware if available
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
