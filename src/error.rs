// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the chart mail gateway

use crate::validator::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the HTTP caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("server not configured ({0})")]
    NotConfigured(&'static str),

    #[error("not found")]
    NotFound,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(ValidationError::PayloadTooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
