//! # API Errors
//!
//! Every failure leaves the service as `{"error": <message>}` with a 4xx or
//! 5xx status. Database failures carry only a generic message; the driver
//! error is logged where it happens.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use super::rate_limit::RateLimit;
use crate::quiz::ValidationError;

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by HTTP handlers
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Malformed, missing or out-of-range input
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Client exceeded a rate limit of the route
    #[error("Rate limit exceeded: {limit}")]
    RateLimited {
        limit: RateLimit,
        retry_after: Duration,
    },

    /// No route matched
    #[error("Not found")]
    NotFound,

    // ==================
    // Server Errors (5xx)
    // ==================
    /// No connection could be acquired
    #[error("Database unavailable")]
    DatabaseUnavailable,

    /// A statement failed; the message names the operation only
    #[error("{0}")]
    Query(&'static str),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::DatabaseUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();

        if let ApiError::RateLimited { retry_after, .. } = self {
            // Round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
