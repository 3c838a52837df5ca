//! Guard error taxonomy and rejection responses.
//!
//! Every guard-level error is terminal: it becomes the response as-is, with a
//! JSON payload `{ "error": ..., "lockedUntil"?: ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Request window exhausted for this client.
    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// Too many failed logins; carries the lock expiry so clients can back off.
    #[error("Too many failed login attempts. Please try again later.")]
    LockedOut { locked_until: DateTime<Utc> },

    /// Missing or mismatched CSRF token. Deliberately does not say which side.
    #[error("Invalid CSRF token")]
    CsrfRejected,

    #[error("Not found")]
    NotFound,

    /// Transport failure talking to the upstream.
    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::RateLimited | GuardError::LockedOut { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GuardError::CsrfRejected => StatusCode::FORBIDDEN,
            GuardError::NotFound => StatusCode::NOT_FOUND,
            GuardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GuardError::RateLimited => "rate_limited",
            GuardError::LockedOut { .. } => "locked_out",
            GuardError::CsrfRejected => "csrf_rejected",
            GuardError::NotFound => "not_found",
            GuardError::Upstream(_) => "upstream_failure",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error = match self {
            // Transport details stay in the logs.
            GuardError::Upstream(_) => "Upstream request failed".to_string(),
            other => other.to_string(),
        };
        let locked_until = match self {
            GuardError::LockedOut { locked_until } => Some(format_timestamp(locked_until)),
            _ => None,
        };
        ErrorBody { error, locked_until }
    }
}

/// Machine-readable rejection payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<String>,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
