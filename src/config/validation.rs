//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges, names and
//! addresses. All errors are collected, not just the first.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{GuardConfig, PLACEHOLDER_API_KEY};

/// Upper bound for every configured duration (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_addr(&mut errors, "upstream.address", &config.upstream.address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_positive(&mut errors, "rate_limit.max_requests", config.rate_limit.max_requests as u64);
    check_positive(&mut errors, "login.max_attempts", config.login.max_attempts as u64);
    check_duration(&mut errors, "rate_limit.window_secs", config.rate_limit.window_secs);
    check_duration(&mut errors, "login.lockout_secs", config.login.lockout_secs);
    check_duration(&mut errors, "session.idle_timeout_secs", config.session.idle_timeout_secs);
    check_duration(&mut errors, "sweep.interval_secs", config.sweep.interval_secs);
    check_duration(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);
    check_duration(&mut errors, "timeouts.upstream_secs", config.timeouts.upstream_secs);

    check_path(&mut errors, "login.path", &config.login.path);
    for path in &config.csrf.exempt_paths {
        check_path(&mut errors, "csrf.exempt_paths", path);
    }
    for prefix in &config.csrf.static_prefixes {
        check_path(&mut errors, "csrf.static_prefixes", prefix);
    }
    check_path(&mut errors, "admin.path_prefix", &config.admin.path_prefix);

    for status in &config.login.failure_statuses {
        if !(100..=599).contains(status) {
            errors.push(ValidationError::new(
                "login.failure_statuses",
                format!("{} is not an HTTP status", status),
            ));
        }
    }

    check_cookie_name(&mut errors, "session.cookie_name", &config.session.cookie_name);
    check_cookie_name(&mut errors, "csrf.cookie_name", &config.csrf.cookie_name);
    if HeaderName::from_bytes(config.csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "csrf.header_name",
            format!("'{}' is not a valid header name", config.csrf.header_name),
        ));
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY)
    {
        errors.push(ValidationError::new(
            "admin.api_key",
            "must be set when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a socket address", value),
        ));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

fn check_duration(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 || value > MAX_DURATION_SECS {
        errors.push(ValidationError::new(
            field,
            format!("must be between 1 and {} seconds", MAX_DURATION_SECS),
        ));
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::new(
            field,
            format!("'{}' must start with '/'", value),
        ));
    }
}

// RFC 6265 cookie-name is an HTTP token.
fn check_cookie_name(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let is_token = !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        });
    if !is_token {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a valid cookie name", value),
        ));
    }
}
