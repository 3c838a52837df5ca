//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, client identification).
    pub listener: ListenerConfig,

    /// Back-office application requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Login endpoint rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Login failure lockout policy.
    pub login: LoginConfig,

    /// Session cookie hardening.
    pub session: SessionConfig,

    /// CSRF token issuance and validation.
    pub csrf: CsrfConfig,

    /// Periodic eviction of expired guard state.
    pub sweep: SweepConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Derive the client id from the first `X-Forwarded-For` entry.
    ///
    /// The header is client-controlled. Only enable this behind a proxy that
    /// overwrites it.
    pub trust_forwarded_for: bool,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trust_forwarded_for: true,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Upstream (back-office) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Rate limiting configuration for the login endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Length of a counting window in seconds.
    pub window_secs: u64,

    /// Requests accepted per client within one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 10,
        }
    }
}

/// Login lockout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Path of the authentication endpoint.
    pub path: String,

    /// Consecutive failures before the client is locked.
    pub max_attempts: u32,

    /// Lock duration in seconds.
    pub lockout_secs: u64,

    /// Classify upstream responses on the login path as failures/successes.
    pub observe_upstream: bool,

    /// Upstream statuses counted as a failed credential check.
    pub failure_statuses: Vec<u16>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            path: "/api/auth/callback/credentials".to_string(),
            max_attempts: 5,
            lockout_secs: 15 * 60,
            observe_upstream: true,
            failure_statuses: vec![401],
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie re-asserted on every response.
    pub cookie_name: String,

    /// Session idle timeout in seconds (cookie Max-Age).
    pub idle_timeout_secs: u64,

    /// Production mode: cookies carry the `Secure` attribute.
    pub production: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            idle_timeout_secs: 30 * 60,
            production: true,
        }
    }
}

/// CSRF configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// Request header the token must be echoed in.
    pub header_name: String,

    /// Paths exempt from validation (exact match).
    pub exempt_paths: Vec<String>,

    /// Path prefixes treated as static assets.
    pub static_prefixes: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrf-token".to_string(),
            header_name: "x-csrf-token".to_string(),
            exempt_paths: vec!["/api/auth/callback/credentials".to_string()],
            static_prefixes: vec![
                "/_next/static/".to_string(),
                "/_next/image".to_string(),
                "/static/".to_string(),
                "/favicon.ico".to_string(),
            ],
        }
    }
}

/// Sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Run the periodic sweep.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time allowed for the upstream to answer, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 15,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder admin key; refused by validation while the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Path prefix the admin routes are mounted under.
    pub path_prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            path_prefix: "/_guard".to_string(),
        }
    }
}
