//! CSRF double-submit token.
//!
//! The token lives in a cookie and must be echoed in a request header on
//! state-changing requests. Nothing is stored server-side.

use std::collections::HashSet;

use axum::http::Method;
use rand::RngCore;

use crate::config::CsrfConfig;
use crate::security::error::GuardError;

/// Raw token length in bytes (hex-encoded on the wire).
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh token from the thread-local CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Which requests need a token.
#[derive(Debug, Clone)]
pub struct CsrfPolicy {
    exempt_paths: HashSet<String>,
    static_prefixes: Vec<String>,
}

impl CsrfPolicy {
    pub fn new(exempt_paths: HashSet<String>, static_prefixes: Vec<String>) -> Self {
        Self {
            exempt_paths,
            static_prefixes,
        }
    }

    pub fn from_config(config: &CsrfConfig) -> Self {
        Self::new(
            config.exempt_paths.iter().cloned().collect(),
            config.static_prefixes.clone(),
        )
    }

    /// Mutating requests need a token unless they target a static asset or an
    /// exempt path. Exemptions match the whole path, never a substring.
    pub fn requires_token(&self, method: &Method, path: &str) -> bool {
        is_mutating(method) && !self.is_static(path) && !self.exempt_paths.contains(path)
    }

    fn is_static(&self, path: &str) -> bool {
        self.static_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

pub fn is_mutating(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Both sides present, non-empty, byte-equal.
pub fn verify(header: Option<&str>, cookie: Option<&str>) -> Result<(), GuardError> {
    match (header, cookie) {
        (Some(h), Some(c)) if !h.is_empty() && constant_time_eq(h.as_bytes(), c.as_bytes()) => {
            Ok(())
        }
        _ => Err(GuardError::CsrfRejected),
    }
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
