//! Hardened cookie construction and request cookie lookup.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};

use crate::config::SessionConfig;

/// Attributes shared by every cookie the guard sets.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    secure: bool,
    idle_timeout_secs: i64,
}

impl CookieSettings {
    pub fn new(secure: bool, idle_timeout_secs: u64) -> Self {
        Self {
            secure,
            idle_timeout_secs: i64::try_from(idle_timeout_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.production, config.idle_timeout_secs)
    }

    fn hardened(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .build()
    }

    /// Session cookie re-asserted with `Max-Age` = idle timeout.
    pub fn session_cookie(&self, name: &str, value: &str) -> Cookie<'static> {
        let mut cookie = self.hardened(name.to_string(), value.to_string());
        cookie.set_max_age(CookieDuration::seconds(self.idle_timeout_secs));
        cookie
    }

    /// CSRF cookie, session-lived (no `Max-Age`).
    pub fn csrf_cookie(&self, name: &str, token: &str) -> Cookie<'static> {
        self.hardened(name.to_string(), token.to_string())
    }
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Append a `Set-Cookie` header. Values that cannot be encoded are skipped.
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => {
            tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie");
        }
    }
}
