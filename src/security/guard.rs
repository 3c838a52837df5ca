//! The edge request guard.
//!
//! # Pipeline (fixed order)
//! ```text
//! 1. session cookie re-assertion      (never rejects)
//! 2. login path: lockout, then window (429)
//! 3. CSRF validation                  (403)
//! 4. CSRF token issuance              (never rejects)
//! 5. security headers                 (applied with the verdict)
//! ```
//!
//! A rejection short-circuits: none of the verdict's mutations are applied.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use serde::Serialize;

use crate::config::GuardConfig;
use crate::observability::metrics;
use crate::security::client::ClientId;
use crate::security::cookies::{append_set_cookie, read_cookie, CookieSettings};
use crate::security::csrf::{self, CsrfPolicy};
use crate::security::error::GuardError;
use crate::security::headers::apply_security_headers;
use crate::security::lockout::{LockoutPolicy, LoginOutcome, LoginStatus};
use crate::security::rate_limit::{RateLimitPolicy, RateWindow, WindowDecision};
use crate::security::store::{sweep_expired, GuardStore, MemoryStore, SweepStats};

const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";

/// What the guard needs to know about a request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: Method,
    pub path: String,
    pub client: ClientId,
    pub session_cookie: Option<String>,
    pub csrf_cookie: Option<String>,
    pub csrf_header: Option<String>,
}

/// Mutations to apply to a passed-through response.
#[derive(Debug, Default)]
pub struct Verdict {
    pub cookies: Vec<Cookie<'static>>,
    /// Token generated for this request, if the client had none.
    pub issued_csrf: Option<String>,
}

/// Everything tracked for one client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub client: String,
    pub window: Option<RateWindow>,
    pub login: LoginStatus,
}

/// Request guard with its own state store.
pub struct EdgeGuard<S = MemoryStore> {
    config: GuardConfig,
    store: S,
    rate_limit: RateLimitPolicy,
    lockout: LockoutPolicy,
    csrf: CsrfPolicy,
    cookies: CookieSettings,
    csrf_header: HeaderName,
}

impl EdgeGuard<MemoryStore> {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: GuardStore> EdgeGuard<S> {
    pub fn with_store(config: GuardConfig, store: S) -> Self {
        let csrf_header = HeaderName::from_bytes(config.csrf.header_name.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_CSRF_HEADER));
        Self {
            rate_limit: RateLimitPolicy::from_config(&config.rate_limit),
            lockout: LockoutPolicy::from_config(&config.login),
            csrf: CsrfPolicy::from_config(&config.csrf),
            cookies: CookieSettings::from_config(&config.session),
            csrf_header,
            store,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client_id(&self, request: &Request<Body>) -> ClientId {
        ClientId::from_request(request, self.config.listener.trust_forwarded_for)
    }

    pub fn facts(&self, request: &Request<Body>, client: ClientId) -> RequestFacts {
        let headers = request.headers();
        RequestFacts {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            client,
            session_cookie: non_empty(read_cookie(headers, &self.config.session.cookie_name)),
            csrf_cookie: non_empty(read_cookie(headers, &self.config.csrf.cookie_name)),
            csrf_header: headers
                .get(&self.csrf_header)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    pub fn is_login_path(&self, path: &str) -> bool {
        path == self.config.login.path
    }

    /// Run steps 1–4 for a request.
    pub fn inspect(&self, facts: &RequestFacts, now: DateTime<Utc>) -> Result<Verdict, GuardError> {
        let mut verdict = Verdict::default();

        if let Some(session) = &facts.session_cookie {
            verdict
                .cookies
                .push(self.cookies.session_cookie(&self.config.session.cookie_name, session));
        }

        if self.is_login_path(&facts.path) {
            self.check_login(&facts.client, now)?;
        }

        if self.csrf.requires_token(&facts.method, &facts.path) {
            csrf::verify(facts.csrf_header.as_deref(), facts.csrf_cookie.as_deref())?;
        }

        if facts.csrf_cookie.is_none() {
            let token = csrf::generate_token();
            verdict
                .cookies
                .push(self.cookies.csrf_cookie(&self.config.csrf.cookie_name, &token));
            verdict.issued_csrf = Some(token);
            metrics::record_csrf_issued();
        }

        Ok(verdict)
    }

    /// Step 5 plus the verdict's cookies.
    pub fn apply(&self, verdict: &Verdict, headers: &mut HeaderMap) {
        for cookie in &verdict.cookies {
            append_set_cookie(headers, cookie);
        }
        if let Some(token) = &verdict.issued_csrf {
            if let Ok(value) = HeaderValue::from_str(token) {
                headers.insert(self.csrf_header.clone(), value);
            }
        }
        apply_security_headers(headers);
    }

    fn check_login(&self, client: &ClientId, now: DateTime<Utc>) -> Result<(), GuardError> {
        let status = self
            .store
            .update_attempts(client, |slot| self.lockout.status(slot, now));
        if let LoginStatus::Locked { until } = status {
            return Err(GuardError::LockedOut { locked_until: until });
        }

        if !self.config.rate_limit.enabled {
            return Ok(());
        }
        match self
            .store
            .update_window(client, |slot| self.rate_limit.apply(slot, now))
        {
            WindowDecision::Allowed { .. } => Ok(()),
            WindowDecision::Exceeded { reset_at } => {
                tracing::debug!(client = %client, reset_at = %reset_at, "Login window exhausted");
                Err(GuardError::RateLimited)
            }
        }
    }

    /// Record a failed credential check for `client`.
    pub fn record_login_failure(&self, client: &ClientId, now: DateTime<Utc>) -> LoginOutcome {
        let outcome = self
            .store
            .update_attempts(client, |slot| self.lockout.record_failure(slot, now));

        if outcome.newly_locked {
            tracing::warn!(
                client = %client,
                failures = outcome.failures,
                locked_until = ?outcome.locked_until,
                "Client locked out after repeated login failures"
            );
            metrics::record_lockout();
        } else {
            tracing::info!(client = %client, failures = outcome.failures, "Login failure recorded");
        }
        outcome
    }

    /// Successful login: forget everything tracked for `client`.
    pub fn record_login_success(&self, client: &ClientId) {
        self.store.clear(client);
        tracing::debug!(client = %client, "Login succeeded, state cleared");
    }

    /// Classify an upstream response to the login path.
    ///
    /// Returns the lockout rejection when this failure locked the client.
    pub fn observe_login_response(
        &self,
        client: &ClientId,
        status: StatusCode,
        now: DateTime<Utc>,
    ) -> Option<GuardError> {
        if self.config.login.failure_statuses.contains(&status.as_u16()) {
            let outcome = self.record_login_failure(client, now);
            return outcome
                .locked_until
                .filter(|_| outcome.locked)
                .map(|locked_until| GuardError::LockedOut { locked_until });
        }
        if status.is_success() || status.is_redirection() {
            self.record_login_success(client);
        }
        None
    }

    pub fn login_status(&self, client: &ClientId, now: DateTime<Utc>) -> LoginStatus {
        self.store
            .update_attempts(client, |slot| self.lockout.status(slot, now))
    }

    /// Tracked state for `client`, `None` when nothing is held.
    pub fn snapshot(&self, client: &ClientId, now: DateTime<Utc>) -> Option<ClientSnapshot> {
        let window = self.store.window(client).filter(|w| !w.is_expired(now));
        let login = self.login_status(client, now);
        if window.is_none() && login == LoginStatus::Clear {
            return None;
        }
        Some(ClientSnapshot {
            client: client.to_string(),
            window,
            login,
        })
    }

    /// Manual unlock. Returns whether anything was tracked.
    pub fn unlock(&self, client: &ClientId) -> bool {
        let tracked = self.store.window(client).is_some() || self.store.attempts(client).is_some();
        self.store.clear(client);
        if tracked {
            tracing::info!(client = %client, "Client state cleared by admin");
        }
        tracked
    }

    /// Drop expired windows and stale login attempts.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepStats {
        let stats = sweep_expired(&self.store, now, |a| self.lockout.is_stale(a, now));
        let (windows, attempts) = self.store.tracked();
        metrics::record_tracked_clients(windows, attempts);
        tracing::debug!(
            windows_removed = stats.windows_removed,
            attempts_removed = stats.attempts_removed,
            windows,
            attempts,
            "Guard state swept"
        );
        stats
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
