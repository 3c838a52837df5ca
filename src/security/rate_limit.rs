//! Fixed-window rate limiting for the login endpoint.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::security::{deadline, secs};

/// Per-client counting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateWindow {
    fn fresh(now: DateTime<Utc>, window: TimeDelta) -> Self {
        Self {
            count: 1,
            reset_at: deadline(now, window),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.reset_at
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    Allowed { count: u32, reset_at: DateTime<Utc> },
    Exceeded { reset_at: DateTime<Utc> },
}

impl WindowDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, WindowDecision::Allowed { .. })
    }
}

/// Window length and per-window allowance.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    window: TimeDelta,
    max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(window: TimeDelta, max_requests: u32) -> Self {
        Self { window, max_requests }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(secs(config.window_secs), config.max_requests)
    }

    /// Count one request against the client's window slot.
    ///
    /// A missing or expired window restarts at 1. A live window at the limit
    /// rejects without incrementing.
    pub fn apply(&self, slot: &mut Option<RateWindow>, now: DateTime<Utc>) -> WindowDecision {
        if let Some(window) = slot.as_mut().filter(|w| !w.is_expired(now)) {
            if window.count >= self.max_requests {
                return WindowDecision::Exceeded {
                    reset_at: window.reset_at,
                };
            }
            window.count += 1;
            return WindowDecision::Allowed {
                count: window.count,
                reset_at: window.reset_at,
            };
        }

        let window = RateWindow::fresh(now, self.window);
        let decision = WindowDecision::Allowed {
            count: window.count,
            reset_at: window.reset_at,
        };
        *slot = Some(window);
        decision
    }
}
