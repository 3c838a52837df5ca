//! Security subsystem: the edge request guard.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client.rs (resolve client id)
//!     → guard.rs  (session cookie, login lockout + window, CSRF)
//!         → store.rs (per-client state, one critical section per update)
//!     → Pass to upstream
//! Outgoing response:
//!     → cookies.rs, headers.rs (applied only when the request passed)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a failed check is a terminal response
//! - State is owned by the guard instance, never global
//! - The client id is a heuristic and not an authentication boundary

pub mod client;
pub mod cookies;
pub mod csrf;
pub mod error;
pub mod guard;
pub mod headers;
pub mod lockout;
pub mod rate_limit;
pub mod store;
pub mod sweep;

use chrono::{DateTime, TimeDelta, Utc};

pub use client::ClientId;
pub use error::GuardError;
pub use guard::{ClientSnapshot, EdgeGuard, RequestFacts, Verdict};
pub use lockout::{LoginOutcome, LoginStatus};
pub use store::{GuardStore, MemoryStore, SweepStats};
pub use sweep::Sweeper;

/// Whole seconds as a `TimeDelta`, saturating instead of panicking.
pub(crate) fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// `at + delta`, clamped to the latest representable instant.
pub(crate) fn deadline(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
