//! Login failure tracking and lockout.
//!
//! # State machine
//! ```text
//! Clear --failure--> Accumulating(1)
//! Accumulating(n) --failure, n+1 < threshold--> Accumulating(n+1)
//! Accumulating(n) --failure, n+1 >= threshold--> Locked(expiry)
//! Locked --expiry elapses--> Clear        (lazily, on next check or sweep)
//! Accumulating(n) --idle for lockout--> Clear
//! Accumulating(n) --success--> Clear
//! ```
//!
//! Every transition to `Clear` is applied on access; the sweep only drops
//! entries that access would already treat as `Clear`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::config::LoginConfig;
use crate::security::{deadline, secs};

/// Per-client failed-login bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptState {
    pub failures: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_failure: DateTime<Utc>,
}

impl LoginAttemptState {
    pub fn lock_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until <= now)
    }
}

/// Observable login status of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoginStatus {
    Clear,
    Accumulating {
        failures: u32,
    },
    Locked {
        until: DateTime<Utc>,
    },
}

impl LoginStatus {
    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match self {
            LoginStatus::Locked { until } => Some(*until),
            _ => None,
        }
    }
}

/// Result reported back to the authentication handler after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub locked: bool,
    /// This failure is the one that set the lock.
    #[serde(skip)]
    pub newly_locked: bool,
    pub failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
}

/// Threshold and lock duration.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lockout: TimeDelta,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout: TimeDelta) -> Self {
        Self {
            max_attempts,
            lockout,
        }
    }

    pub fn from_config(config: &LoginConfig) -> Self {
        Self::new(config.max_attempts, secs(config.lockout_secs))
    }

    pub fn lockout(&self) -> TimeDelta {
        self.lockout
    }

    /// Current status; an elapsed lock or idle accumulation is cleared from the slot.
    pub fn status(&self, slot: &mut Option<LoginAttemptState>, now: DateTime<Utc>) -> LoginStatus {
        if slot.as_ref().is_some_and(|s| self.is_stale(s, now)) {
            *slot = None;
        }
        match slot {
            None => LoginStatus::Clear,
            Some(LoginAttemptState {
                locked_until: Some(until),
                ..
            }) => LoginStatus::Locked { until: *until },
            Some(state) => LoginStatus::Accumulating {
                failures: state.failures,
            },
        }
    }

    /// Record a failed credential check.
    ///
    /// A failure while a lock is live leaves the expiry untouched so every
    /// rejection during the lock reports the same timestamp.
    pub fn record_failure(
        &self,
        slot: &mut Option<LoginAttemptState>,
        now: DateTime<Utc>,
    ) -> LoginOutcome {
        if let LoginStatus::Locked { until } = self.status(slot, now) {
            let failures = slot.as_ref().map_or(0, |s| s.failures);
            return LoginOutcome {
                locked: true,
                newly_locked: false,
                failures,
                locked_until: Some(until),
            };
        }

        let state = slot.get_or_insert(LoginAttemptState {
            failures: 0,
            locked_until: None,
            last_failure: now,
        });
        state.failures = state.failures.saturating_add(1);
        state.last_failure = now;
        let newly_locked = state.failures >= self.max_attempts;
        if newly_locked {
            state.locked_until = Some(deadline(now, self.lockout));
        }

        LoginOutcome {
            locked: state.locked_until.is_some(),
            newly_locked,
            failures: state.failures,
            locked_until: state.locked_until,
        }
    }

    /// Whether this entry reads as `Clear`: an expired lock, or an unlocked
    /// accumulation idle for the lockout duration.
    pub fn is_stale(&self, state: &LoginAttemptState, now: DateTime<Utc>) -> bool {
        match state.locked_until {
            Some(_) => state.lock_expired(now),
            None => deadline(state.last_failure, self.lockout) <= now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, TimeDelta::minutes(15))
    }

    #[test]
    fn test_threshold_locks_for_lockout_duration() {
        let policy = policy();
        let mut slot = None;

        for n in 1..5 {
            let outcome = policy.record_failure(&mut slot, t0());
            assert!(!outcome.locked);
            assert_eq!(policy.status(&mut slot, t0()), LoginStatus::Accumulating { failures: n });
        }

        let outcome = policy.record_failure(&mut slot, t0());
        assert!(outcome.locked);
        assert_eq!(outcome.failures, 5);
        assert_eq!(outcome.locked_until, Some(t0() + TimeDelta::minutes(15)));
    }

    #[test]
    fn test_failure_during_lock_keeps_expiry() {
        let policy = policy();
        let mut slot = None;
        for _ in 0..5 {
            policy.record_failure(&mut slot, t0());
        }
        let later = t0() + TimeDelta::minutes(3);
        let outcome = policy.record_failure(&mut slot, later);
        assert_eq!(outcome.locked_until, Some(t0() + TimeDelta::minutes(15)));
        assert_eq!(
            policy.status(&mut slot, later),
            LoginStatus::Locked { until: t0() + TimeDelta::minutes(15) }
        );
    }

    #[test]
    fn test_lock_expires_lazily() {
        let policy = policy();
        let mut slot = None;
        for _ in 0..5 {
            policy.record_failure(&mut slot, t0());
        }
        let after = t0() + TimeDelta::minutes(15);
        assert_eq!(policy.status(&mut slot, after), LoginStatus::Clear);
        assert!(slot.is_none());

        let outcome = policy.record_failure(&mut slot, after);
        assert_eq!(outcome.failures, 1);
        assert!(!outcome.locked);
    }

    #[test]
    fn test_staleness() {
        let policy = policy();
        let state = LoginAttemptState {
            failures: 2,
            locked_until: None,
            last_failure: t0(),
        };
        assert!(!policy.is_stale(&state, t0() + TimeDelta::minutes(14)));
        assert!(policy.is_stale(&state, t0() + TimeDelta::minutes(15)));

        let locked = LoginAttemptState {
            locked_until: Some(t0() + TimeDelta::minutes(15)),
            ..state
        };
        assert!(!policy.is_stale(&locked, t0() + TimeDelta::minutes(10)));
        assert!(policy.is_stale(&locked, t0() + TimeDelta::minutes(15)));
    }

    #[test]
    fn test_idle_accumulation_decays_on_access() {
        let policy = policy();
        let mut slot = None;
        for _ in 0..4 {
            policy.record_failure(&mut slot, t0());
        }
        let later = t0() + TimeDelta::minutes(16);
        assert_eq!(policy.status(&mut slot.clone(), later), LoginStatus::Clear);

        let outcome = policy.record_failure(&mut slot, later);
        assert_eq!(outcome.failures, 1);
        assert!(!outcome.locked);
    }

    #[test]
    fn test_newly_locked_only_on_locking_failure() {
        let policy = policy();
        let mut slot = None;
        for _ in 0..4 {
            assert!(!policy.record_failure(&mut slot, t0()).newly_locked);
        }
        assert!(policy.record_failure(&mut slot, t0()).newly_locked);
        let again = policy.record_failure(&mut slot, t0() + TimeDelta::minutes(1));
        assert!(again.locked);
        assert!(!again.newly_locked);
    }

    #[test]
    fn test_oversized_lockout_clamps_expiry() {
        let policy = LockoutPolicy::from_config(&LoginConfig {
            lockout_secs: u64::MAX,
            ..LoginConfig::default()
        });
        let mut slot = None;
        let mut outcome = policy.record_failure(&mut slot, t0());
        for _ in 1..5 {
            outcome = policy.record_failure(&mut slot, t0());
        }
        assert_eq!(outcome.locked_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!policy.is_stale(slot.as_ref().unwrap(), t0() + TimeDelta::days(365)));
        assert_eq!(
            policy.status(&mut slot, t0()),
            LoginStatus::Locked { until: DateTime::<Utc>::MAX_UTC }
        );
    }
}
