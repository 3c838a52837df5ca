//! Guard state storage.
//!
//! The store owns the two per-client maps and provides the critical section
//! every update runs in. Policies (`rate_limit`, `lockout`) stay pure and
//! operate on the slot the store hands them.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::security::client::ClientId;
use crate::security::lockout::LoginAttemptState;
use crate::security::rate_limit::RateWindow;

/// Counts of entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepStats {
    pub windows_removed: usize,
    pub attempts_removed: usize,
}

/// Storage for per-client guard state.
///
/// Implementations must run each `update_*` closure atomically with respect
/// to other updates of the same client id and to `retain_*`.
pub trait GuardStore: Send + Sync + 'static {
    /// Read-check-write a client's rate window. Leaving the slot `None`
    /// removes the entry.
    fn update_window<R>(
        &self,
        client: &ClientId,
        f: impl FnOnce(&mut Option<RateWindow>) -> R,
    ) -> R;

    /// Read-check-write a client's login attempt state.
    fn update_attempts<R>(
        &self,
        client: &ClientId,
        f: impl FnOnce(&mut Option<LoginAttemptState>) -> R,
    ) -> R;

    fn window(&self, client: &ClientId) -> Option<RateWindow>;

    fn attempts(&self, client: &ClientId) -> Option<LoginAttemptState>;

    /// Drop every entry held for a client.
    fn clear(&self, client: &ClientId);

    /// Keep only the windows for which `keep` returns true.
    fn retain_windows(&self, keep: impl FnMut(&RateWindow) -> bool) -> usize;

    /// Keep only the attempt states for which `keep` returns true.
    fn retain_attempts(&self, keep: impl FnMut(&LoginAttemptState) -> bool) -> usize;

    /// Number of tracked (windows, attempt states).
    fn tracked(&self) -> (usize, usize);
}

/// In-process store backed by sharded concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: DashMap<ClientId, RateWindow>,
    attempts: DashMap<ClientId, LoginAttemptState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// The entry guard holds the shard write lock for the whole closure.
fn update_entry<V: Clone, R>(
    map: &DashMap<ClientId, V>,
    client: &ClientId,
    f: impl FnOnce(&mut Option<V>) -> R,
) -> R {
    match map.entry(client.clone()) {
        Entry::Occupied(mut entry) => {
            let mut slot = Some(entry.get().clone());
            let result = f(&mut slot);
            match slot {
                Some(value) => *entry.get_mut() = value,
                None => {
                    entry.remove();
                }
            }
            result
        }
        Entry::Vacant(entry) => {
            let mut slot = None;
            let result = f(&mut slot);
            if let Some(value) = slot {
                entry.insert(value);
            }
            result
        }
    }
}

fn retain_counting<V>(map: &DashMap<ClientId, V>, mut keep: impl FnMut(&V) -> bool) -> usize {
    let mut removed = 0;
    map.retain(|_, value| {
        let kept = keep(value);
        if !kept {
            removed += 1;
        }
        kept
    });
    removed
}

impl GuardStore for MemoryStore {
    fn update_window<R>(
        &self,
        client: &ClientId,
        f: impl FnOnce(&mut Option<RateWindow>) -> R,
    ) -> R {
        update_entry(&self.windows, client, f)
    }

    fn update_attempts<R>(
        &self,
        client: &ClientId,
        f: impl FnOnce(&mut Option<LoginAttemptState>) -> R,
    ) -> R {
        update_entry(&self.attempts, client, f)
    }

    fn window(&self, client: &ClientId) -> Option<RateWindow> {
        self.windows.get(client).map(|r| r.value().clone())
    }

    fn attempts(&self, client: &ClientId) -> Option<LoginAttemptState> {
        self.attempts.get(client).map(|r| r.value().clone())
    }

    fn clear(&self, client: &ClientId) {
        self.windows.remove(client);
        self.attempts.remove(client);
    }

    fn retain_windows(&self, keep: impl FnMut(&RateWindow) -> bool) -> usize {
        retain_counting(&self.windows, keep)
    }

    fn retain_attempts(&self, keep: impl FnMut(&LoginAttemptState) -> bool) -> usize {
        retain_counting(&self.attempts, keep)
    }

    fn tracked(&self) -> (usize, usize) {
        (self.windows.len(), self.attempts.len())
    }
}

/// Remove expired windows and stale attempt states.
pub fn sweep_expired<S: GuardStore>(
    store: &S,
    now: DateTime<Utc>,
    attempt_is_stale: impl Fn(&LoginAttemptState) -> bool,
) -> SweepStats {
    SweepStats {
        windows_removed: store.retain_windows(|w| !w.is_expired(now)),
        attempts_removed: store.retain_attempts(|a| !attempt_is_stale(a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_update_inserts_and_removes() {
        let store = MemoryStore::new();
        let client = ClientId::new("1.2.3.4");

        store.update_window(&client, |slot| {
            *slot = Some(RateWindow { count: 1, reset_at: t0() });
        });
        assert_eq!(store.window(&client).unwrap().count, 1);

        store.update_window(&client, |slot| *slot = None);
        assert!(store.window(&client).is_none());

        // Closure that leaves a vacant slot empty inserts nothing.
        store.update_attempts(&client, |_| ());
        assert_eq!(store.tracked(), (0, 0));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = MemoryStore::new();
        let live = ClientId::new("live");
        let dead = ClientId::new("dead");
        store.update_window(&live, |s| {
            *s = Some(RateWindow { count: 3, reset_at: t0() + TimeDelta::seconds(30) })
        });
        store.update_window(&dead, |s| {
            *s = Some(RateWindow { count: 3, reset_at: t0() })
        });
        store.update_attempts(&dead, |s| {
            *s = Some(LoginAttemptState { failures: 5, locked_until: Some(t0()), last_failure: t0() })
        });

        let stats = sweep_expired(&store, t0(), |a| a.lock_expired(t0()));
        assert_eq!(stats, SweepStats { windows_removed: 1, attempts_removed: 1 });
        assert!(store.window(&live).is_some());
        assert_eq!(store.tracked(), (1, 0));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_increments() {
        let store = Arc::new(MemoryStore::new());
        let client = ClientId::new("1.2.3.4");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let client = client.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.update_window(&client, |slot| {
                            let w = slot.get_or_insert(RateWindow { count: 0, reset_at: t0() });
                            w.count += 1;
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.window(&client).unwrap().count, 8000);
    }
}
