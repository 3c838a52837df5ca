//! Periodic eviction of expired guard state.
//!
//! # Responsibilities
//! - Bound the memory held by the per-client maps
//! - Stop cleanly when the shutdown signal fires
//!
//! Skipping sweeps never changes guard decisions; expired entries are
//! already ignored or cleared lazily on access.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::security::guard::EdgeGuard;
use crate::security::store::GuardStore;

pub struct Sweeper<S> {
    guard: Arc<EdgeGuard<S>>,
    interval: Duration,
}

impl<S: GuardStore> Sweeper<S> {
    pub fn new(guard: Arc<EdgeGuard<S>>, interval: Duration) -> Self {
        Self { guard, interval }
    }

    pub fn from_config(guard: Arc<EdgeGuard<S>>) -> Self {
        let interval = Duration::from_secs(guard.config().sweep.interval_secs);
        Self::new(guard, interval)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Guard sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing to sweep yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.guard.sweep(Utc::now());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Guard sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
