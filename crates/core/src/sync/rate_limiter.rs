//! Global sliding-window budget for manual syncs.
//!
//! Storage failures never block a sync: an unreadable window counts as
//! empty and a failed write is logged and dropped.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::rate_limit_model::{RateLimitStoreTrait, RateLimitWindow, SyncAdmission, SyncRateStatus, MAX_SYNCS};
use crate::errors::Result;
use crate::utils::{Clock, SystemClock};

const MAX_CAS_ATTEMPTS: usize = MAX_SYNCS + 2;

pub struct RateLimiter {
    store: Arc<dyn RateLimitStoreTrait>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStoreTrait>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn RateLimitStoreTrait>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn load(&self) -> RateLimitWindow {
        match self.store.load_window() {
            Ok(Some(window)) => window,
            Ok(None) => RateLimitWindow::default(),
            Err(e) => {
                warn!("[RateLimit] Failed to read sync window, treating as empty: {}", e);
                RateLimitWindow::default()
            }
        }
    }

    /// Current budget. Expired timestamps are pruned from storage as a side effect.
    pub async fn status(&self) -> SyncRateStatus {
        let now = self.clock.now();
        let window = self.load();
        let active = window.active_timestamps(now);

        if active.len() != window.sync_timestamps.len() {
            match self.store.compare_and_swap(window.version, active.clone()).await {
                Ok(true) => debug!(
                    "[RateLimit] Pruned {} expired sync timestamp(s)",
                    window.sync_timestamps.len() - active.len()
                ),
                Ok(false) => debug!("[RateLimit] Window changed while pruning; skipped"),
                Err(e) => warn!("[RateLimit] Failed to prune sync window: {}", e),
            }
        }

        SyncRateStatus::from_active(&active, now)
    }

    /// Append the current time to the window unconditionally.
    pub async fn record_sync(&self) {
        let now = self.clock.now();
        for _ in 0..MAX_CAS_ATTEMPTS {
            let window = self.load();
            let mut active = window.active_timestamps(now);
            active.push(now);
            match self.store.compare_and_swap(window.version, active).await {
                Ok(true) => return,
                Ok(false) => continue,
                Err(e) if e.is_throttled() => {
                    warn!("[RateLimit] Store busy while recording sync; retrying: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("[RateLimit] Failed to record sync: {}", e);
                    return;
                }
            }
        }
        warn!("[RateLimit] Gave up recording sync after {} conflicting writes", MAX_CAS_ATTEMPTS);
    }

    /// Check the budget and reserve a slot in one atomic step.
    ///
    /// Concurrent callers can never be granted more than `MAX_SYNCS` slots
    /// inside one window. A store that stays busy for every attempt yields
    /// `Rejected`, never an unrecorded grant.
    pub async fn try_acquire(&self) -> SyncAdmission {
        let now = self.clock.now();
        let mut last_active = Vec::new();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let window = self.load();
            let active = window.active_timestamps(now);
            if active.len() >= MAX_SYNCS {
                info!("[RateLimit] Sync rejected: {}/{} slots used", active.len(), MAX_SYNCS);
                return SyncAdmission::Rejected(SyncRateStatus::from_active(&active, now));
            }

            let mut reserved = active.clone();
            reserved.push(now);
            match self.store.compare_and_swap(window.version, reserved.clone()).await {
                Ok(true) => {
                    return SyncAdmission::Granted {
                        reserved_at: now,
                        status: SyncRateStatus::from_active(&reserved, now),
                    }
                }
                Ok(false) => {
                    debug!("[RateLimit] Concurrent update while reserving a slot; retrying");
                    last_active = active;
                }
                Err(e) if e.is_throttled() => {
                    warn!("[RateLimit] Store busy while reserving a slot; retrying: {}", e);
                    last_active = active;
                }
                Err(e) => {
                    error!("[RateLimit] Failed to persist sync reservation: {}", e);
                    return SyncAdmission::Granted {
                        reserved_at: now,
                        status: SyncRateStatus::from_active(&reserved, now),
                    };
                }
            }
        }

        warn!("[RateLimit] Could not reserve a sync slot under contention");
        SyncAdmission::Rejected(SyncRateStatus::from_active(&last_active, now))
    }

    /// Return a slot reserved at `reserved_at` (used when a sync fails to run).
    pub async fn release(&self, reserved_at: DateTime<Utc>) {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let window = self.load();
            let Some(position) = window.sync_timestamps.iter().position(|ts| *ts == reserved_at) else {
                return;
            };
            let mut remaining = window.sync_timestamps.clone();
            remaining.remove(position);
            match self.store.compare_and_swap(window.version, remaining).await {
                Ok(true) => {
                    info!("[RateLimit] Released sync slot reserved at {}", reserved_at);
                    return;
                }
                Ok(false) => continue,
                Err(e) if e.is_throttled() => {
                    warn!("[RateLimit] Store busy while releasing a slot; retrying: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("[RateLimit] Failed to release sync slot: {}", e);
                    return;
                }
            }
        }
    }

    /// Clear the window entirely.
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        info!("[RateLimit] Sync window reset");
        Ok(())
    }
}
