use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Manual syncs allowed inside one cooldown window.
pub const MAX_SYNCS: usize = 3;
/// Length of the sliding window, in hours.
pub const COOLDOWN_HOURS: i64 = 3;

pub fn cooldown() -> Duration {
    Duration::hours(COOLDOWN_HOURS)
}

/// Persisted sliding window of recent sync start times.
///
/// `version` increases with every successful write and guards
/// compare-and-swap updates. An absent record has version 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub sync_timestamps: Vec<DateTime<Utc>>,
    pub version: i64,
}

impl RateLimitWindow {
    /// Timestamps strictly younger than the cooldown, oldest first.
    pub fn active_timestamps(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let cutoff = now - cooldown();
        let mut active: Vec<DateTime<Utc>> = self
            .sync_timestamps
            .iter()
            .copied()
            .filter(|ts| *ts > cutoff)
            .collect();
        active.sort();
        active
    }
}

/// Snapshot of the manual sync budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRateStatus {
    pub syncs_used: usize,
    pub syncs_remaining: usize,
    pub max_syncs: usize,
    pub can_sync: bool,
    pub cooldown_hours: i64,
    /// When the oldest active slot expires. Only set while the budget is exhausted.
    pub next_free_at: Option<DateTime<Utc>>,
    pub cooldown_seconds_remaining: i64,
}

impl SyncRateStatus {
    /// Status for `active` timestamps (already pruned, oldest first).
    pub fn from_active(active: &[DateTime<Utc>], now: DateTime<Utc>) -> Self {
        let syncs_used = active.len();
        let syncs_remaining = MAX_SYNCS.saturating_sub(syncs_used);
        let can_sync = syncs_used < MAX_SYNCS;

        let next_free_at = if can_sync {
            None
        } else {
            active.first().map(|oldest| *oldest + cooldown())
        };
        let cooldown_seconds_remaining = next_free_at
            .map(|free_at| (free_at - now).num_seconds().max(0))
            .unwrap_or(0);

        Self {
            syncs_used,
            syncs_remaining,
            max_syncs: MAX_SYNCS,
            can_sync,
            cooldown_hours: COOLDOWN_HOURS,
            next_free_at,
            cooldown_seconds_remaining,
        }
    }
}

/// Result of asking for a sync slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAdmission {
    /// A slot was reserved at `reserved_at`; `status` reflects the reservation.
    Granted {
        reserved_at: DateTime<Utc>,
        status: SyncRateStatus,
    },
    Rejected(SyncRateStatus),
}

/// Storage for the single global rate-limit window.
#[async_trait]
pub trait RateLimitStoreTrait: Send + Sync {
    fn load_window(&self) -> Result<Option<RateLimitWindow>>;

    /// Replace the stored timestamps only if the stored version still equals
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        expected_version: i64,
        sync_timestamps: Vec<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Delete the window, restoring the full budget.
    async fn clear(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_next_free_slot_only_when_exhausted() {
        let now = Utc::now();
        let active = vec![
            now - Duration::minutes(100),
            now - Duration::minutes(50),
            now - Duration::minutes(10),
        ];

        let exhausted = SyncRateStatus::from_active(&active, now);
        assert!(!exhausted.can_sync);
        assert_eq!(exhausted.syncs_remaining, 0);
        assert_eq!(exhausted.next_free_at, Some(active[0] + cooldown()));
        assert_eq!(exhausted.cooldown_seconds_remaining, 80 * 60);

        let open = SyncRateStatus::from_active(&active[1..], now);
        assert!(open.can_sync);
        assert_eq!(open.next_free_at, None);
        assert_eq!(open.cooldown_seconds_remaining, 0);
    }

    #[test]
    fn timestamps_at_the_cutoff_are_expired() {
        let now = Utc::now();
        let window = RateLimitWindow {
            sync_timestamps: vec![now - cooldown(), now - Duration::minutes(1)],
            version: 2,
        };
        assert_eq!(window.active_timestamps(now), vec![now - Duration::minutes(1)]);
    }
}
