use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::{BatchWriteReport, CampaignMetric, LookbackWindow};
use crate::Platform;

/// Accounts processed concurrently across the units of one run.
pub const SYNC_WORKER_CONCURRENCY: usize = 3;

/// One `(platform, window)` pair of a full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUnit {
    pub platform: Platform,
    pub window: LookbackWindow,
}

impl SyncUnit {
    /// Every platform crossed with every window.
    pub fn all() -> Vec<SyncUnit> {
        Platform::ALL
            .iter()
            .flat_map(|platform| {
                LookbackWindow::ALL.iter().map(move |window| SyncUnit {
                    platform: *platform,
                    window: *window,
                })
            })
            .collect()
    }
}

/// Why an account produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum EmptyReason {
    NoData,
    NotConfigured(String),
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AccountFetchOutcome {
    Fetched {
        account_id: String,
        rows: usize,
    },
    Empty {
        account_id: String,
        reason: EmptyReason,
    },
    /// A placeholder integration whose discovery found nothing.
    Unresolved {
        integration_account_id: String,
    },
}

impl AccountFetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, AccountFetchOutcome::Fetched { .. })
    }
}

/// Rows written for one platform and window, plus per-account outcomes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSyncResult {
    pub rows: Vec<CampaignMetric>,
    pub accounts: Vec<AccountFetchOutcome>,
    pub writes: BatchWriteReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "camelCase")]
pub enum UnitStatus {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub unit: SyncUnit,
    pub status: UnitStatus,
    pub rows_written: usize,
    pub accounts: Vec<AccountFetchOutcome>,
    pub dropped_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<UnitReport>,
}

impl SyncRunReport {
    /// True when every unit ran to completion. Individual accounts may still
    /// have come back empty.
    pub fn success(&self) -> bool {
        self.units.iter().all(|u| u.status == UnitStatus::Completed)
    }

    pub fn rows_written(&self) -> usize {
        self.units.iter().map(|u| u.rows_written).sum()
    }
}
