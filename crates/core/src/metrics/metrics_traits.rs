use async_trait::async_trait;
use serde::Serialize;

use super::metrics_model::{CampaignMetric, LookbackWindow};
use crate::errors::Result;
use crate::Platform;

/// Outcome of a batched metrics write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWriteReport {
    pub written: usize,
    pub dropped_chunks: usize,
    pub dropped_rows: usize,
}

impl BatchWriteReport {
    pub fn merge(&mut self, other: &BatchWriteReport) {
        self.written += other.written;
        self.dropped_chunks += other.dropped_chunks;
        self.dropped_rows += other.dropped_rows;
    }
}

/// Metrics cache for one platform, keyed by `(campaign_id, window)`.
#[async_trait]
pub trait MetricsRepositoryTrait: Send + Sync {
    fn platform(&self) -> Platform;

    /// Upsert `rows` for `window`. Chunks that keep failing after retries are
    /// dropped and counted in the report rather than returned as errors.
    async fn write_batch(&self, rows: Vec<CampaignMetric>, window: LookbackWindow) -> BatchWriteReport;

    async fn write_one(&self, row: CampaignMetric) -> Result<()>;

    /// Every cached row for `window`.
    async fn read_range(&self, window: LookbackWindow) -> Result<Vec<CampaignMetric>>;
}
