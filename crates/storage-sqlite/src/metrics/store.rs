use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};

use adpulse_core::metrics::{BatchWriteReport, CampaignMetric, LookbackWindow, MetricsRepositoryTrait};
use adpulse_core::{Platform, Result, ValidationError};

use super::model::CampaignMetricRecord;
use super::table::{MetricsPage, MetricsTable, TableError, MAX_BATCH_ITEMS};
use crate::retry::with_backoff;

const BATCH_BACKOFF_BASE: Duration = Duration::from_millis(200);
const SINGLE_BACKOFF_BASE: Duration = Duration::from_millis(100);
const READ_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Index,
    Scan,
}

/// Metrics cache for one platform on top of a `MetricsTable`.
pub struct MetricsStore<T: MetricsTable> {
    table: T,
    platform: Platform,
}

impl<T: MetricsTable> MetricsStore<T> {
    pub fn new(table: T, platform: Platform) -> Self {
        Self { table, platform }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    async fn read_with_backoff(
        &self,
        window_days: i32,
        lookup: Lookup,
    ) -> std::result::Result<Vec<CampaignMetricRecord>, TableError> {
        let label = format!("[MetricsStore] {} read", self.table.table_name());
        with_backoff(
            &label,
            SINGLE_BACKOFF_BASE,
            || async move { self.read_all(window_days, lookup) },
            TableError::is_throughput,
        )
        .await
    }

    fn read_all(&self, window_days: i32, lookup: Lookup) -> std::result::Result<Vec<CampaignMetricRecord>, TableError> {
        let mut records = Vec::new();
        let mut start_after: Option<String> = None;
        loop {
            let MetricsPage {
                items,
                last_evaluated_key,
            } = match lookup {
                Lookup::Index => {
                    self.table
                        .query_window_index(window_days, start_after.as_deref(), READ_PAGE_SIZE)?
                }
                Lookup::Scan => self
                    .table
                    .scan_window(window_days, start_after.as_deref(), READ_PAGE_SIZE)?,
            };
            records.extend(items);
            match last_evaluated_key {
                Some(key) => start_after = Some(key),
                None => return Ok(records),
            }
        }
    }
}

#[async_trait]
impl<T: MetricsTable> MetricsRepositoryTrait for MetricsStore<T> {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn write_batch(&self, rows: Vec<CampaignMetric>, window: LookbackWindow) -> BatchWriteReport {
        let total = rows.len();
        let records: Vec<CampaignMetricRecord> = rows
            .into_iter()
            .filter(|row| !row.campaign_id.trim().is_empty())
            .map(|mut row| {
                row.window = window;
                CampaignMetricRecord::from_metric(&row)
            })
            .collect();
        if records.len() < total {
            debug!(
                "[MetricsStore] Dropped {} row(s) without a campaign id",
                total - records.len()
            );
        }

        let mut report = BatchWriteReport::default();
        for chunk in records.chunks(MAX_BATCH_ITEMS) {
            let label = format!("[MetricsStore] {} batch", self.table.table_name());
            let outcome = with_backoff(
                &label,
                BATCH_BACKOFF_BASE,
                || self.table.batch_put(chunk.to_vec()),
                TableError::is_throughput,
            )
            .await;
            match outcome {
                Ok(()) => report.written += chunk.len(),
                Err(e) => {
                    error!(
                        "[MetricsStore] Dropping {} row(s) for {} {}: {}",
                        chunk.len(),
                        self.table.table_name(),
                        window,
                        e
                    );
                    report.dropped_chunks += 1;
                    report.dropped_rows += chunk.len();
                }
            }
        }
        report
    }

    async fn write_one(&self, row: CampaignMetric) -> Result<()> {
        if row.campaign_id.trim().is_empty() {
            return Err(ValidationError::InvalidInput("campaign id is required".to_string()).into());
        }
        let record = CampaignMetricRecord::from_metric(&row);
        let label = format!("[MetricsStore] {} put", self.table.table_name());
        with_backoff(
            &label,
            SINGLE_BACKOFF_BASE,
            || self.table.put(record.clone()),
            TableError::is_throughput,
        )
        .await?;
        Ok(())
    }

    async fn read_range(&self, window: LookbackWindow) -> Result<Vec<CampaignMetric>> {
        let window_days = window.days() as i32;
        let records = match self.read_with_backoff(window_days, Lookup::Index).await {
            Ok(records) => records,
            Err(TableError::IndexUnavailable(reason)) => {
                warn!(
                    "[MetricsStore] Index on {} unavailable ({}); scanning instead",
                    self.table.table_name(),
                    reason
                );
                self.read_with_backoff(window_days, Lookup::Scan).await?
            }
            Err(e) => return Err(e.into()),
        };
        records
            .into_iter()
            .map(|record| record.into_metric(self.platform))
            .collect()
    }
}
