use std::sync::Arc;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::SqliteConnection;
use log::info;
use serde::Serialize;
use thiserror::Error;

use adpulse_core::errors::{DatabaseError, ValidationError};
use adpulse_core::{Error, Platform};

use super::model::CampaignMetricRecord;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{is_busy_message, StorageError};

/// Largest batch a single `batch_put` accepts.
pub const MAX_BATCH_ITEMS: usize = 25;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Throughput exceeded: {0}")]
    ThroughputExceeded(String),

    #[error("Window index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Batch of {0} items exceeds the batch limit")]
    BatchTooLarge(usize),

    #[error(transparent)]
    Core(#[from] Error),
}

impl TableError {
    pub fn is_throughput(&self) -> bool {
        matches!(self, TableError::ThroughputExceeded(_))
    }

    fn from_core(err: Error) -> Self {
        if err.is_throttled() {
            TableError::ThroughputExceeded(err.to_string())
        } else {
            TableError::Core(err)
        }
    }

    fn from_query(err: DieselError) -> Self {
        if let DieselError::DatabaseError(_, info) = &err {
            let message = info.message();
            if message.contains("no such index") {
                return TableError::IndexUnavailable(message.to_string());
            }
            if is_busy_message(message) {
                return TableError::ThroughputExceeded(message.to_string());
            }
        }
        TableError::Core(StorageError::from(err).into())
    }
}

impl From<TableError> for Error {
    fn from(err: TableError) -> Self {
        match err {
            TableError::ThroughputExceeded(msg) => Error::Database(DatabaseError::Throttled(msg)),
            TableError::IndexUnavailable(msg) => Error::Database(DatabaseError::QueryFailed(msg)),
            TableError::BatchTooLarge(n) => {
                ValidationError::InvalidInput(format!("batch of {} items exceeds {}", n, MAX_BATCH_ITEMS)).into()
            }
            TableError::Core(e) => e,
        }
    }
}

/// One page of a window read. `last_evaluated_key` is set when more rows may follow.
#[derive(Debug, Clone, Default)]
pub struct MetricsPage {
    pub items: Vec<CampaignMetricRecord>,
    pub last_evaluated_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricsIndexStatus {
    Active,
    Missing,
}

/// Storage engine behind a `MetricsStore`: keyed upserts plus paged reads
/// by window, either through the window index or a full scan.
#[async_trait]
pub trait MetricsTable: Send + Sync {
    fn table_name(&self) -> &str;

    /// Upsert up to `MAX_BATCH_ITEMS` records atomically.
    async fn batch_put(&self, items: Vec<CampaignMetricRecord>) -> Result<(), TableError>;

    async fn put(&self, item: CampaignMetricRecord) -> Result<(), TableError>;

    /// Rows for `window_days` with a campaign id after `start_after`, through the index.
    fn query_window_index(
        &self,
        window_days: i32,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<MetricsPage, TableError>;

    /// Same predicate and ordering as `query_window_index`, without the index.
    fn scan_window(
        &self,
        window_days: i32,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<MetricsPage, TableError>;

    fn index_status(&self) -> Result<MetricsIndexStatus, TableError>;

    async fn ensure_index(&self) -> Result<(), TableError>;
}

#[derive(QueryableByName)]
struct IndexCount {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

pub struct SqliteMetricsTable {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    table: &'static str,
    index: &'static str,
}

impl SqliteMetricsTable {
    pub fn for_platform(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
        platform: Platform,
    ) -> Self {
        let (table, index) = match platform {
            Platform::Meta => ("meta_campaign_metrics", "idx_meta_campaign_metrics_window_days"),
            Platform::Google => ("google_campaign_metrics", "idx_google_campaign_metrics_window_days"),
        };
        Self {
            pool,
            writer,
            table,
            index,
        }
    }

    pub fn index_name(&self) -> &str {
        self.index
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (campaign_id, window_days, campaign_name, spend, return_on_ad_spend, \
             conversion_value, conversions, platform, account_name, last_synced) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(campaign_id, window_days) DO UPDATE SET \
             campaign_name = excluded.campaign_name, spend = excluded.spend, \
             return_on_ad_spend = excluded.return_on_ad_spend, \
             conversion_value = excluded.conversion_value, conversions = excluded.conversions, \
             platform = excluded.platform, account_name = excluded.account_name, \
             last_synced = excluded.last_synced",
            self.table
        )
    }

    fn select_page(
        &self,
        hint: &str,
        window_days: i32,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<MetricsPage, TableError> {
        let mut conn = get_connection(&self.pool).map_err(TableError::from_core)?;
        let sql = format!(
            "SELECT campaign_id, window_days, campaign_name, spend, return_on_ad_spend, \
             conversion_value, conversions, platform, account_name, last_synced \
             FROM {} {} WHERE window_days = ? AND campaign_id > ? \
             ORDER BY campaign_id LIMIT ?",
            self.table, hint
        );
        let items = sql_query(sql)
            .bind::<Integer, _>(window_days)
            .bind::<Text, _>(start_after.unwrap_or(""))
            .bind::<BigInt, _>(limit as i64)
            .load::<CampaignMetricRecord>(&mut conn)
            .map_err(TableError::from_query)?;

        let last_evaluated_key = if items.len() == limit {
            items.last().map(|item| item.campaign_id.clone())
        } else {
            None
        };
        Ok(MetricsPage {
            items,
            last_evaluated_key,
        })
    }
}

fn upsert_record(conn: &mut SqliteConnection, sql: &str, item: &CampaignMetricRecord) -> Result<(), DieselError> {
    sql_query(sql)
        .bind::<Text, _>(&item.campaign_id)
        .bind::<Integer, _>(item.window_days)
        .bind::<Text, _>(&item.campaign_name)
        .bind::<Text, _>(&item.spend)
        .bind::<Text, _>(&item.return_on_ad_spend)
        .bind::<Text, _>(&item.conversion_value)
        .bind::<Text, _>(&item.conversions)
        .bind::<Nullable<Text>, _>(&item.platform)
        .bind::<Nullable<Text>, _>(&item.account_name)
        .bind::<Text, _>(&item.last_synced)
        .execute(conn)
        .map(|_| ())
}

#[async_trait]
impl MetricsTable for SqliteMetricsTable {
    fn table_name(&self) -> &str {
        self.table
    }

    async fn batch_put(&self, items: Vec<CampaignMetricRecord>) -> Result<(), TableError> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(TableError::BatchTooLarge(items.len()));
        }
        let sql = self.upsert_sql();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> adpulse_core::Result<()> {
                for item in &items {
                    upsert_record(conn, &sql, item).map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
            .map_err(TableError::from_core)
    }

    async fn put(&self, item: CampaignMetricRecord) -> Result<(), TableError> {
        let sql = self.upsert_sql();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> adpulse_core::Result<()> {
                upsert_record(conn, &sql, &item).map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(TableError::from_core)
    }

    fn query_window_index(
        &self,
        window_days: i32,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<MetricsPage, TableError> {
        self.select_page(&format!("INDEXED BY {}", self.index), window_days, start_after, limit)
    }

    fn scan_window(
        &self,
        window_days: i32,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<MetricsPage, TableError> {
        self.select_page("NOT INDEXED", window_days, start_after, limit)
    }

    fn index_status(&self) -> Result<MetricsIndexStatus, TableError> {
        let mut conn = get_connection(&self.pool).map_err(TableError::from_core)?;
        let found = sql_query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'index' AND name = ?")
            .bind::<Text, _>(self.index)
            .get_result::<IndexCount>(&mut conn)
            .map_err(TableError::from_query)?;
        Ok(if found.n > 0 {
            MetricsIndexStatus::Active
        } else {
            MetricsIndexStatus::Missing
        })
    }

    async fn ensure_index(&self) -> Result<(), TableError> {
        if self.index_status()? == MetricsIndexStatus::Active {
            return Ok(());
        }
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (window_days, campaign_id)",
            self.index, self.table
        );
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> adpulse_core::Result<()> {
                conn.batch_execute(&sql).map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(TableError::from_core)?;
        info!("[MetricsStore] Created index {}", self.index);
        Ok(())
    }
}
