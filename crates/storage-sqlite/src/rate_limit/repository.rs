use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;

use adpulse_core::sync::{RateLimitStoreTrait, RateLimitWindow};
use adpulse_core::{Error, Result};

use super::model::SyncRateLimitDB;
use crate::db::{format_timestamp, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::retry::with_backoff;
use crate::schema::sync_rate_limit;
use crate::schema::sync_rate_limit::dsl::*;

/// The budget is global, so the table only ever holds this one row.
pub const GLOBAL_TRACKER_ID: &str = "global";

const WRITE_BACKOFF_BASE: Duration = Duration::from_millis(100);

pub struct RateLimitRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl RateLimitRepository {
    pub fn new(pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        RateLimitRepository { pool, writer }
    }

    async fn compare_and_swap_once(&self, expected_version: i64, timestamps: Vec<DateTime<Utc>>) -> Result<bool> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let stored_version = read_version(conn)?;
                if stored_version != expected_version {
                    debug!(
                        "[RateLimit] Version moved from {} to {}; write rejected",
                        expected_version, stored_version
                    );
                    return Ok(false);
                }
                write_window(conn, &timestamps, stored_version + 1)?;
                Ok(true)
            })
            .await
    }

    async fn clear_once(&self) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                // Versions keep increasing across resets so a pre-reset snapshot can never win a CAS.
                let stored_version = read_version(conn)?;
                write_window(conn, &[], stored_version + 1)
            })
            .await
    }
}

/// Stored version of the window, 0 when no row exists yet.
fn read_version(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(sync_rate_limit
        .find(GLOBAL_TRACKER_ID)
        .select(version)
        .first::<i64>(conn)
        .optional()
        .map_err(StorageError::from)?
        .unwrap_or(0))
}

fn write_window(conn: &mut SqliteConnection, timestamps: &[DateTime<Utc>], next_version: i64) -> Result<()> {
    let row = SyncRateLimitDB {
        tracker_id: GLOBAL_TRACKER_ID.to_string(),
        sync_timestamps: serde_json::to_string(timestamps)?,
        version: next_version,
        updated_at: format_timestamp(Utc::now()),
    };
    diesel::insert_into(sync_rate_limit::table)
        .values(&row)
        .on_conflict(tracker_id)
        .do_update()
        .set(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

#[async_trait]
impl RateLimitStoreTrait for RateLimitRepository {
    fn load_window(&self) -> Result<Option<RateLimitWindow>> {
        let mut conn = get_connection(&self.pool)?;
        sync_rate_limit
            .find(GLOBAL_TRACKER_ID)
            .select(SyncRateLimitDB::as_select())
            .first::<SyncRateLimitDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(SyncRateLimitDB::into_window)
            .transpose()
    }

    async fn compare_and_swap(&self, expected_version: i64, timestamps: Vec<DateTime<Utc>>) -> Result<bool> {
        with_backoff(
            "Rate limit update",
            WRITE_BACKOFF_BASE,
            || self.compare_and_swap_once(expected_version, timestamps.clone()),
            Error::is_throttled,
        )
        .await
    }

    async fn clear(&self) -> Result<()> {
        with_backoff("Rate limit reset", WRITE_BACKOFF_BASE, || self.clear_once(), Error::is_throttled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, write_actor::spawn_writer};

    fn setup_repository() -> RateLimitRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        RateLimitRepository::new(pool, writer)
    }

    #[tokio::test]
    async fn absent_window_has_version_zero() {
        let repo = setup_repository();
        assert!(repo.load_window().unwrap().is_none());

        let at = Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap();
        assert!(repo.compare_and_swap(0, vec![at]).await.unwrap());

        let window = repo.load_window().unwrap().expect("window stored");
        assert_eq!(window.version, 1);
        assert_eq!(window.sync_timestamps, vec![at]);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let repo = setup_repository();
        let first = Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 3, 10, 10, 5, 0).unwrap();

        assert!(repo.compare_and_swap(0, vec![first]).await.unwrap());
        assert!(!repo.compare_and_swap(0, vec![second]).await.unwrap());
        assert!(repo.compare_and_swap(1, vec![first, second]).await.unwrap());

        let window = repo.load_window().unwrap().unwrap();
        assert_eq!(window.version, 2);
        assert_eq!(window.sync_timestamps, vec![first, second]);
    }

    #[tokio::test]
    async fn clear_empties_the_window_and_bumps_version() {
        let repo = setup_repository();
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap();
        repo.compare_and_swap(0, vec![at]).await.unwrap();

        repo.clear().await.unwrap();
        let window = repo.load_window().unwrap().expect("window kept");
        assert!(window.sync_timestamps.is_empty());
        assert_eq!(window.version, 2);
        assert!(repo.compare_and_swap(2, vec![at]).await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_taken_before_reset_cannot_overwrite_later_reservation() {
        let repo = setup_repository();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 3, 10, 10, 1, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 10, 10, 2, 0).unwrap();

        assert!(repo.compare_and_swap(0, vec![t0]).await.unwrap());
        let stale = repo.load_window().unwrap().unwrap();

        repo.clear().await.unwrap();
        let fresh = repo.load_window().unwrap().unwrap();
        assert!(repo.compare_and_swap(fresh.version, vec![t1]).await.unwrap());

        assert!(!repo.compare_and_swap(stale.version, vec![t0, t2]).await.unwrap());
        assert_eq!(repo.load_window().unwrap().unwrap().sync_timestamps, vec![t1]);
    }

    #[tokio::test]
    async fn clear_on_empty_store_creates_an_empty_window() {
        let repo = setup_repository();
        repo.clear().await.unwrap();
        let window = repo.load_window().unwrap().expect("window created");
        assert!(window.sync_timestamps.is_empty());
        assert_eq!(window.version, 1);
        assert!(!repo.compare_and_swap(0, Vec::new()).await.unwrap());
    }
}
