use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use adpulse_core::sync::RateLimitWindow;
use adpulse_core::Result;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(tracker_id))]
#[diesel(table_name = crate::schema::sync_rate_limit)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncRateLimitDB {
    pub tracker_id: String,
    /// JSON array of RFC 3339 timestamps.
    pub sync_timestamps: String,
    pub version: i64,
    pub updated_at: String,
}

impl SyncRateLimitDB {
    pub fn into_window(self) -> Result<RateLimitWindow> {
        let sync_timestamps: Vec<DateTime<Utc>> = serde_json::from_str(&self.sync_timestamps)?;
        Ok(RateLimitWindow {
            sync_timestamps,
            version: self.version,
        })
    }
}
