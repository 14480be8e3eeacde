use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::integrations_model::{Integration, IntegrationStatus};
use crate::errors::Result;
use crate::Platform;

/// Persistence for integration records, keyed by `(platform, account_id)`.
#[async_trait]
pub trait IntegrationRepositoryTrait: Send + Sync {
    fn list_integrations(&self, platform: Option<Platform>) -> Result<Vec<Integration>>;

    fn get_integration(&self, platform: Platform, account_id: &str) -> Result<Option<Integration>>;

    /// Insert or fully replace the record with the same key.
    async fn save_integration(&self, integration: Integration) -> Result<Integration>;

    /// Stamp `last_synced`, mark the record `Active` and fill `account_name`
    /// if the record has none.
    async fn mark_synced(
        &self,
        platform: Platform,
        account_id: String,
        account_name: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Update the status of an existing record. Unknown keys are ignored.
    async fn set_status(&self, platform: Platform, account_id: String, status: IntegrationStatus) -> Result<()>;
}
