use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;

use adpulse_core::integrations::{Integration, IntegrationRepositoryTrait, IntegrationStatus};
use adpulse_core::{Error, Platform, Result};

use super::model::IntegrationDB;
use crate::db::{format_timestamp, get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::retry::with_backoff;
use crate::schema::integrations;
use crate::schema::integrations::dsl::*;

const WRITE_BACKOFF_BASE: Duration = Duration::from_millis(100);

pub struct IntegrationRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl IntegrationRepository {
    pub fn new(pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        IntegrationRepository { pool, writer }
    }

    async fn save_once(&self, integration: Integration) -> Result<Integration> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Integration> {
                let row = IntegrationDB::from_domain(&integration, format_timestamp(Utc::now()));
                diesel::insert_into(integrations::table)
                    .values(&row)
                    .on_conflict((platform, account_id))
                    .do_update()
                    .set((
                        account_name.eq(&row.account_name),
                        email.eq(&row.email),
                        access_token.eq(&row.access_token),
                        status.eq(&row.status),
                        last_synced.eq(&row.last_synced),
                        updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(integration)
            })
            .await
    }

    async fn mark_synced_once(
        &self,
        key_platform: Platform,
        key_account_id: String,
        name: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let key = (key_platform.as_str(), key_account_id.as_str());
                let current_name: Option<Option<String>> = integrations
                    .find(key)
                    .select(account_name)
                    .first(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                let Some(current_name) = current_name else {
                    return Ok(());
                };

                let stamped = format_timestamp(synced_at);
                diesel::update(integrations.find(key))
                    .set((
                        last_synced.eq(Some(stamped.clone())),
                        status.eq(IntegrationStatus::Active.as_str()),
                        updated_at.eq(stamped),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let missing_name = !current_name.as_deref().is_some_and(|n| !n.trim().is_empty());
                if let Some(name) = name.filter(|n| missing_name && !n.trim().is_empty()) {
                    diesel::update(integrations.find(key))
                        .set(account_name.eq(Some(name)))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }

    async fn set_status_once(
        &self,
        key_platform: Platform,
        key_account_id: String,
        new_status: IntegrationStatus,
    ) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(integrations.find((key_platform.as_str(), key_account_id.as_str())))
                    .set((
                        status.eq(new_status.as_str()),
                        updated_at.eq(format_timestamp(Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl IntegrationRepositoryTrait for IntegrationRepository {
    fn list_integrations(&self, filter_platform: Option<Platform>) -> Result<Vec<Integration>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = integrations.select(IntegrationDB::as_select()).into_boxed();
        if let Some(p) = filter_platform {
            query = query.filter(platform.eq(p.as_str()));
        }
        let rows = query
            .order((platform.asc(), account_id.asc()))
            .load::<IntegrationDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Integration::try_from).collect()
    }

    fn get_integration(&self, key_platform: Platform, key_account_id: &str) -> Result<Option<Integration>> {
        let mut conn = get_connection(&self.pool)?;
        integrations
            .find((key_platform.as_str(), key_account_id))
            .select(IntegrationDB::as_select())
            .first::<IntegrationDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Integration::try_from)
            .transpose()
    }

    async fn save_integration(&self, integration: Integration) -> Result<Integration> {
        with_backoff(
            "Integration save",
            WRITE_BACKOFF_BASE,
            || self.save_once(integration.clone()),
            Error::is_throttled,
        )
        .await
    }

    async fn mark_synced(
        &self,
        key_platform: Platform,
        key_account_id: String,
        name: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        with_backoff(
            "Integration sync stamp",
            WRITE_BACKOFF_BASE,
            || self.mark_synced_once(key_platform, key_account_id.clone(), name.clone(), synced_at),
            Error::is_throttled,
        )
        .await
    }

    async fn set_status(
        &self,
        key_platform: Platform,
        key_account_id: String,
        new_status: IntegrationStatus,
    ) -> Result<()> {
        with_backoff(
            "Integration status",
            WRITE_BACKOFF_BASE,
            || self.set_status_once(key_platform, key_account_id.clone(), new_status),
            Error::is_throttled,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    use crate::db::{create_pool, init, run_migrations, write_actor::spawn_writer};

    fn setup_repository() -> IntegrationRepository {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        let pool = create_pool(&db_path).expect("create pool");
        let writer = spawn_writer(pool.as_ref().clone());
        IntegrationRepository::new(pool, writer)
    }

    fn integration(p: Platform, id: &str, name: Option<&str>) -> Integration {
        Integration {
            platform: p,
            account_id: id.to_string(),
            account_name: name.map(str::to_string),
            email: "owner@example.com".to_string(),
            access_token: "sealed-token".to_string(),
            status: IntegrationStatus::Active,
            last_synced: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_then_list_filters_by_platform() {
        let repo = setup_repository();
        repo.save_integration(integration(Platform::Meta, "act_1", Some("Acme")))
            .await
            .unwrap();
        repo.save_integration(integration(Platform::Google, "1234567890", None))
            .await
            .unwrap();

        let all = repo.list_integrations(None).unwrap();
        assert_eq!(all.len(), 2);

        let meta = repo.list_integrations(Some(Platform::Meta)).unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].account_id, "act_1");
        assert_eq!(meta[0].account_name.as_deref(), Some("Acme"));
        assert_eq!(meta[0].created_at, Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn save_replaces_existing_record() {
        let repo = setup_repository();
        repo.save_integration(integration(Platform::Meta, "act_1", None))
            .await
            .unwrap();

        let mut updated = integration(Platform::Meta, "act_1", Some("Renamed"));
        updated.access_token = "rotated".to_string();
        repo.save_integration(updated).await.unwrap();

        let stored = repo
            .get_integration(Platform::Meta, "act_1")
            .unwrap()
            .expect("stored");
        assert_eq!(stored.access_token, "rotated");
        assert_eq!(stored.account_name.as_deref(), Some("Renamed"));
        assert_eq!(repo.list_integrations(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_missing_integration_is_none() {
        let repo = setup_repository();
        assert!(repo.get_integration(Platform::Google, "nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_synced_fills_missing_name_only() {
        let repo = setup_repository();
        repo.save_integration(integration(Platform::Meta, "act_1", None))
            .await
            .unwrap();
        repo.save_integration(integration(Platform::Meta, "act_2", Some("Kept")))
            .await
            .unwrap();

        let synced_at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        repo.mark_synced(Platform::Meta, "act_1".to_string(), Some("Acme Shoes".to_string()), synced_at)
            .await
            .unwrap();
        repo.mark_synced(Platform::Meta, "act_2".to_string(), Some("Other".to_string()), synced_at)
            .await
            .unwrap();

        let first = repo.get_integration(Platform::Meta, "act_1").unwrap().unwrap();
        assert_eq!(first.account_name.as_deref(), Some("Acme Shoes"));
        assert_eq!(first.last_synced, Some(synced_at));

        let second = repo.get_integration(Platform::Meta, "act_2").unwrap().unwrap();
        assert_eq!(second.account_name.as_deref(), Some("Kept"));
        assert_eq!(second.last_synced, Some(synced_at));
    }

    #[tokio::test]
    async fn disconnected_status_is_cleared_by_next_sync() {
        let repo = setup_repository();
        repo.save_integration(integration(Platform::Google, "1234567890", None))
            .await
            .unwrap();

        repo.set_status(Platform::Google, "1234567890".to_string(), IntegrationStatus::Disconnected)
            .await
            .unwrap();
        let stored = repo.get_integration(Platform::Google, "1234567890").unwrap().unwrap();
        assert_eq!(stored.status, IntegrationStatus::Disconnected);

        let synced_at = Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap();
        repo.mark_synced(Platform::Google, "1234567890".to_string(), None, synced_at)
            .await
            .unwrap();
        let stored = repo.get_integration(Platform::Google, "1234567890").unwrap().unwrap();
        assert_eq!(stored.status, IntegrationStatus::Active);
        assert_eq!(stored.last_synced, Some(synced_at));
    }

    #[tokio::test]
    async fn set_status_on_unknown_account_is_ignored() {
        let repo = setup_repository();
        repo.set_status(Platform::Meta, "act_missing".to_string(), IntegrationStatus::Disconnected)
            .await
            .unwrap();
        assert!(repo.list_integrations(None).unwrap().is_empty());
    }
}
