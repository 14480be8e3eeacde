use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use adpulse_core::integrations::{Integration, IntegrationStatus};
use adpulse_core::{Error, Platform};

use crate::db::{format_timestamp, parse_timestamp};
use crate::errors::StorageError;

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
#[diesel(primary_key(platform, account_id))]
#[diesel(table_name = crate::schema::integrations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct IntegrationDB {
    pub platform: String,
    pub account_id: String,
    pub account_name: Option<String>,
    pub email: String,
    pub access_token: String,
    pub status: String,
    pub last_synced: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl IntegrationDB {
    pub fn from_domain(integration: &Integration, updated_at: String) -> Self {
        Self {
            platform: integration.platform.as_str().to_string(),
            account_id: integration.account_id.clone(),
            account_name: integration.account_name.clone(),
            email: integration.email.clone(),
            access_token: integration.access_token.clone(),
            status: integration.status.as_str().to_string(),
            last_synced: integration.last_synced.map(format_timestamp),
            created_at: format_timestamp(integration.created_at),
            updated_at,
        }
    }
}

impl TryFrom<IntegrationDB> for Integration {
    type Error = Error;

    fn try_from(db: IntegrationDB) -> Result<Self, Self::Error> {
        let platform = Platform::from_str(&db.platform)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        Ok(Integration {
            platform,
            account_id: db.account_id,
            account_name: db.account_name,
            email: db.email,
            access_token: db.access_token,
            status: IntegrationStatus::from_str(&db.status)?,
            last_synced: db.last_synced.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&db.created_at)?,
        })
    }
}
