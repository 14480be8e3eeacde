use std::str::FromStr;

use diesel::sql_types::{Integer, Nullable, Text};
use diesel::QueryableByName;
use rust_decimal::Decimal;

use adpulse_core::metrics::{CampaignMetric, LookbackWindow};
use adpulse_core::{Platform, Result};

use crate::db::{format_timestamp, parse_timestamp};
use crate::errors::StorageError;

/// Account label for rows written before names were stored.
pub const UNKNOWN_ACCOUNT_NAME: &str = "Unknown Account";

/// One stored metrics row. Decimals are kept as text to avoid float drift.
#[derive(QueryableByName, Debug, Clone, PartialEq)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CampaignMetricRecord {
    #[diesel(sql_type = Text)]
    pub campaign_id: String,
    #[diesel(sql_type = Integer)]
    pub window_days: i32,
    #[diesel(sql_type = Text)]
    pub campaign_name: String,
    #[diesel(sql_type = Text)]
    pub spend: String,
    #[diesel(sql_type = Text)]
    pub return_on_ad_spend: String,
    #[diesel(sql_type = Text)]
    pub conversion_value: String,
    #[diesel(sql_type = Text)]
    pub conversions: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub platform: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub account_name: Option<String>,
    #[diesel(sql_type = Text)]
    pub last_synced: String,
}

impl CampaignMetricRecord {
    pub fn from_metric(metric: &CampaignMetric) -> Self {
        Self {
            campaign_id: metric.campaign_id.clone(),
            window_days: metric.window.days() as i32,
            campaign_name: metric.campaign_name.clone(),
            spend: metric.spend.to_string(),
            return_on_ad_spend: metric.return_on_ad_spend.to_string(),
            conversion_value: metric.conversion_value.to_string(),
            conversions: metric.conversions.to_string(),
            platform: Some(metric.platform.as_str().to_string()),
            account_name: Some(metric.account_name.clone()),
            last_synced: format_timestamp(metric.last_synced),
        }
    }

    /// Convert back to the domain type. Legacy rows without a platform take
    /// the platform of the table they were read from.
    pub fn into_metric(self, table_platform: Platform) -> Result<CampaignMetric> {
        let platform = match self.platform.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => {
                Platform::from_str(value).map_err(|e| StorageError::InvalidData(e.to_string()))?
            }
            _ => table_platform,
        };
        Ok(CampaignMetric {
            window: LookbackWindow::try_from(i64::from(self.window_days))?,
            spend: parse_decimal("spend", &self.spend)?,
            return_on_ad_spend: parse_decimal("return_on_ad_spend", &self.return_on_ad_spend)?,
            conversion_value: parse_decimal("conversion_value", &self.conversion_value)?,
            conversions: parse_decimal("conversions", &self.conversions)?,
            platform,
            account_name: self
                .account_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ACCOUNT_NAME.to_string()),
            last_synced: parse_timestamp(&self.last_synced)?,
            campaign_id: self.campaign_id,
            campaign_name: self.campaign_name,
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> std::result::Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| StorageError::InvalidData(format!("{} '{}': {}", field, value, e)))
}
