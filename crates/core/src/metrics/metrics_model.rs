use adpulse_ad_platforms::CampaignRow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Error, ValidationError};
use crate::Platform;

/// Supported reporting lookback windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum LookbackWindow {
    #[default]
    Last7Days,
    Last30Days,
    Last180Days,
}

impl LookbackWindow {
    pub const ALL: [LookbackWindow; 3] = [
        LookbackWindow::Last7Days,
        LookbackWindow::Last30Days,
        LookbackWindow::Last180Days,
    ];

    pub fn days(&self) -> u32 {
        match self {
            LookbackWindow::Last7Days => 7,
            LookbackWindow::Last30Days => 30,
            LookbackWindow::Last180Days => 180,
        }
    }
}

impl TryFrom<i64> for LookbackWindow {
    type Error = Error;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        match days {
            7 => Ok(LookbackWindow::Last7Days),
            30 => Ok(LookbackWindow::Last30Days),
            180 => Ok(LookbackWindow::Last180Days),
            other => Err(ValidationError::UnsupportedWindow(other).into()),
        }
    }
}

impl From<LookbackWindow> for i64 {
    fn from(window: LookbackWindow) -> Self {
        i64::from(window.days())
    }
}

impl fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// Cached performance of one campaign over one lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetric {
    pub campaign_id: String,
    pub campaign_name: String,
    #[serde(rename = "rangeDays")]
    pub window: LookbackWindow,
    pub spend: Decimal,
    pub return_on_ad_spend: Decimal,
    pub conversion_value: Decimal,
    pub conversions: Decimal,
    pub platform: Platform,
    pub account_name: String,
    pub last_synced: DateTime<Utc>,
}

impl CampaignMetric {
    pub fn from_row(
        row: CampaignRow,
        platform: Platform,
        window: LookbackWindow,
        account_name: &str,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            return_on_ad_spend: row.return_on_ad_spend(),
            campaign_id: row.campaign_id,
            campaign_name: row.campaign_name,
            window,
            spend: row.spend,
            conversion_value: row.conversion_value,
            conversions: row.conversions,
            platform,
            account_name: account_name.to_string(),
            last_synced: synced_at,
        }
    }
}

/// Default display label for an account that has no resolvable name.
pub fn fallback_account_name(account_id: &str) -> String {
    format!("Account {}", account_id)
}
