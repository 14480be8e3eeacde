use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AdPlatformError;

/// Advertising platform a record originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Google,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Meta, Platform::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Google => "google",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AdPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meta" | "facebook" => Ok(Platform::Meta),
            "google" | "google_ads" => Ok(Platform::Google),
            other => Err(AdPlatformError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Inclusive reporting date range sent to a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl ReportingRange {
    /// The `days` complete days before `today`: `[today - days, today - 1]`.
    pub fn trailing_days(days: u32, today: NaiveDate) -> Self {
        Self {
            since: today - Duration::days(i64::from(days)),
            until: today - Duration::days(1),
        }
    }

    pub fn since_str(&self) -> String {
        self.since.format("%Y-%m-%d").to_string()
    }

    pub fn until_str(&self) -> String {
        self.until.format("%Y-%m-%d").to_string()
    }
}

/// One campaign's aggregated performance as reported by a platform.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignRow {
    pub campaign_id: String,
    pub campaign_name: String,
    pub spend: Decimal,
    pub conversion_value: Decimal,
    pub conversions: Decimal,
    /// Display name of the owning account when the report carries it.
    pub account_name: Option<String>,
}

impl CampaignRow {
    pub fn return_on_ad_spend(&self) -> Decimal {
        return_on_ad_spend(self.conversion_value, self.spend)
    }
}

/// `conversion_value / spend`, or zero when nothing was spent.
pub fn return_on_ad_spend(conversion_value: Decimal, spend: Decimal) -> Decimal {
    if spend <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    conversion_value
        .checked_div(spend)
        .map(|value| value.round_dp(6))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trailing_range_excludes_today() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let range = ReportingRange::trailing_days(7, today);
        assert_eq!(range.since_str(), "2026-03-03");
        assert_eq!(range.until_str(), "2026-03-09");
    }

    #[test]
    fn roas_is_zero_without_spend() {
        assert_eq!(return_on_ad_spend(dec!(150), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(return_on_ad_spend(dec!(150), dec!(50)), dec!(3));
    }

    #[test]
    fn platform_parses_legacy_aliases() {
        assert_eq!("Facebook".parse::<Platform>().unwrap(), Platform::Meta);
        assert_eq!(" google ".parse::<Platform>().unwrap(), Platform::Google);
        assert!("tiktok".parse::<Platform>().is_err());
    }
}
