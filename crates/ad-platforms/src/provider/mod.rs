pub mod google_ads;
pub mod meta;

#[cfg(test)]
pub(crate) mod mock_server;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AdPlatformError;
use crate::models::{CampaignRow, Platform, ReportingRange};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LOG_BODY_CHARS: usize = 512;

/// A reporting API for one advertising platform.
///
/// Discovery operations are optional; adapters that cannot enumerate
/// accounts keep the default `NotSupported` implementations.
#[async_trait]
pub trait AdPlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fails when developer-level configuration is missing. Callers skip all
    /// fetches for the platform when this returns an error.
    fn ensure_configured(&self) -> Result<(), AdPlatformError> {
        Ok(())
    }

    /// Whether `credential` is already a usable short-lived bearer token.
    fn is_bearer_token(&self, credential: &str) -> bool;

    /// Exchange a long-lived credential for a bearer token.
    async fn exchange_token(&self, credential: &str) -> Result<String, AdPlatformError>;

    fn supports_discovery(&self) -> bool {
        false
    }

    /// Account ids directly reachable with `token`.
    async fn list_accessible_accounts(&self, _token: &str) -> Result<Vec<String>, AdPlatformError> {
        Err(AdPlatformError::NotSupported {
            platform: self.platform(),
            operation: "list_accessible_accounts",
        })
    }

    /// Non-manager accounts at most one level below `manager_id`.
    async fn list_client_accounts(
        &self,
        _manager_id: &str,
        _token: &str,
    ) -> Result<Vec<String>, AdPlatformError> {
        Err(AdPlatformError::NotSupported {
            platform: self.platform(),
            operation: "list_client_accounts",
        })
    }

    /// Campaign-level totals for `account_id` over `range`.
    async fn fetch_campaigns(
        &self,
        account_id: &str,
        token: &str,
        range: &ReportingRange,
    ) -> Result<Vec<CampaignRow>, AdPlatformError>;

    async fn account_display_name(
        &self,
        account_id: &str,
        token: &str,
    ) -> Result<String, AdPlatformError>;
}

pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn log_response(platform: Platform, status: reqwest::StatusCode, body: &str) {
    if status.is_success() {
        tracing::debug!("{} API response status: {}", platform, status);
        return;
    }

    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    tracing::debug!("{} API response error ({}): {}", platform, status, preview);
}

/// Read a JSON body, turning non-success statuses into `AdPlatformError::Api`.
///
/// `extract_error` pulls a human-readable message out of the platform's
/// error envelope; the raw body is used when it returns `None`.
pub(crate) async fn parse_response<T: DeserializeOwned>(
    platform: Platform,
    response: reqwest::Response,
    extract_error: fn(&str) -> Option<String>,
) -> Result<T, AdPlatformError> {
    let status = response.status();
    let body = response.text().await?;
    log_response(platform, status, &body);

    if !status.is_success() {
        let message = extract_error(&body).unwrap_or_else(|| format!("Request failed: {}", body));
        return Err(AdPlatformError::api(status.as_u16(), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!("Failed to deserialize {} response: {}", platform, e);
        AdPlatformError::malformed(platform, format!("Failed to parse response: {}", e))
    })
}

/// JSON scalar that platforms send either as a number or as a quoted string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    pub(crate) fn as_text(&self) -> String {
        match self {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Text(s) => s.trim().to_string(),
        }
    }

    pub(crate) fn to_decimal(&self, platform: Platform) -> Result<Decimal, AdPlatformError> {
        let text = self.as_text();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| AdPlatformError::malformed(platform, format!("invalid number '{}': {}", text, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn number_or_string_accepts_both_encodings() {
        let values: Vec<NumberOrString> = serde_json::from_str(r#"["12.50", 3, 0.25]"#).unwrap();
        let decimals: Vec<Decimal> = values
            .iter()
            .map(|v| v.to_decimal(Platform::Meta).unwrap())
            .collect();
        assert_eq!(decimals, vec![dec!(12.50), dec!(3), dec!(0.25)]);
    }

    #[test]
    fn number_or_string_rejects_garbage() {
        let value = NumberOrString::Text("n/a".to_string());
        assert!(matches!(
            value.to_decimal(Platform::Google),
            Err(AdPlatformError::MalformedResponse { .. })
        ));
    }
}
