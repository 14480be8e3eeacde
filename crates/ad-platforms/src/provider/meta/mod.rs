//! Meta (Facebook) Marketing API adapter.
//!
//! Reads campaign-level insights from the Graph API. Results are paginated
//! through `paging.next`, which already carries every query parameter.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::AdPlatformError;
use crate::models::{CampaignRow, Platform, ReportingRange};
use crate::provider::{build_http_client, parse_response, AdPlatformAdapter, NumberOrString};

const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com";
const DEFAULT_API_VERSION: &str = "v24.0";
const INSIGHT_FIELDS: &str = "campaign_id,campaign_name,spend,action_values,actions";
const PAGE_LIMIT: &str = "500";
const MAX_PAGES: usize = 200;
const ACCOUNT_PREFIX: &str = "act_";
const BEARER_PREFIX: &str = "EAA";

/// Purchase action types in the order Meta's own reporting prefers them.
const PURCHASE_ACTION_TYPES: [&str; 3] = [
    "offsite_conversion.fb_pixel_purchase",
    "omni_purchase",
    "purchase",
];

#[derive(Debug, Clone)]
pub struct MetaAdsConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub api_base_url: String,
    pub api_version: String,
}

impl Default for MetaAdsConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightsPage {
    #[serde(default)]
    data: Vec<InsightRow>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightRow {
    campaign_id: Option<String>,
    campaign_name: Option<String>,
    spend: Option<NumberOrString>,
    #[serde(default)]
    action_values: Vec<ActionStat>,
    #[serde(default)]
    actions: Vec<ActionStat>,
}

#[derive(Debug, Deserialize)]
struct ActionStat {
    action_type: String,
    value: NumberOrString,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<i64>,
}

fn extract_graph_error(body: &str) -> Option<String> {
    let envelope: GraphErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error;
    Some(match (error.kind, error.code) {
        (Some(kind), Some(code)) => format!("{} ({} #{})", error.message, kind, code),
        (Some(kind), None) => format!("{} ({})", error.message, kind),
        _ => error.message,
    })
}

/// Graph API ad account id (`act_<digits>`).
pub fn graph_account_id(account_id: &str) -> String {
    let trimmed = account_id.trim();
    if trimmed.starts_with(ACCOUNT_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", ACCOUNT_PREFIX, trimmed)
    }
}

/// Value of the highest-priority purchase action present in `stats`.
fn purchase_value(stats: &[ActionStat]) -> Result<Decimal, AdPlatformError> {
    for action_type in PURCHASE_ACTION_TYPES {
        if let Some(stat) = stats.iter().find(|s| s.action_type == action_type) {
            return stat.value.to_decimal(Platform::Meta);
        }
    }
    Ok(Decimal::ZERO)
}

impl InsightRow {
    fn into_campaign_row(self) -> Result<Option<CampaignRow>, AdPlatformError> {
        let Some(campaign_id) = self.campaign_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(None);
        };
        let spend = match &self.spend {
            Some(value) => value.to_decimal(Platform::Meta)?,
            None => Decimal::ZERO,
        };
        Ok(Some(CampaignRow {
            campaign_name: self.campaign_name.unwrap_or_else(|| campaign_id.clone()),
            campaign_id,
            spend,
            conversion_value: purchase_value(&self.action_values)?,
            conversions: purchase_value(&self.actions)?,
            account_name: None,
        }))
    }
}

pub struct MetaAdsAdapter {
    client: Client,
    config: MetaAdsConfig,
}

impl MetaAdsAdapter {
    pub fn new(config: MetaAdsConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    fn graph_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl AdPlatformAdapter for MetaAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Meta
    }

    fn is_bearer_token(&self, credential: &str) -> bool {
        credential.starts_with(BEARER_PREFIX)
    }

    async fn exchange_token(&self, credential: &str) -> Result<String, AdPlatformError> {
        let (Some(app_id), Some(app_secret)) = (&self.config.app_id, &self.config.app_secret) else {
            return Err(AdPlatformError::not_configured(
                Platform::Meta,
                "app id and secret are required to exchange tokens",
            ));
        };

        let response = self
            .client
            .get(self.graph_url("oauth/access_token"))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", app_id.as_str()),
                ("client_secret", app_secret.as_str()),
                ("fb_exchange_token", credential),
            ])
            .send()
            .await?;

        let token: TokenResponse = parse_response(Platform::Meta, response, extract_graph_error).await?;
        Ok(token.access_token)
    }

    async fn fetch_campaigns(
        &self,
        account_id: &str,
        token: &str,
        range: &ReportingRange,
    ) -> Result<Vec<CampaignRow>, AdPlatformError> {
        let act_id = graph_account_id(account_id);
        let time_range = serde_json::json!({
            "since": range.since_str(),
            "until": range.until_str(),
        })
        .to_string();

        tracing::debug!(
            "[{}] Fetching Meta insights {}..{}",
            act_id,
            range.since_str(),
            range.until_str()
        );

        let first = self
            .client
            .get(self.graph_url(&format!("{}/insights", act_id)))
            .query(&[
                ("level", "campaign"),
                ("fields", INSIGHT_FIELDS),
                ("time_range", time_range.as_str()),
                ("access_token", token),
                ("limit", PAGE_LIMIT),
            ])
            .send()
            .await?;
        let mut page: InsightsPage = parse_response(Platform::Meta, first, extract_graph_error).await?;

        let mut rows = Vec::new();
        let mut pages = 1;
        loop {
            for row in page.data.drain(..) {
                if let Some(campaign) = row.into_campaign_row()? {
                    rows.push(campaign);
                }
            }

            let Some(next) = page.paging.and_then(|p| p.next) else {
                break;
            };
            if pages >= MAX_PAGES {
                tracing::warn!(
                    "[{}] Stopping Meta pagination after {} pages",
                    act_id,
                    MAX_PAGES
                );
                break;
            }

            let response = self.client.get(next).send().await?;
            page = parse_response(Platform::Meta, response, extract_graph_error).await?;
            pages += 1;
        }

        tracing::debug!(
            "[{}] Fetched {} campaign rows across {} page(s)",
            act_id,
            rows.len(),
            pages
        );
        Ok(rows)
    }

    async fn account_display_name(
        &self,
        account_id: &str,
        token: &str,
    ) -> Result<String, AdPlatformError> {
        let act_id = graph_account_id(account_id);
        let response = self
            .client
            .get(self.graph_url(&act_id))
            .query(&[("fields", "name"), ("access_token", token)])
            .send()
            .await?;

        let info: AccountInfo = parse_response(Platform::Meta, response, extract_graph_error).await?;
        info.name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AdPlatformError::malformed(Platform::Meta, "account has no name"))
    }
}
