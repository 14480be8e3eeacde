//! Google Ads REST adapter.
//!
//! Uses `googleAds:search` with GAQL queries, following `nextPageToken`
//! until the result set is exhausted. Every request carries the developer
//! token; without it no call is attempted.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::errors::AdPlatformError;
use crate::models::{CampaignRow, Platform, ReportingRange};
use crate::provider::{build_http_client, parse_response, AdPlatformAdapter, NumberOrString};

const DEFAULT_API_BASE_URL: &str = "https://googleads.googleapis.com";
const DEFAULT_API_VERSION: &str = "v21";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const BEARER_PREFIX: &str = "ya29.";
const MAX_PAGES: usize = 200;

const CLIENT_ACCOUNTS_QUERY: &str = "SELECT customer_client.client_customer, customer_client.descriptive_name, customer_client.manager, customer_client.level FROM customer_client WHERE customer_client.level <= 1";
const ACCOUNT_NAME_QUERY: &str = "SELECT customer.descriptive_name FROM customer LIMIT 1";

#[derive(Debug, Clone)]
pub struct GoogleAdsConfig {
    pub developer_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Manager account to act through when querying client accounts.
    pub login_customer_id: Option<String>,
    pub api_base_url: String,
    pub api_version: String,
    pub token_url: String,
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            developer_token: None,
            client_id: None,
            client_secret: None,
            login_customer_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignResult {
    campaign: CampaignResource,
    #[serde(default)]
    metrics: MetricsResource,
    customer: Option<CustomerResource>,
}

#[derive(Debug, Deserialize)]
struct CampaignResource {
    id: NumberOrString,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResource {
    cost_micros: Option<NumberOrString>,
    conversions_value: Option<NumberOrString>,
    conversions: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerResource {
    descriptive_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerClientResult {
    customer_client: CustomerClientResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerClientResource {
    client_customer: Option<String>,
    #[serde(default)]
    manager: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerResult {
    customer: CustomerResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibleCustomers {
    #[serde(default)]
    resource_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
    status: Option<String>,
}

fn extract_google_error(body: &str) -> Option<String> {
    let envelope: GoogleErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error;
    match (error.message, error.status) {
        (Some(message), Some(status)) => Some(format!("{}: {}", status, message)),
        (Some(message), None) => Some(message),
        (None, Some(status)) => Some(status),
        (None, None) => None,
    }
}

/// OAuth token endpoint errors use a flat `{error, error_description}` shape.
fn extract_oauth_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?.as_str()?;
    match value.get("error_description").and_then(|d| d.as_str()) {
        Some(description) => Some(format!("{}: {}", error, description)),
        None => Some(error.to_string()),
    }
}

/// Customer id with dashes and the `customers/` resource prefix removed.
pub fn normalize_customer_id(raw: &str) -> String {
    raw.trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

/// Cost in account currency from a `cost_micros` value.
fn micros_to_units(micros: &NumberOrString) -> Result<Decimal, AdPlatformError> {
    let value = micros.to_decimal(Platform::Google)?;
    Ok(value / Decimal::from(1_000_000))
}

impl CampaignResult {
    fn into_campaign_row(self) -> Result<Option<CampaignRow>, AdPlatformError> {
        let campaign_id = self.campaign.id.as_text();
        if campaign_id.is_empty() {
            return Ok(None);
        }
        let spend = match &self.metrics.cost_micros {
            Some(micros) => micros_to_units(micros)?,
            None => Decimal::ZERO,
        };
        let conversion_value = match &self.metrics.conversions_value {
            Some(value) => value.to_decimal(Platform::Google)?,
            None => Decimal::ZERO,
        };
        let conversions = match &self.metrics.conversions {
            Some(value) => value.to_decimal(Platform::Google)?,
            None => Decimal::ZERO,
        };
        Ok(Some(CampaignRow {
            campaign_name: self.campaign.name.unwrap_or_else(|| campaign_id.clone()),
            campaign_id,
            spend,
            conversion_value,
            conversions,
            account_name: self
                .customer
                .and_then(|c| c.descriptive_name)
                .filter(|name| !name.trim().is_empty()),
        }))
    }
}

pub struct GoogleAdsAdapter {
    client: Client,
    config: GoogleAdsConfig,
}

impl GoogleAdsAdapter {
    pub fn new(config: GoogleAdsConfig) -> Self {
        Self {
            client: build_http_client(),
            config,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version,
            path.trim_start_matches('/')
        )
    }

    fn developer_token(&self) -> Result<&str, AdPlatformError> {
        self.config
            .developer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AdPlatformError::not_configured(Platform::Google, "developer token is not set")
            })
    }

    fn headers(&self, token: &str, login_customer_id: Option<&str>) -> Result<HeaderMap, AdPlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AdPlatformError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let developer_token = HeaderValue::from_str(self.developer_token()?)
            .map_err(|_| AdPlatformError::not_configured(Platform::Google, "developer token has invalid characters"))?;
        headers.insert("developer-token", developer_token);

        if let Some(login_id) = login_customer_id.map(normalize_customer_id).filter(|id| !id.is_empty()) {
            let value = HeaderValue::from_str(&login_id)
                .map_err(|_| AdPlatformError::auth("Invalid login customer id"))?;
            headers.insert("login-customer-id", value);
        }

        Ok(headers)
    }

    /// Run a GAQL query against `customer_id`, collecting every page.
    async fn search<T: DeserializeOwned>(
        &self,
        customer_id: &str,
        token: &str,
        query: &str,
        login_customer_id: Option<&str>,
    ) -> Result<Vec<T>, AdPlatformError> {
        let headers = self.headers(token, login_customer_id)?;
        let url = self.api_url(&format!(
            "customers/{}/googleAds:search",
            normalize_customer_id(customer_id)
        ));

        let mut results = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut body = serde_json::json!({ "query": query });
            if let Some(next) = &page_token {
                body["pageToken"] = serde_json::Value::String(next.clone());
            }

            let response = self
                .client
                .post(&url)
                .headers(headers.clone())
                .json(&body)
                .send()
                .await?;
            let page: SearchPage<T> = parse_response(Platform::Google, response, extract_google_error).await?;
            results.extend(page.results);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(results),
            }
        }

        tracing::warn!(
            "[{}] Stopping Google Ads pagination after {} pages",
            customer_id,
            MAX_PAGES
        );
        Ok(results)
    }

    fn campaign_query(range: &ReportingRange) -> String {
        format!(
            "SELECT campaign.id, campaign.name, metrics.cost_micros, metrics.conversions_value, \
             metrics.conversions, customer.descriptive_name FROM campaign \
             WHERE segments.date BETWEEN '{}' AND '{}'",
            range.since_str(),
            range.until_str()
        )
    }
}

#[async_trait]
impl AdPlatformAdapter for GoogleAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    fn ensure_configured(&self) -> Result<(), AdPlatformError> {
        self.developer_token().map(|_| ())
    }

    fn is_bearer_token(&self, credential: &str) -> bool {
        credential.starts_with(BEARER_PREFIX)
    }

    async fn exchange_token(&self, credential: &str) -> Result<String, AdPlatformError> {
        let (Some(client_id), Some(client_secret)) = (&self.config.client_id, &self.config.client_secret) else {
            return Err(AdPlatformError::not_configured(
                Platform::Google,
                "OAuth client id and secret are required to refresh tokens",
            ));
        };

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", credential),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let token: TokenResponse = parse_response(Platform::Google, response, extract_oauth_error).await?;
        Ok(token.access_token)
    }

    fn supports_discovery(&self) -> bool {
        true
    }

    async fn list_accessible_accounts(&self, token: &str) -> Result<Vec<String>, AdPlatformError> {
        let response = self
            .client
            .get(self.api_url("customers:listAccessibleCustomers"))
            .headers(self.headers(token, None)?)
            .send()
            .await?;

        let accessible: AccessibleCustomers =
            parse_response(Platform::Google, response, extract_google_error).await?;
        Ok(accessible
            .resource_names
            .iter()
            .map(|name| normalize_customer_id(name))
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn list_client_accounts(
        &self,
        manager_id: &str,
        token: &str,
    ) -> Result<Vec<String>, AdPlatformError> {
        let rows: Vec<CustomerClientResult> = self
            .search(manager_id, token, CLIENT_ACCOUNTS_QUERY, Some(manager_id))
            .await?;

        let clients: BTreeSet<String> = rows
            .into_iter()
            .filter(|row| !row.customer_client.manager)
            .filter_map(|row| row.customer_client.client_customer)
            .map(|resource| normalize_customer_id(&resource))
            .filter(|id| !id.is_empty())
            .collect();

        tracing::debug!(
            "Found {} client account(s) under {}",
            clients.len(),
            manager_id
        );
        Ok(clients.into_iter().collect())
    }

    async fn fetch_campaigns(
        &self,
        account_id: &str,
        token: &str,
        range: &ReportingRange,
    ) -> Result<Vec<CampaignRow>, AdPlatformError> {
        self.ensure_configured()?;
        tracing::debug!(
            "[{}] Fetching Google Ads campaigns {}..{}",
            account_id,
            range.since_str(),
            range.until_str()
        );

        let results: Vec<CampaignResult> = self
            .search(
                account_id,
                token,
                &Self::campaign_query(range),
                self.config.login_customer_id.as_deref(),
            )
            .await?;

        let mut rows = Vec::with_capacity(results.len());
        for result in results {
            if let Some(row) = result.into_campaign_row()? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    async fn account_display_name(
        &self,
        account_id: &str,
        token: &str,
    ) -> Result<String, AdPlatformError> {
        let rows: Vec<CustomerResult> = self
            .search(
                account_id,
                token,
                ACCOUNT_NAME_QUERY,
                self.config.login_customer_id.as_deref(),
            )
            .await?;

        rows.into_iter()
            .find_map(|row| row.customer.descriptive_name)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AdPlatformError::malformed(Platform::Google, "customer has no descriptive name"))
    }
}
