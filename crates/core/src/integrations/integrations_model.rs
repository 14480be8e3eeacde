use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result, ValidationError};
use crate::Platform;

/// Value returned in place of credentials on every outward-facing read.
pub const MASKED_CREDENTIAL: &str = "********";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationStatus {
    Active,
    Disconnected,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Active => "Active",
            IntegrationStatus::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(IntegrationStatus::Active),
            "disconnected" => Ok(IntegrationStatus::Disconnected),
            other => Err(ValidationError::InvalidInput(format!("unknown integration status '{}'", other)).into()),
        }
    }
}

/// A linked advertising account and the credential used to reach it.
///
/// `access_token` holds the at-rest form of the credential, which is
/// ciphertext whenever an encryption key is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub platform: Platform,
    pub account_id: String,
    pub account_name: Option<String>,
    pub email: String,
    pub access_token: String,
    pub status: IntegrationStatus,
    pub last_synced: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Integration {
    /// Placeholder records carry an owner email instead of a real account id.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_account_id(&self.account_id)
    }

    pub fn display_name(&self) -> &str {
        self.account_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.account_id)
    }

    pub fn has_display_name(&self) -> bool {
        self.account_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Whether the record has everything a fetch needs.
    pub fn is_complete(&self) -> bool {
        !self.account_id.trim().is_empty() && !self.access_token.trim().is_empty()
    }

    /// Copy safe to hand to clients: credential masked, name defaulted.
    pub fn masked(&self) -> Self {
        Self {
            account_name: Some(self.display_name().to_string()),
            access_token: MASKED_CREDENTIAL.to_string(),
            ..self.clone()
        }
    }
}

pub fn is_placeholder_account_id(account_id: &str) -> bool {
    account_id.contains('@')
}

/// Input for linking an account. `access_token` is plaintext here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIntegration {
    pub platform: Platform,
    pub account_id: String,
    pub account_name: Option<String>,
    #[serde(default)]
    pub email: String,
    pub access_token: String,
}

impl NewIntegration {
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(ValidationError::InvalidInput("accountId is required".to_string()).into());
        }
        if self.access_token.trim().is_empty() {
            return Err(ValidationError::InvalidInput("accessToken is required".to_string()).into());
        }
        Ok(())
    }
}
