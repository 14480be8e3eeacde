//! Error types for platform adapters.

use thiserror::Error;

use crate::models::Platform;

/// Retry policy class for platform API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

#[derive(Debug, Error)]
pub enum AdPlatformError {
    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the platform API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The platform answered with a body we could not interpret.
    #[error("Malformed response from {platform}: {message}")]
    MalformedResponse { platform: Platform, message: String },

    /// Developer-level configuration is missing (app credentials, developer token).
    #[error("{platform} is not configured: {reason}")]
    NotConfigured { platform: Platform, reason: String },

    /// The credential was rejected or has an unusable format.
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Operation '{operation}' is not supported by {platform}")]
    NotSupported {
        platform: Platform,
        operation: &'static str,
    },

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

impl AdPlatformError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(platform: Platform, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            platform,
            message: message.into(),
        }
    }

    pub fn not_configured(platform: Platform, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            platform,
            reason: reason.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
            Self::MalformedResponse { .. }
            | Self::NotConfigured { .. }
            | Self::NotSupported { .. }
            | Self::UnknownPlatform(_) => ApiRetryClass::Permanent,
        }
    }
}
