//! Advertising platform adapters.
//!
//! Each adapter speaks one platform's reporting API and returns campaign rows
//! in a common shape. Credentials, discovery and persistence are handled by
//! the caller; adapters never touch storage.

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{AdPlatformError, ApiRetryClass};
pub use models::{return_on_ad_spend, CampaignRow, Platform, ReportingRange};
pub use provider::google_ads::{GoogleAdsAdapter, GoogleAdsConfig};
pub use provider::meta::{MetaAdsAdapter, MetaAdsConfig};
pub use provider::AdPlatformAdapter;
