use std::net::SocketAddr;

use adpulse_ad_platforms::{GoogleAdsConfig, MetaAdsConfig};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Process settings read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub data_dir: String,
    /// Base64 key for credential encryption. Without it credentials are stored as given.
    pub encryption_key: Option<String>,
    pub frontend_url: String,
    pub meta: MetaAdsConfig,
    pub google: GoogleAdsConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| clean_value(&v)).filter(|v| !v.is_empty());

        let listen = read("ADPULSE_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen
            .parse::<SocketAddr>()
            .map_err(|e| format!("ADPULSE_LISTEN_ADDR '{}' is not a socket address: {}", listen, e))?;

        let meta_defaults = MetaAdsConfig::default();
        let meta = MetaAdsConfig {
            app_id: read("META_CLIENT_ID"),
            app_secret: read("META_CLIENT_SECRET"),
            api_base_url: read("META_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(meta_defaults.api_base_url),
            api_version: meta_defaults.api_version,
        };

        let google_defaults = GoogleAdsConfig::default();
        let google = GoogleAdsConfig {
            developer_token: read("GOOGLE_DEVELOPER_TOKEN"),
            client_id: read("GOOGLE_CLIENT_ID"),
            client_secret: read("GOOGLE_CLIENT_SECRET"),
            login_customer_id: read("GOOGLE_LOGIN_CUSTOMER_ID"),
            api_base_url: read("GOOGLE_ADS_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(google_defaults.api_base_url),
            api_version: google_defaults.api_version,
            token_url: read("GOOGLE_OAUTH_TOKEN_URL").unwrap_or(google_defaults.token_url),
        };

        Ok(Self {
            listen_addr,
            data_dir: read("ADPULSE_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            encryption_key: read("ADPULSE_ENCRYPTION_KEY"),
            frontend_url: read("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            meta,
            google,
        })
    }
}

/// Strip whitespace and wrapping quotes left by hand-edited env files.
fn clean_value(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}
