use adpulse_ad_platforms::AdPlatformAdapter;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::secrets::TokenCipher;
use crate::Platform;

/// Turns a stored credential into a usable bearer token.
///
/// Exchanged tokens are cached for the lifetime of the store, which the
/// orchestrator scopes to a single sync run.
pub struct CredentialStore {
    cipher: Arc<dyn TokenCipher>,
    exchanged: RwLock<HashMap<(Platform, String), String>>,
}

impl CredentialStore {
    pub fn new(cipher: Arc<dyn TokenCipher>) -> Self {
        Self {
            cipher,
            exchanged: RwLock::new(HashMap::new()),
        }
    }

    /// Decrypt `stored` and, unless it already is a bearer token, exchange it.
    ///
    /// On exchange failure the decrypted value is returned so the fetch can
    /// still be attempted with it.
    pub async fn resolve(&self, adapter: &dyn AdPlatformAdapter, stored: &str) -> String {
        let credential = self.cipher.decrypt(stored);
        if adapter.is_bearer_token(&credential) {
            return credential;
        }

        let platform = adapter.platform();
        let key = (platform, stored.to_string());
        if let Some(token) = self.exchanged.read().await.get(&key) {
            return token.clone();
        }

        match adapter.exchange_token(&credential).await {
            Ok(token) => {
                debug!("[Sync] Exchanged {} credential for a bearer token", platform);
                self.exchanged.write().await.insert(key, token.clone());
                token
            }
            Err(e) => {
                warn!(
                    "[Sync] {} token exchange failed, using stored credential: {}",
                    platform, e
                );
                credential
            }
        }
    }
}
