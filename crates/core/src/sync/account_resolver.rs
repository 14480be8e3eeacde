use adpulse_ad_platforms::AdPlatformAdapter;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::integrations::{Integration, IntegrationRepositoryTrait, IntegrationStatus};
use crate::Platform;

/// Label given to accounts found through discovery.
pub fn discovered_account_name(platform: Platform, account_id: &str) -> String {
    match platform {
        Platform::Google => format!("Google Account ({})", account_id),
        Platform::Meta => format!("Meta Account ({})", account_id),
    }
}

/// Maps an integration to the concrete account ids a fetch should target.
///
/// Placeholder integrations (owner email instead of an account id) go
/// through discovery once per owner per run; every discovered id is also
/// persisted as its own integration so later runs can skip discovery.
pub struct AccountResolver {
    integration_repository: Arc<dyn IntegrationRepositoryTrait>,
    discovered: Mutex<HashMap<(Platform, String), Vec<String>>>,
}

impl AccountResolver {
    pub fn new(integration_repository: Arc<dyn IntegrationRepositoryTrait>) -> Self {
        Self {
            integration_repository,
            discovered: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(
        &self,
        adapter: &dyn AdPlatformAdapter,
        integration: &Integration,
        token: &str,
    ) -> Vec<String> {
        if !integration.is_placeholder() {
            return vec![integration.account_id.clone()];
        }

        let platform = adapter.platform();
        if !adapter.supports_discovery() {
            warn!(
                "[Sync] {} integration '{}' has no account id and {} cannot discover accounts",
                platform, integration.account_id, platform
            );
            return Vec::new();
        }

        let owner = if integration.email.trim().is_empty() {
            integration.account_id.clone()
        } else {
            integration.email.trim().to_string()
        };
        let cache_key = (platform, owner.clone());

        // Held across discovery so concurrent units wait for the first result.
        let mut discovered = self.discovered.lock().await;
        if let Some(ids) = discovered.get(&cache_key) {
            debug!("[Sync] Reusing discovered {} accounts for {}", platform, owner);
            return ids.clone();
        }

        let ids = self.discover(adapter, &owner, token).await;
        if ids.is_empty() {
            warn!("[Sync] No {} accounts discovered for {}", platform, owner);
            return ids;
        }

        self.persist_discovered(integration, &ids).await;
        discovered.insert(cache_key, ids.clone());
        ids
    }

    async fn discover(&self, adapter: &dyn AdPlatformAdapter, owner: &str, token: &str) -> Vec<String> {
        let platform = adapter.platform();
        let base_ids = match adapter.list_accessible_accounts(token).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("[Sync] {} account discovery failed for {}: {}", platform, owner, e);
                return Vec::new();
            }
        };

        let mut all: BTreeSet<String> = base_ids.iter().cloned().collect();
        for base_id in &base_ids {
            match adapter.list_client_accounts(base_id, token).await {
                Ok(clients) => all.extend(clients),
                Err(e) => debug!("[Sync] {} is not a reachable manager account: {}", base_id, e),
            }
        }

        info!(
            "[Sync] Discovered {} {} account(s) for {}",
            all.len(),
            platform,
            owner
        );
        all.into_iter().collect()
    }

    async fn persist_discovered(&self, placeholder: &Integration, ids: &[String]) {
        for account_id in ids {
            let existing = match self
                .integration_repository
                .get_integration(placeholder.platform, account_id)
            {
                Ok(existing) => existing,
                Err(e) => {
                    warn!("[Sync] Could not look up integration {}: {}", account_id, e);
                    continue;
                }
            };

            let record = match existing {
                Some(current) if current.access_token == placeholder.access_token => continue,
                Some(current) => Integration {
                    access_token: placeholder.access_token.clone(),
                    ..current
                },
                None => Integration {
                    platform: placeholder.platform,
                    account_id: account_id.clone(),
                    account_name: Some(discovered_account_name(placeholder.platform, account_id)),
                    email: placeholder.email.clone(),
                    access_token: placeholder.access_token.clone(),
                    status: IntegrationStatus::Active,
                    last_synced: None,
                    created_at: chrono::Utc::now(),
                },
            };

            if let Err(e) = self.integration_repository.save_integration(record).await {
                warn!("[Sync] Failed to save discovered account {}: {}", account_id, e);
            }
        }
    }
}
