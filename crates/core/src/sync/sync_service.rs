use chrono::Utc;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::rate_limit_model::{SyncAdmission, SyncRateStatus};
use super::rate_limiter::RateLimiter;
use super::sync_model::SyncRunReport;
use super::sync_orchestrator::SyncOrchestrator;
use crate::errors::Result;
use crate::integrations::{Integration, IntegrationRepositoryTrait, IntegrationStatus, NewIntegration};
use crate::metrics::{CampaignMetric, LookbackWindow};
use crate::secrets::TokenCipher;
use crate::Platform;

/// Answer to a sync request.
#[derive(Debug)]
pub enum SyncTrigger {
    /// A background run was spawned. `syncs_remaining` accounts for this run.
    Started {
        syncs_remaining: usize,
        task: JoinHandle<SyncRunReport>,
    },
    RateLimited(SyncRateStatus),
}

/// Entry point used by the HTTP layer.
pub struct SyncService {
    rate_limiter: Arc<RateLimiter>,
    orchestrator: SyncOrchestrator,
    integration_repository: Arc<dyn IntegrationRepositoryTrait>,
    cipher: Arc<dyn TokenCipher>,
    last_run: Arc<RwLock<Option<SyncRunReport>>>,
}

impl SyncService {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        orchestrator: SyncOrchestrator,
        integration_repository: Arc<dyn IntegrationRepositoryTrait>,
        cipher: Arc<dyn TokenCipher>,
    ) -> Self {
        Self {
            rate_limiter,
            orchestrator,
            integration_repository,
            cipher,
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get_status(&self) -> SyncRateStatus {
        self.rate_limiter.status().await
    }

    /// Reserve a slot and start a full sync in the background.
    ///
    /// The slot is returned if the run does not complete every unit.
    pub async fn trigger_sync(&self) -> SyncTrigger {
        let (reserved_at, status) = match self.rate_limiter.try_acquire().await {
            SyncAdmission::Granted { reserved_at, status } => (reserved_at, status),
            SyncAdmission::Rejected(status) => return SyncTrigger::RateLimited(status),
        };

        info!(
            "[Sync] Manual sync accepted ({} of {} slot(s) left)",
            status.syncs_remaining, status.max_syncs
        );

        let orchestrator = self.orchestrator.clone();
        let rate_limiter = Arc::clone(&self.rate_limiter);
        let last_run = Arc::clone(&self.last_run);
        let task = tokio::spawn(async move {
            let report = orchestrator.sync_all_platforms_all_windows().await;
            if !report.success() {
                warn!("[Sync] Sync run incomplete; returning its slot");
                rate_limiter.release(reserved_at).await;
            }
            *last_run.write().await = Some(report.clone());
            report
        });

        SyncTrigger::Started {
            syncs_remaining: status.syncs_remaining,
            task,
        }
    }

    pub async fn last_run(&self) -> Option<SyncRunReport> {
        self.last_run.read().await.clone()
    }

    /// Cached rows for `window` across every platform.
    pub async fn get_cached(&self, window: LookbackWindow) -> Result<Vec<CampaignMetric>> {
        let mut rows = Vec::new();
        for platform in Platform::ALL {
            rows.extend(self.get_cached_for(platform, window).await?);
        }
        Ok(rows)
    }

    pub async fn get_cached_for(&self, platform: Platform, window: LookbackWindow) -> Result<Vec<CampaignMetric>> {
        match self.orchestrator.metrics_for(platform) {
            Some(metrics) => metrics.read_range(window).await,
            None => Ok(Vec::new()),
        }
    }

    /// Cached rows for every window, keyed by day count.
    pub async fn get_cached_all(&self) -> Result<BTreeMap<u32, Vec<CampaignMetric>>> {
        let mut all = BTreeMap::new();
        for window in LookbackWindow::ALL {
            all.insert(window.days(), self.get_cached(window).await?);
        }
        Ok(all)
    }

    /// Integrations with credentials masked.
    pub fn list_integrations(&self, platform: Option<Platform>) -> Result<Vec<Integration>> {
        Ok(self
            .integration_repository
            .list_integrations(platform)?
            .iter()
            .map(Integration::masked)
            .collect())
    }

    /// Encrypt the credential and upsert the integration. Returns the masked record.
    pub async fn add_integration(&self, input: NewIntegration) -> Result<Integration> {
        input.validate()?;
        let existing = self
            .integration_repository
            .get_integration(input.platform, input.account_id.trim())?;

        let integration = Integration {
            platform: input.platform,
            account_id: input.account_id.trim().to_string(),
            account_name: input
                .account_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .or_else(|| existing.as_ref().and_then(|e| e.account_name.clone())),
            email: input.email.trim().to_string(),
            access_token: self.cipher.encrypt(input.access_token.trim())?,
            status: IntegrationStatus::Active,
            last_synced: existing.as_ref().and_then(|e| e.last_synced),
            created_at: existing.as_ref().map(|e| e.created_at).unwrap_or_else(Utc::now),
        };

        let saved = self.integration_repository.save_integration(integration).await?;
        info!(
            "[Sync] Linked {} account {}",
            saved.platform,
            saved.account_id
        );
        Ok(saved.masked())
    }

    pub async fn reset_limit(&self) -> Result<()> {
        self.rate_limiter.reset().await.map_err(|e| {
            error!("[Sync] Failed to reset sync window: {}", e);
            e
        })
    }
}
