//! Fan-out of fetch-and-store work across platforms and lookback windows.

use adpulse_ad_platforms::{AdPlatformAdapter, AdPlatformError, ApiRetryClass, ReportingRange};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::account_resolver::AccountResolver;
use super::credential_store::CredentialStore;
use super::sync_model::{
    AccountFetchOutcome, EmptyReason, PlatformSyncResult, SyncRunReport, SyncUnit, UnitReport,
    UnitStatus, SYNC_WORKER_CONCURRENCY,
};
use crate::errors::{Result, ValidationError};
use crate::integrations::{Integration, IntegrationRepositoryTrait, IntegrationStatus};
use crate::metrics::{fallback_account_name, CampaignMetric, LookbackWindow, MetricsRepositoryTrait};
use crate::secrets::TokenCipher;
use crate::utils::{Clock, SystemClock};
use crate::Platform;

/// Adapter and metrics cache serving one platform.
#[derive(Clone)]
pub struct PlatformBinding {
    pub adapter: Arc<dyn AdPlatformAdapter>,
    pub metrics: Arc<dyn MetricsRepositoryTrait>,
}

/// State shared by every unit of one run: exchanged tokens and discovered accounts.
struct RunContext {
    credentials: CredentialStore,
    resolver: AccountResolver,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    integration_repository: Arc<dyn IntegrationRepositoryTrait>,
    cipher: Arc<dyn TokenCipher>,
    bindings: Arc<HashMap<Platform, PlatformBinding>>,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    pub fn new(
        integration_repository: Arc<dyn IntegrationRepositoryTrait>,
        cipher: Arc<dyn TokenCipher>,
        bindings: Vec<PlatformBinding>,
    ) -> Self {
        Self::with_clock(integration_repository, cipher, bindings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        integration_repository: Arc<dyn IntegrationRepositoryTrait>,
        cipher: Arc<dyn TokenCipher>,
        bindings: Vec<PlatformBinding>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bindings = bindings
            .into_iter()
            .map(|binding| (binding.adapter.platform(), binding))
            .collect();
        Self {
            integration_repository,
            cipher,
            bindings: Arc::new(bindings),
            clock,
        }
    }

    pub fn metrics_for(&self, platform: Platform) -> Option<Arc<dyn MetricsRepositoryTrait>> {
        self.bindings.get(&platform).map(|b| Arc::clone(&b.metrics))
    }

    fn new_run_context(&self) -> RunContext {
        RunContext {
            credentials: CredentialStore::new(Arc::clone(&self.cipher)),
            resolver: AccountResolver::new(Arc::clone(&self.integration_repository)),
        }
    }

    /// Fetch and store one platform for one window.
    pub async fn sync_platform(&self, platform: Platform, window: LookbackWindow) -> Result<PlatformSyncResult> {
        let ctx = self.new_run_context();
        self.run_unit(&ctx, SyncUnit { platform, window }).await
    }

    /// Run every platform for every window, at most `SYNC_WORKER_CONCURRENCY` at a time.
    ///
    /// A failing unit is recorded in the report and never stops the others.
    pub async fn sync_all_platforms_all_windows(&self) -> SyncRunReport {
        let started_at = self.clock.now();
        let ctx = Arc::new(self.new_run_context());
        info!("[Sync] Starting full sync across {} unit(s)", SyncUnit::all().len());

        let units: Vec<UnitReport> = stream::iter(SyncUnit::all())
            .map(|unit| {
                let this = self.clone();
                let ctx = Arc::clone(&ctx);
                async move {
                    let handle = tokio::spawn(async move { this.run_unit(&ctx, unit).await });
                    let outcome = match handle.await {
                        Ok(result) => result,
                        Err(join_error) => Err(crate::errors::Error::Unexpected(format!(
                            "sync worker aborted: {}",
                            join_error
                        ))),
                    };
                    unit_report(unit, outcome)
                }
            })
            .buffer_unordered(SYNC_WORKER_CONCURRENCY)
            .collect()
            .await;

        let report = SyncRunReport {
            started_at,
            finished_at: self.clock.now(),
            units,
        };
        if report.success() {
            info!(
                "[Sync] Full sync finished: {} row(s) written",
                report.rows_written()
            );
        } else {
            warn!(
                "[Sync] Full sync finished with failed units: {} row(s) written",
                report.rows_written()
            );
        }
        report
    }

    async fn run_unit(&self, ctx: &RunContext, unit: SyncUnit) -> Result<PlatformSyncResult> {
        let binding = self.bindings.get(&unit.platform).ok_or_else(|| {
            ValidationError::InvalidInput(format!("no adapter registered for {}", unit.platform))
        })?;

        let integrations = self
            .integration_repository
            .list_integrations(Some(unit.platform))?;
        let mut result = PlatformSyncResult::default();
        if integrations.is_empty() {
            debug!("[Sync] No {} integrations; nothing to sync for {}", unit.platform, unit.window);
            return Ok(result);
        }

        if let Err(e) = binding.adapter.ensure_configured() {
            warn!("[Sync] Skipping {} for {}: {}", unit.platform, unit.window, e);
            result.accounts = integrations
                .iter()
                .map(|integration| AccountFetchOutcome::Empty {
                    account_id: integration.account_id.clone(),
                    reason: EmptyReason::NotConfigured(e.to_string()),
                })
                .collect();
            return Ok(result);
        }

        let range = ReportingRange::trailing_days(unit.window.days(), self.clock.now().date_naive());
        let mut seen: HashSet<String> = HashSet::new();

        for integration in &integrations {
            if !integration.is_complete() {
                debug!(
                    "[Sync] Skipping incomplete {} integration '{}'",
                    unit.platform, integration.account_id
                );
                continue;
            }

            let token = ctx
                .credentials
                .resolve(binding.adapter.as_ref(), &integration.access_token)
                .await;
            let account_ids = ctx
                .resolver
                .resolve(binding.adapter.as_ref(), integration, &token)
                .await;
            if account_ids.is_empty() {
                result.accounts.push(AccountFetchOutcome::Unresolved {
                    integration_account_id: integration.account_id.clone(),
                });
                continue;
            }

            for account_id in account_ids {
                if !seen.insert(account_id.clone()) {
                    debug!("[Sync] {} already synced in this unit", account_id);
                    continue;
                }

                let (outcome, rows) = self
                    .fetch_account(binding, integration, &account_id, &token, unit.window, &range)
                    .await;

                if let Some(first) = rows.first() {
                    let account_name = first.account_name.clone();
                    let report = binding.metrics.write_batch(rows.clone(), unit.window).await;
                    result.writes.merge(&report);
                    result.rows.extend(rows);

                    if let Err(e) = self
                        .integration_repository
                        .mark_synced(unit.platform, account_id.clone(), Some(account_name), self.clock.now())
                        .await
                    {
                        warn!("[Sync] Failed to stamp last sync for {}: {}", account_id, e);
                    }
                }
                result.accounts.push(outcome);
            }
        }

        info!(
            "[Sync] {} {}: {} row(s) from {} account(s)",
            unit.platform,
            unit.window,
            result.rows.len(),
            result.accounts.iter().filter(|a| a.is_fetched()).count()
        );
        Ok(result)
    }

    async fn fetch_account(
        &self,
        binding: &PlatformBinding,
        integration: &Integration,
        account_id: &str,
        token: &str,
        window: LookbackWindow,
        range: &ReportingRange,
    ) -> (AccountFetchOutcome, Vec<CampaignMetric>) {
        let adapter = binding.adapter.as_ref();
        let rows = match adapter.fetch_campaigns(account_id, token, range).await {
            Ok(rows) => rows,
            Err(AdPlatformError::NotConfigured { reason, .. }) => {
                return (
                    AccountFetchOutcome::Empty {
                        account_id: account_id.to_string(),
                        reason: EmptyReason::NotConfigured(reason),
                    },
                    Vec::new(),
                )
            }
            Err(e) => {
                if e.retry_class() == ApiRetryClass::ReauthRequired {
                    warn!(
                        "[Sync] {} rejected the credential for {}; the account must be relinked: {}",
                        adapter.platform(),
                        account_id,
                        e
                    );
                    if let Err(status_err) = self
                        .integration_repository
                        .set_status(
                            integration.platform,
                            integration.account_id.clone(),
                            IntegrationStatus::Disconnected,
                        )
                        .await
                    {
                        warn!(
                            "[Sync] Failed to mark {} integration {} disconnected: {}",
                            integration.platform, integration.account_id, status_err
                        );
                    }
                } else {
                    error!("[Sync] {} fetch failed for {}: {}", adapter.platform(), account_id, e);
                }
                return (
                    AccountFetchOutcome::Empty {
                        account_id: account_id.to_string(),
                        reason: EmptyReason::FetchFailed(e.to_string()),
                    },
                    Vec::new(),
                );
            }
        };

        if rows.is_empty() {
            return (
                AccountFetchOutcome::Empty {
                    account_id: account_id.to_string(),
                    reason: EmptyReason::NoData,
                },
                Vec::new(),
            );
        }

        let account_name = match rows.iter().find_map(|r| r.account_name.clone()) {
            Some(name) => name,
            None if integration.account_id == account_id && integration.has_display_name() => {
                integration.display_name().to_string()
            }
            None => match adapter.account_display_name(account_id, token).await {
                Ok(name) => name,
                Err(e) => {
                    debug!("[Sync] Could not resolve name for {}: {}", account_id, e);
                    fallback_account_name(account_id)
                }
            },
        };

        let synced_at = self.clock.now();
        let metrics: Vec<CampaignMetric> = rows
            .into_iter()
            .map(|row| CampaignMetric::from_row(row, adapter.platform(), window, &account_name, synced_at))
            .collect();

        (
            AccountFetchOutcome::Fetched {
                account_id: account_id.to_string(),
                rows: metrics.len(),
            },
            metrics,
        )
    }
}

fn unit_report(unit: SyncUnit, outcome: Result<PlatformSyncResult>) -> UnitReport {
    match outcome {
        Ok(result) => UnitReport {
            unit,
            status: UnitStatus::Completed,
            rows_written: result.writes.written,
            accounts: result.accounts,
            dropped_chunks: result.writes.dropped_chunks,
        },
        Err(e) => {
            error!("[Sync] {} {} failed: {}", unit.platform, unit.window, e);
            UnitReport {
                unit,
                status: UnitStatus::Failed(e.to_string()),
                rows_written: 0,
                accounts: Vec::new(),
                dropped_chunks: 0,
            }
        }
    }
}
