use std::sync::Arc;

use tracing::{info, warn};

use adpulse_ad_platforms::{AdPlatformAdapter, GoogleAdsAdapter, MetaAdsAdapter};
use adpulse_core::integrations::IntegrationRepositoryTrait;
use adpulse_core::metrics::MetricsRepositoryTrait;
use adpulse_core::secrets::{ChaChaTokenCipher, TokenCipher};
use adpulse_core::sync::{PlatformBinding, RateLimiter, SyncOrchestrator, SyncService};
use adpulse_core::{Platform, Result};
use adpulse_storage_sqlite::db::write_actor::spawn_writer;
use adpulse_storage_sqlite::{
    create_pool, init, run_migrations, IntegrationRepository, MetricsStore, MetricsTable, RateLimitRepository,
    SqliteMetricsTable,
};

use crate::config::ServerConfig;

pub type SqliteMetricsStore = MetricsStore<SqliteMetricsTable>;

pub struct AppState {
    pub sync_service: Arc<SyncService>,
    pub metrics_stores: Vec<(Platform, Arc<SqliteMetricsStore>)>,
}

/// Open storage, wire adapters and services, and make sure the window indexes exist.
pub async fn build_state(config: &ServerConfig) -> Result<Arc<AppState>> {
    let db_path = init(&config.data_dir)?;
    run_migrations(&db_path)?;
    let pool = create_pool(&db_path)?;
    let writer = spawn_writer(pool.as_ref().clone());
    info!("Database ready at {}", db_path);

    let cipher: Arc<dyn TokenCipher> =
        Arc::new(ChaChaTokenCipher::from_base64_key(config.encryption_key.as_deref())?);

    let integration_repository: Arc<dyn IntegrationRepositoryTrait> =
        Arc::new(IntegrationRepository::new(Arc::clone(&pool), writer.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(Arc::new(RateLimitRepository::new(
        Arc::clone(&pool),
        writer.clone(),
    ))));

    let mut metrics_stores = Vec::new();
    for platform in Platform::ALL {
        let table = SqliteMetricsTable::for_platform(Arc::clone(&pool), writer.clone(), platform);
        if let Err(e) = table.ensure_index().await {
            warn!("Could not ensure {} index: {}", table.index_name(), e);
        }
        metrics_stores.push((platform, Arc::new(MetricsStore::new(table, platform))));
    }

    let bindings = metrics_stores
        .iter()
        .map(|(platform, store)| {
            let adapter: Arc<dyn AdPlatformAdapter> = match platform {
                Platform::Meta => Arc::new(MetaAdsAdapter::new(config.meta.clone())),
                Platform::Google => Arc::new(GoogleAdsAdapter::new(config.google.clone())),
            };
            let metrics: Arc<dyn MetricsRepositoryTrait> = store.clone();
            PlatformBinding { adapter, metrics }
        })
        .collect();

    let orchestrator = SyncOrchestrator::new(Arc::clone(&integration_repository), Arc::clone(&cipher), bindings);
    let sync_service = Arc::new(SyncService::new(
        rate_limiter,
        orchestrator,
        integration_repository,
        cipher,
    ));

    Ok(Arc::new(AppState {
        sync_service,
        metrics_stores,
    }))
}
