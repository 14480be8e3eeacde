use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use adpulse_core::metrics::{CampaignMetric, LookbackWindow};
use adpulse_core::sync::{SyncRateStatus, SyncRunReport, SyncTrigger};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub range: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStartedResponse {
    pub status: &'static str,
    pub message: String,
    pub syncs_remaining: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResetResponse {
    pub status: &'static str,
    pub sync_status: SyncRateStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Cached rows for one window across both platforms. Never calls a platform API.
async fn get_insights(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InsightsQuery>,
) -> ApiResult<Json<Vec<CampaignMetric>>> {
    let window = match query.range {
        Some(days) => LookbackWindow::try_from(days)?,
        None => LookbackWindow::default(),
    };
    Ok(Json(state.sync_service.get_cached(window).await?))
}

async fn get_all_insights(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<String, Vec<CampaignMetric>>>> {
    let all = state.sync_service.get_cached_all().await?;
    Ok(Json(
        all.into_iter()
            .map(|(days, rows)| (days.to_string(), rows))
            .collect(),
    ))
}

async fn get_sync_status(State(state): State<Arc<AppState>>) -> Json<SyncRateStatus> {
    Json(state.sync_service.get_status().await)
}

/// Start a background sync if the budget allows. Returns 202 without waiting.
async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<SyncStartedResponse>)> {
    match state.sync_service.trigger_sync().await {
        SyncTrigger::Started {
            syncs_remaining,
            task,
        } => {
            tokio::spawn(async move {
                match task.await {
                    Ok(report) => info!(
                        "Background sync finished: {} row(s), success={}",
                        report.rows_written(),
                        report.success()
                    ),
                    Err(e) => error!("Background sync task failed: {}", e),
                }
            });
            Ok((
                StatusCode::ACCEPTED,
                Json(SyncStartedResponse {
                    status: "started",
                    message: "Syncing data in background...".to_string(),
                    syncs_remaining,
                }),
            ))
        }
        SyncTrigger::RateLimited(status) => Err(ApiError::RateLimited(status)),
    }
}

async fn reset_sync_limit(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncResetResponse>> {
    state.sync_service.reset_limit().await?;
    info!("Sync limit reset");
    Ok(Json(SyncResetResponse {
        status: "reset",
        sync_status: state.sync_service.get_status().await,
    }))
}

/// Report of the most recent finished background sync, or `null`.
async fn get_last_run(State(state): State<Arc<AppState>>) -> Json<Option<SyncRunReport>> {
    Json(state.sync_service.last_run().await)
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/insights", get(get_insights))
        .route("/insights/all", get(get_all_insights))
        .route("/insights/sync-status", get(get_sync_status))
        .route("/insights/sync", post(trigger_sync))
        .route("/insights/sync/reset", post(reset_sync_limit))
        .route("/insights/sync/last-run", get(get_last_run))
}
