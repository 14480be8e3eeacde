use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use adpulse_core::integrations::{Integration, NewIntegration};
use adpulse_core::sync::SyncTrigger;
use adpulse_core::Platform;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
pub struct IntegrationsQuery {
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCreatedResponse {
    pub message: String,
    pub integration: Integration,
    /// Whether linking kicked off a sync; false when the budget is spent.
    pub sync_started: bool,
}

async fn list_integrations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IntegrationsQuery>,
) -> ApiResult<Json<Vec<Integration>>> {
    let platform = match query.platform.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(Platform::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?),
        None => None,
    };
    Ok(Json(state.sync_service.list_integrations(platform)?))
}

/// Link an account, then start a sync so its metrics show up without a manual trigger.
async fn add_integration(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewIntegration>,
) -> ApiResult<(StatusCode, Json<IntegrationCreatedResponse>)> {
    let integration = state.sync_service.add_integration(body).await?;

    let sync_started = match state.sync_service.trigger_sync().await {
        SyncTrigger::Started { task, .. } => {
            tokio::spawn(async move {
                if let Err(e) = task.await {
                    error!("Post-link sync task failed: {}", e);
                }
            });
            true
        }
        SyncTrigger::RateLimited(status) => {
            info!(
                "Skipping post-link sync; next slot frees in {}s",
                status.cooldown_seconds_remaining
            );
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(IntegrationCreatedResponse {
            message: format!(
                "Successfully connected {} account {}",
                integration.platform, integration.account_id
            ),
            integration,
            sync_started,
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/integrations", get(list_integrations).post(add_integration))
}
