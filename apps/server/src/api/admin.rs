use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use adpulse_core::Platform;
use adpulse_storage_sqlite::{MetricsIndexStatus, MetricsTable};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatusEntry {
    pub platform: Platform,
    pub table: String,
    pub index: String,
    pub status: MetricsIndexStatus,
}

async fn get_index_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<IndexStatusEntry>>> {
    let mut entries = Vec::new();
    for (platform, store) in &state.metrics_stores {
        let table = store.table();
        let status = table
            .index_status()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        entries.push(IndexStatusEntry {
            platform: *platform,
            table: table.table_name().to_string(),
            index: table.index_name().to_string(),
            status,
        });
    }
    Ok(Json(entries))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/admin/index-status", get(get_index_status))
}
