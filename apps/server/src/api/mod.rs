use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::main_lib::AppState;

mod admin;
mod insights;
mod integrations;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Backend is running" }))
}

/// Full router with CORS restricted to the dashboard origins.
pub fn app_router(state: Arc<AppState>, frontend_url: &str) -> Router {
    let origins: Vec<HeaderValue> = ["http://localhost:3000", "http://127.0.0.1:3000", frontend_url]
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .merge(insights::router())
        .merge(integrations::router())
        .merge(admin::router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
