//! HTTP surface for the ad metrics pipeline.

pub mod api;
pub mod config;
pub mod error;
pub mod main_lib;

pub use api::app_router;
pub use config::ServerConfig;
pub use main_lib::{build_state, AppState};
