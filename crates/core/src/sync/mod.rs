//! Sync pipeline: rate limiting, credential and account resolution, and the
//! fan-out that refreshes the metrics cache.

mod account_resolver;
mod credential_store;
mod rate_limit_model;
mod rate_limiter;
mod sync_model;
mod sync_orchestrator;
mod sync_service;

pub use account_resolver::*;
pub use credential_store::*;
pub use rate_limit_model::*;
pub use rate_limiter::*;
pub use sync_model::*;
pub use sync_orchestrator::*;
pub use sync_service::*;
