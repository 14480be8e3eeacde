//! SQLite persistence for integrations, the sync rate-limit window and the
//! per-platform campaign metrics tables.

pub mod db;
pub mod errors;
pub mod integrations;
pub mod metrics;
pub mod rate_limit;
pub mod retry;
pub mod schema;

pub use db::{create_pool, get_connection, init, run_migrations, DbPool, WriteHandle};
pub use errors::StorageError;
pub use integrations::IntegrationRepository;
pub use metrics::{MetricsIndexStatus, MetricsStore, MetricsTable, SqliteMetricsTable, TableError};
pub use rate_limit::RateLimitRepository;
