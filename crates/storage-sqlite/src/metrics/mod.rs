//! Per-platform campaign metrics tables and the store that batches writes
//! into them and reads them back by lookback window.

mod model;
mod store;
mod table;

pub use model::{CampaignMetricRecord, UNKNOWN_ACCOUNT_NAME};
pub use store::MetricsStore;
pub use table::{MetricsIndexStatus, MetricsPage, MetricsTable, SqliteMetricsTable, TableError, MAX_BATCH_ITEMS};
