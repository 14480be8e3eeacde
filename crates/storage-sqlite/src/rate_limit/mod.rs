mod model;
mod repository;

pub use model::SyncRateLimitDB;
pub use repository::{RateLimitRepository, GLOBAL_TRACKER_ID};
