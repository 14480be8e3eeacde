//! Domain layer for the ad metrics pipeline.
//!
//! Storage and HTTP adapters live in sibling crates; this crate only holds
//! models, repository traits and the services that drive a sync.

pub mod errors;
pub mod integrations;
pub mod metrics;
pub mod secrets;
pub mod sync;
pub mod utils;

pub use adpulse_ad_platforms::Platform;
pub use errors::{DatabaseError, Error, Result, ValidationError};
