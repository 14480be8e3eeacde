//! Cached campaign metrics.

mod metrics_model;
mod metrics_traits;

pub use metrics_model::*;
pub use metrics_traits::*;
