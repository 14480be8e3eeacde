//! Linked advertising accounts.

mod integrations_model;
mod integrations_traits;

pub use integrations_model::*;
pub use integrations_traits::*;
