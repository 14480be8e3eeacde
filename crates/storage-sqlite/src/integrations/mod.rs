mod model;
mod repository;

pub use model::IntegrationDB;
pub use repository::IntegrationRepository;
