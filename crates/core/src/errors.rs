use adpulse_ad_platforms::AdPlatformError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Platform request failed: {0}")]
    Platform(#[from] AdPlatformError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Secret handling failed: {0}")]
    Secret(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The store rejected the request because it is saturated (locked, busy, pool exhausted).
    #[error("Store is throttling requests: {0}")]
    Throttled(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported lookback window: {0} days")]
    UnsupportedWindow(i64),
}

impl Error {
    /// Whether the failure is a transient capacity problem worth retrying.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Error::Database(DatabaseError::Throttled(_)))
    }
}
