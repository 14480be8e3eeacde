use adpulse_core::errors::{DatabaseError, Error};
use diesel::result::Error as DieselError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] DieselError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Writer unavailable: {0}")]
    Writer(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// SQLite reports lock contention through the error message only.
pub(crate) fn is_busy_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
}

impl StorageError {
    /// Whether the store is saturated rather than broken.
    pub fn is_throttled(&self) -> bool {
        match self {
            StorageError::Query(DieselError::DatabaseError(_, info)) => is_busy_message(info.message()),
            StorageError::Pool(_) => true,
            _ => false,
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        if err.is_throttled() {
            return Error::Database(DatabaseError::Throttled(err.to_string()));
        }
        match err {
            StorageError::Query(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            StorageError::Query(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Pool(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::Connection(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::Migration(msg) => Error::Database(DatabaseError::MigrationFailed(msg)),
            StorageError::Writer(msg) => Error::Database(DatabaseError::Internal(msg)),
            StorageError::InvalidData(msg) => Error::Database(DatabaseError::Internal(msg)),
            StorageError::Io(e) => Error::Database(DatabaseError::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_database_maps_to_throttled() {
        assert!(is_busy_message("database is locked"));
        assert!(is_busy_message("Database Table Is Locked: metrics"));
        assert!(!is_busy_message("no such table: metrics"));
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let err: Error = StorageError::Query(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
        assert!(!err.is_throttled());
    }
}
