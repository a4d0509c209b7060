use fieldline_core::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("not found: {kind} {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("audit chain integrity failure: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound { kind: "row", id: "?".into() },
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Conflict(err.to_string())
            }
            _ => StorageError::Query(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => ApiError::NotFound { kind, id },
            StorageError::Conflict(msg) => ApiError::Conflict { code: "unique_violation", message: msg },
            StorageError::Integrity(msg) => ApiError::Integrity(msg),
            StorageError::Connection(msg) | StorageError::Query(msg) => ApiError::Internal(msg),
        }
    }
}
