//! Errors raised by the Session Supervisor and Job Service (spec §4.9-§4.10).

use fieldline_core::error::ApiError;
use fieldline_core::prelude::JobStatus;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The live-session cap is already reached; the caller should issue a busy signal.
    #[error("session registry overloaded")]
    Overloaded,
    #[error("session not found")]
    NotFound,
    #[error("cannot transition job from {from:?} to {to:?}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<fieldline_storage::error::StorageError> for SessionError {
    fn from(err: fieldline_storage::error::StorageError) -> Self {
        SessionError::Storage(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Overloaded => ApiError::Overloaded("session registry overloaded".into()),
            SessionError::NotFound => ApiError::NotFound { kind: "session", id: "?".into() },
            SessionError::IllegalTransition { from, to } => ApiError::Conflict {
                code: "illegal_transition",
                message: format!("cannot transition job from {from:?} to {to:?}"),
            },
            SessionError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
