//! Errors for appointment slot search and booking (spec §4.8).

use fieldline_core::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// The slot was taken between search and booking; the caller should re-search.
    #[error("slot unavailable")]
    SlotUnavailable,
    #[error("no open slot matches the given criteria")]
    NoSlotsFound,
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::SlotUnavailable => {
                ApiError::Conflict { code: "slot_unavailable", message: err.to_string() }
            }
            SchedulingError::NoSlotsFound => ApiError::NotFound { kind: "slot", id: "?".into() },
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
