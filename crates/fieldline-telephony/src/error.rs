use fieldline_core::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelephonyError {
    #[error("provider unavailable")]
    ProviderUnavailable,

    #[error("call gone")]
    CallGone,

    #[error("transfer rejected: {0}")]
    TransferRejected(String),

    #[error("webhook signature did not verify")]
    InvalidSignature,

    #[error("webhook timestamp is stale")]
    StaleTimestamp,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("speech-to-text provider unavailable")]
    STTUnavailable,

    #[error("language model timed out")]
    LLMTimeout,

    #[error("text-to-speech transient failure")]
    TTSTransientFailure,
}

impl From<TelephonyError> for ApiError {
    fn from(err: TelephonyError) -> Self {
        match err {
            TelephonyError::InvalidSignature => ApiError::Unauthorized(err.to_string()),
            TelephonyError::StaleTimestamp => ApiError::Unauthorized(err.to_string()),
            TelephonyError::ProviderUnavailable => ApiError::ProviderTransient(err.to_string()),
            TelephonyError::CallGone => ApiError::NotFound { kind: "call", id: "?".into() },
            TelephonyError::TransferRejected(msg) => ApiError::Conflict { code: "transfer_rejected", message: msg },
        }
    }
}

pub type Result<T> = std::result::Result<T, TelephonyError>;
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
