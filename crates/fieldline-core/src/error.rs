//! Shared error taxonomy (spec §7).
//!
//! Component crates define their own scoped error enums (`RoutingError`,
//! `SchedulingError`, …); each implements `Into<ApiError>` so the HTTP layer
//! (`fieldline-server`) can map any of them to a status code without knowing which
//! component raised it, the way `rvoip-call-engine::error::CallCenterError` aggregates
//! dialog, media and database errors behind one type.

use thiserror::Error;

/// The taxonomic error kinds of spec §7, independent of which component raised them.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict ({code}): {message}")]
    Conflict { code: &'static str, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("consent required for {kind:?}")]
    ConsentRequired { kind: crate::model::ConsentKind },

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("provider transient error: {0}")]
    ProviderTransient(String),

    #[error("provider fatal error: {0}")]
    ProviderFatal(String),

    #[error("audit integrity failure: {0}")]
    Integrity(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status code this error maps to (spec §7).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound { .. } => 404,
            ApiError::Conflict { .. } => 409,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) | ApiError::ConsentRequired { .. } => 403,
            ApiError::Overloaded(_) => 429,
            ApiError::ProviderTransient(_) | ApiError::ProviderFatal(_) => 502,
            ApiError::Integrity(_) => 500,
            ApiError::Internal(_) => 500,
        }
    }

    /// The machine-readable `code` field of the `{detail, code, field?}` error body.
    pub fn code(&self) -> &str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Conflict { code, .. } => code,
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::ConsentRequired { .. } => "consent_required",
            ApiError::Overloaded(_) => "overloaded",
            ApiError::ProviderTransient(_) => "provider_transient",
            ApiError::ProviderFatal(_) => "provider_fatal",
            ApiError::Integrity(_) => "integrity_failure",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(ApiError::Validation("x".into()).status_code(), 400);
        assert_eq!(ApiError::NotFound { kind: "job", id: "1".into() }.status_code(), 404);
        assert_eq!(
            ApiError::Conflict { code: "slot_unavailable", message: "x".into() }.status_code(),
            409
        );
        assert_eq!(ApiError::Overloaded("x".into()).status_code(), 429);
        assert_eq!(
            ApiError::ConsentRequired { kind: crate::model::ConsentKind::CallRecording }
                .status_code(),
            403
        );
    }
}
