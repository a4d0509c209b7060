//! Maps the component error taxonomy onto HTTP responses (spec §7): every handler
//! error becomes a JSON body `{detail, code, field?}` with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fieldline_core::error::ApiError;
use serde::Serialize;

pub struct ServerError(pub ApiError);

impl From<ApiError> for ServerError {
    fn from(err: ApiError) -> Self {
        ServerError(err)
    }
}

impl From<fieldline_storage::error::StorageError> for ServerError {
    fn from(err: fieldline_storage::error::StorageError) -> Self {
        ServerError(ApiError::from(err))
    }
}

impl From<fieldline_session::error::SessionError> for ServerError {
    fn from(err: fieldline_session::error::SessionError) -> Self {
        ServerError(ApiError::from(err))
    }
}

impl From<fieldline_scheduling::error::SchedulingError> for ServerError {
    fn from(err: fieldline_scheduling::error::SchedulingError) -> Self {
        ServerError(ApiError::from(err))
    }
}

impl From<fieldline_telephony::error::TelephonyError> for ServerError {
    fn from(err: fieldline_telephony::error::TelephonyError) -> Self {
        ServerError(ApiError::from(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let field = match &self.0 {
            ApiError::ConsentRequired { .. } => Some("consent"),
            _ => None,
        };
        let body = ErrorBody { detail: self.0.to_string(), code: self.0.code().to_string(), field };
        (status, Json(body)).into_response()
    }
}
