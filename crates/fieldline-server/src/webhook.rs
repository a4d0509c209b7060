//! Telephony provider webhook endpoint (spec §4.1, §6): verifies the HMAC signature
//! and staleness before the body is parsed any further.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use fieldline_core::error::ApiError;
use fieldline_telephony::prelude::verify_webhook;
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub timestamp: chrono::DateTime<Utc>,
    #[serde(flatten)]
    pub event: serde_json::Value,
}

pub async fn telephony_event(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ServerError> {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-Signature header".into()))?;

    let envelope: WebhookEnvelope =
        serde_json::from_str(&body).map_err(|e| ApiError::Validation(format!("malformed webhook body: {e}")))?;

    verify_webhook(
        state.config.webhook_secret.as_bytes(),
        body.as_bytes(),
        signature,
        envelope.timestamp,
        Utc::now(),
        state.config.webhook_signature_tolerance_s as i64,
    )
    .map_err(ApiError::from)?;

    tracing::info!(event = %envelope.event, "telephony webhook verified");
    Ok(Json(serde_json::json!({ "accepted": true })))
}
