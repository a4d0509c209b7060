//! `GET|POST /consent/{contact_id}`, `DELETE /consent/{contact_id}/{kind}` (spec §6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use fieldline_core::prelude::*;
use std::result::Result;
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

pub async fn list_consents(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(contact_id): Path<uuid::Uuid>,
) -> Result<Json<Vec<ConsentRecord>>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let records = state.store.list_consents(tenant, ContactId(contact_id)).await.map_err(ApiError::from)?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct GrantConsentRequest {
    pub kind: ConsentKind,
    pub method: ConsentMethod,
    pub originating_call_id: Option<String>,
    pub expires_at: Option<chrono::DateTime<Utc>>,
}

pub async fn grant_consent(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(contact_id): Path<uuid::Uuid>,
    Json(req): Json<GrantConsentRequest>,
) -> Result<Json<ConsentRecord>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let contact_id = ContactId(contact_id);
    let now = Utc::now();
    let record = ConsentRecord {
        id: ConsentId::new(),
        tenant_id: tenant,
        contact_id,
        kind: req.kind,
        granted_at: Some(now),
        revoked_at: None,
        method: req.method,
        originating_call_id: req.originating_call_id,
        expires_at: req.expires_at,
    };
    state.store.record_consent(&record).await.map_err(ApiError::from)?;
    state
        .audit
        .append(
            tenant,
            Actor::System,
            "consent_granted",
            "contact",
            contact_id.to_string(),
            serde_json::json!({ "kind": req.kind }),
        )
        .await
        .map_err(ApiError::from)?;
    Ok(Json(record))
}

pub async fn revoke_consent(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path((contact_id, kind)): Path<(uuid::Uuid, ConsentKind)>,
) -> Result<Json<()>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let contact_id = ContactId(contact_id);
    let now = Utc::now();
    state.store.revoke_consent(tenant, contact_id, kind, now).await.map_err(ApiError::from)?;
    state
        .audit
        .append(
            tenant,
            Actor::System,
            "consent_revoked",
            "contact",
            contact_id.to_string(),
            serde_json::json!({ "kind": kind }),
        )
        .await
        .map_err(ApiError::from)?;
    Ok(Json(()))
}
