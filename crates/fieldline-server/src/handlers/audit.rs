//! `GET /audit` and `GET /audit/integrity` (spec §6, admin-only).

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use fieldline_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Deserialize, Default)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

pub async fn query(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let entries = state.audit.query(tenant, q.limit.unwrap_or(1000)).await.map_err(ApiError::from)?;
    Ok(Json(entries))
}

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub detail: Option<String>,
}

pub async fn integrity(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<IntegrityReport>, ServerError> {
    let tenant = tenant_id(&headers)?;
    match state.audit.verify_integrity(tenant).await {
        Ok(()) => Ok(Json(IntegrityReport { valid: true, detail: None })),
        Err(fieldline_storage::error::StorageError::Integrity(detail)) => {
            Ok(Json(IntegrityReport { valid: false, detail: Some(detail) }))
        }
        Err(err) => Err(ApiError::from(err).into()),
    }
}
