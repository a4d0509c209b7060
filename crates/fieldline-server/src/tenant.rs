//! Tenant resolution: every REST path is tenant-scoped (spec §6) via the
//! `X-Tenant-Id` header rather than a path segment, so the routing table stays flat.

use axum::http::HeaderMap;
use fieldline_core::error::ApiError;
use fieldline_core::prelude::TenantId;

pub fn tenant_id(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let raw = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing X-Tenant-Id header".into()))?;
    raw.parse::<uuid::Uuid>()
        .map(TenantId)
        .map_err(|_| ApiError::Validation("X-Tenant-Id is not a valid UUID".into()))
}
