//! `GET /export/{contact_id}` and `DELETE /erasure/{contact_id}` (spec §6, §8
//! scenario 6).

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use fieldline_core::prelude::*;
use std::result::Result;
use fieldline_storage::prelude::JobFilter;
use serde::Serialize;

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Serialize)]
pub struct ContactExport {
    pub contact: Contact,
    pub jobs: Vec<Job>,
    pub consents: Vec<ConsentRecord>,
}

pub async fn export(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(contact_id): Path<uuid::Uuid>,
) -> Result<Json<ContactExport>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let contact_id = ContactId(contact_id);
    let contact = state.store.get_contact(tenant, contact_id).await.map_err(ApiError::from)?;
    let jobs = state
        .store
        .list_jobs(tenant, JobFilter { contact_id: Some(contact_id), ..Default::default() })
        .await
        .map_err(ApiError::from)?;
    let consents = state.store.list_consents(tenant, contact_id).await.map_err(ApiError::from)?;
    Ok(Json(ContactExport { contact, jobs, consents }))
}

/// Scrub every record linked to a contact (spec §8 scenario 6): the contact itself is
/// anonymized in place, and every non-terminal Job tied to it is cancelled. Audit rows
/// already written are never touched; only a new `erasure_executed` entry is appended.
pub async fn erasure(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(contact_id): Path<uuid::Uuid>,
) -> Result<Json<()>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let contact_id = ContactId(contact_id);
    let now = Utc::now();

    let mut contact = state.store.get_contact(tenant, contact_id).await.map_err(ApiError::from)?;
    contact.anonymize(now);
    state.store.upsert_contact(&contact).await.map_err(ApiError::from)?;

    let jobs = state
        .store
        .list_jobs(tenant, JobFilter { contact_id: Some(contact_id), ..Default::default() })
        .await
        .map_err(ApiError::from)?;
    for mut job in jobs.into_iter().filter(|j| !j.status.is_terminal()) {
        job.status = JobStatus::Cancelled;
        job.cancel_reason = Some("erasure_executed".to_string());
        job.updated_at = now;
        state.store.update_job(&job).await.map_err(ApiError::from)?;
    }

    state
        .audit
        .append(tenant, Actor::System, "erasure_executed", "contact", contact_id.to_string(), serde_json::json!({}))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(()))
}
