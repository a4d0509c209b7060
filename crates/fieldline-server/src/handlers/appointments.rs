//! `POST /appointments/slots` and `POST /appointments/book` (spec §6, §4.8).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Datelike, Utc};
use fieldline_core::prelude::*;
use std::result::Result;
use fieldline_scheduling::prelude::{find_slots, SchedulingError, SlotCriteria};
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Deserialize)]
pub struct SlotsRequest {
    pub job_id: JobId,
    pub worker_id: WorkerId,
}

pub async fn slots(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SlotsRequest>,
) -> Result<Json<Vec<TimeSlot>>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let job = state.store.get_job(tenant, req.job_id).await.map_err(ApiError::from)?;
    let workers = state.store.list_workers(tenant, None).await.map_err(ApiError::from)?;
    let worker = workers
        .into_iter()
        .find(|w| w.id == req.worker_id)
        .ok_or_else(|| ApiError::NotFound { kind: "worker", id: req.worker_id.to_string() })?;
    let departments = state.store.list_departments(tenant).await.map_err(ApiError::from)?;
    let department = departments
        .into_iter()
        .find(|d| d.id == worker.department_id)
        .ok_or_else(|| ApiError::NotFound { kind: "department", id: worker.department_id.to_string() })?;

    let now = Utc::now();
    let mut criteria = SlotCriteria::new(job.trade_category.clone(), job.urgency, now.max(job.created_at));
    if let Some((from, to)) = job.preferred_window {
        criteria.preferred_weekday = Some(from.weekday());
        criteria.preferred_window = Some((from.time(), to.time()));
    }

    let existing: Vec<DateTime<Utc>> = state
        .store
        .list_jobs(tenant, Default::default())
        .await
        .map_err(ApiError::from)?
        .into_iter()
        .filter(|j| j.assigned_worker == Some(worker.id) && j.id != job.id)
        .filter_map(|j| j.scheduled_at)
        .collect();

    let found = find_slots(&criteria, &department.working_hours, &worker, &existing, &[], now);
    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub start: DateTime<Utc>,
}

/// Atomic booking (spec §4.8 `book`): acquires the in-process slot lock, then
/// re-verifies against `jobs` before persisting, so a race loses to whichever
/// caller's `commit` runs first.
pub async fn book(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<BookRequest>,
) -> Result<Json<Job>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let mut job = state.store.get_job(tenant, req.job_id).await.map_err(ApiError::from)?;

    let store = &state.store;
    let job_id = job.id;
    let worker_id = req.worker_id;
    let start = req.start;
    state
        .scheduler
        .book(worker_id, start, || async move {
            let existing = store
                .list_jobs(tenant, Default::default())
                .await
                .map_err(|_| SchedulingError::SlotUnavailable)?;
            let taken = existing
                .iter()
                .any(|j| j.assigned_worker == Some(worker_id) && j.scheduled_at == Some(start) && j.id != job_id);
            if taken {
                return Err(SchedulingError::SlotUnavailable);
            }
            let mut fresh = store.get_job(tenant, job_id).await.map_err(|_| SchedulingError::SlotUnavailable)?;
            fresh.assigned_worker = Some(worker_id);
            fresh.scheduled_at = Some(start);
            fresh.updated_at = Utc::now();
            store.update_job(&fresh).await.map_err(|_| SchedulingError::SlotUnavailable)
        })
        .await?;

    state.store.adjust_worker_load(worker_id, 1).await.map_err(ApiError::from)?;
    job = state.store.get_job(tenant, req.job_id).await.map_err(ApiError::from)?;
    state
        .store
        .append_job_history(&JobHistoryEntry {
            job_id: job.id,
            actor: Actor::System,
            action: "booked_via_api".to_string(),
            timestamp: job.updated_at,
            detail: serde_json::json!({ "worker_id": worker_id, "start": start }),
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(job))
}
