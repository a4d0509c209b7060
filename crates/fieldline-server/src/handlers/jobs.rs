//! `POST|GET /jobs`, `GET /jobs/{id}`, `PATCH /jobs/{id}/status`,
//! `PATCH /jobs/{id}/assign`, `DELETE /jobs/{id}`, `GET /jobs/stats` (spec §6).

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use fieldline_conversation::prelude::{IndustryProfile, TradesProfile};
use fieldline_core::prelude::*;
use std::result::Result;
use fieldline_session::prelude::{JobDraft, JobService};
use fieldline_storage::prelude::JobFilter;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub contact_id: ContactId,
    pub title: String,
    pub description: String,
    pub trade_category: TradeCategory,
    pub urgency: Urgency,
    #[serde(default = "default_source")]
    pub source: JobSource,
    pub address: Option<Address>,
    pub distance_km: Option<f64>,
    pub preferred_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub access_notes: Option<String>,
}

fn default_source() -> JobSource {
    JobSource::Form
}

pub async fn create_job(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Job>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let draft = JobDraft {
        contact_id: req.contact_id,
        title: req.title,
        description: req.description,
        trade_category: req.trade_category,
        urgency: req.urgency,
        source: req.source,
        address: req.address,
        distance_km: req.distance_km,
        preferred_window: req.preferred_window,
        access_notes: req.access_notes,
    };

    let rules = state.store.active_routing_rules(tenant).await.map_err(ApiError::from)?;
    let service = JobService::new(&state.store);
    let action_spec = TradesProfile::new().action_spec();
    let job = service
        .create(tenant, draft, SessionId::new(), &rules, Some(&state.scheduler), None, Some(&action_spec), Utc::now())
        .await?;

    state
        .audit
        .append(tenant, Actor::System, "job_created", "job", job.id.to_string(), serde_json::json!({}))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub urgency: Option<Urgency>,
    pub source: Option<JobSource>,
    pub q: Option<String>,
}

pub async fn list_jobs(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let filter = JobFilter {
        status: query.status,
        urgency: query.urgency,
        source: query.source,
        full_text: query.q,
        ..Default::default()
    };
    let jobs = state.store.list_jobs(tenant, filter).await.map_err(ApiError::from)?;
    Ok(Json(jobs))
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub history: Vec<JobHistoryEntry>,
}

pub async fn get_job(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<JobDetail>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let job = state.store.get_job(tenant, JobId(id)).await.map_err(ApiError::from)?;
    let history = state.store.job_history(job.id).await.map_err(ApiError::from)?;
    Ok(Json(JobDetail { job, history }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: JobStatus,
}

pub async fn update_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Job>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let job = state.store.get_job(tenant, JobId(id)).await.map_err(ApiError::from)?;
    let service = JobService::new(&state.store);
    let job = service.update_status(job, req.status, Utc::now(), Actor::System).await?;
    state
        .audit
        .append(
            tenant,
            Actor::System,
            "status_changed_via_api",
            "job",
            job.id.to_string(),
            serde_json::json!({ "status": job.status }),
        )
        .await
        .map_err(ApiError::from)?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub worker_id: WorkerId,
}

/// Assign a worker directly and recompute `routing_priority`/`department` against
/// the current active rules, so an admin override still leaves the Job in a state
/// the Routing Engine would itself produce (spec §6, "triggers Routing re-check").
pub async fn assign_job(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Job>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let mut job = state.store.get_job(tenant, JobId(id)).await.map_err(ApiError::from)?;
    let workers = state.store.list_workers(tenant, None).await.map_err(ApiError::from)?;
    let worker = workers
        .into_iter()
        .find(|w| w.id == req.worker_id)
        .ok_or_else(|| ApiError::NotFound { kind: "worker", id: req.worker_id.to_string() })?;

    job.assigned_worker = Some(worker.id);
    job.assigned_department = Some(worker.department_id);
    if job.status == JobStatus::New {
        job.status = JobStatus::Assigned;
    }
    job.routing_reason = Some("manual_assignment".to_string());
    job.updated_at = Utc::now();
    state.store.update_job(&job).await.map_err(ApiError::from)?;
    state
        .store
        .append_job_history(&JobHistoryEntry {
            job_id: job.id,
            actor: Actor::System,
            action: "assigned_via_api".to_string(),
            timestamp: job.updated_at,
            detail: serde_json::json!({ "worker_id": worker.id }),
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn delete_job(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<uuid::Uuid>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Job>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let mut job = state.store.get_job(tenant, JobId(id)).await.map_err(ApiError::from)?;
    job.cancel_reason = body.and_then(|b| b.0.reason).or_else(|| Some("deleted via API".to_string()));
    let service = JobService::new(&state.store);
    let job = service.update_status(job, JobStatus::Cancelled, Utc::now(), Actor::System).await?;
    Ok(Json(job))
}

#[derive(Debug, Serialize, Default)]
pub struct JobStats {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub by_urgency: HashMap<String, usize>,
}

pub async fn job_stats(State(state): State<SharedState>, headers: HeaderMap) -> Result<Json<JobStats>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let jobs = state.store.list_jobs(tenant, JobFilter::default()).await.map_err(ApiError::from)?;
    let mut stats = JobStats { total: jobs.len(), ..Default::default() };
    for job in &jobs {
        *stats.by_status.entry(format!("{:?}", job.status)).or_insert(0) += 1;
        *stats.by_urgency.entry(format!("{:?}", job.urgency)).or_insert(0) += 1;
    }
    Ok(Json(stats))
}
