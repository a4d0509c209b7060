//! `POST /technicians/search` (spec §6): ranked candidates for an existing Job.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use fieldline_core::prelude::*;
use std::result::Result;
use fieldline_routing::prelude::{rank_candidates, MatchOutcome};
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub required_certifications: Vec<String>,
}

pub async fn search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> Result<Json<MatchOutcome>, ServerError> {
    let tenant = tenant_id(&headers)?;
    let job = state.store.get_job(tenant, req.job_id).await.map_err(ApiError::from)?;
    let workers = state.store.list_workers(tenant, None).await.map_err(ApiError::from)?;
    let outcome = rank_candidates(&job, &workers, &req.required_certifications, Utc::now());
    Ok(Json(outcome))
}
