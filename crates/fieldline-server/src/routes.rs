//! The REST/WS/webhook surface (spec §6), assembled into one `axum::Router`.

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::chat_ws;
use crate::handlers::{appointments, audit, consent, jobs, privacy, technicians, triage};
use crate::state::SharedState;
use crate::webhook::telephony_event;

pub fn build(state: SharedState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api = Router::new()
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/stats", get(jobs::job_stats))
        .route("/jobs/:id", get(jobs::get_job).delete(jobs::delete_job))
        .route("/jobs/:id/status", patch(jobs::update_status))
        .route("/jobs/:id/assign", patch(jobs::assign_job))
        .route("/triage/assess", post(triage::assess))
        .route("/technicians/search", post(technicians::search))
        .route("/appointments/slots", post(appointments::slots))
        .route("/appointments/book", post(appointments::book))
        .route("/consent/:contact_id", get(consent::list_consents).post(consent::grant_consent))
        .route("/consent/:contact_id/:kind", delete(consent::revoke_consent))
        .route("/audit", get(audit::query))
        .route("/audit/integrity", get(audit::integrity))
        .route("/export/:contact_id", get(privacy::export))
        .route("/erasure/:contact_id", delete(privacy::erasure));

    Router::new()
        .route("/health", get(health))
        .route("/chat", get(chat_ws))
        .route("/webhooks/telephony", post(telephony_event))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
