//! End-to-end tests against a real server bound to an ephemeral port, modeled on
//! the teacher's `users-core` integration test harness.

use std::collections::HashMap;
use std::sync::Arc;

use fieldline_core::config::{
    FieldlineConfig, InferenceTimeouts, LoggingConfig, SessionLimits, StorageConfig, TenantSettings,
};
use fieldline_core::model::GeoPoint;
use fieldline_server::{routes, state::AppState};
use fieldline_storage::store::Store;
use serde_json::json;

struct TestServer {
    url: String,
    tenant_id: String,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }

    fn client(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

async fn start_test_server() -> TestServer {
    let config = FieldlineConfig {
        tenant: TenantSettings {
            default_language: "de-DE".to_string(),
            business_hours: HashMap::new(),
            hq_location: GeoPoint { latitude: 52.52, longitude: 13.405 },
            service_radius_km: 40.0,
        },
        session_limits: SessionLimits::default(),
        inference_timeouts: InferenceTimeouts::default(),
        audio_frame_ms: 20,
        barge_in_threshold_ms: 300,
        triage_rules_version: 1,
        routing_fallback_department_id: None,
        consent_required_kinds: Vec::new(),
        webhook_signature_tolerance_s: 300,
        webhook_secret: "test-secret".to_string(),
        logging: LoggingConfig::default(),
        storage: StorageConfig::default(),
        bind_addr: "127.0.0.1:0".to_string(),
    };

    let store = Store::connect_in_memory().await.expect("in-memory store");
    let state = Arc::new(AppState::new(store, config));
    let app = routes::build(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    TestServer { url: format!("http://{addr}"), tenant_id: uuid::Uuid::new_v4().to_string(), shutdown_tx }
}

#[tokio::test]
async fn health_check_responds_ok() {
    let server = start_test_server().await;
    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    server.shutdown().await;
}

#[tokio::test]
async fn creating_a_job_without_tenant_header_is_rejected() {
    let server = start_test_server().await;
    let resp = server
        .client()
        .post(server.url("/api/v1/jobs"))
        .json(&json!({
            "contact_id": uuid::Uuid::new_v4(),
            "title": "leaking pipe",
            "description": "kitchen sink is leaking",
            "trade_category": "plumbing-heating",
            "urgency": "normal",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    server.shutdown().await;
}

#[tokio::test]
async fn create_list_and_fetch_a_job() {
    let server = start_test_server().await;
    let contact_id = uuid::Uuid::new_v4();

    let created: serde_json::Value = server
        .client()
        .post(server.url("/api/v1/jobs"))
        .header("X-Tenant-Id", &server.tenant_id)
        .json(&json!({
            "contact_id": contact_id,
            "title": "no heat",
            "description": "boiler stopped working overnight",
            "trade_category": "plumbing-heating",
            "urgency": "urgent",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "new");

    let list: Vec<serde_json::Value> = server
        .client()
        .get(server.url("/api/v1/jobs"))
        .header("X-Tenant-Id", &server.tenant_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);

    let detail: serde_json::Value = server
        .client()
        .get(server.url(&format!("/api/v1/jobs/{job_id}")))
        .header("X-Tenant-Id", &server.tenant_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["id"], job_id);
    assert!(detail["history"].as_array().unwrap().len() >= 1);

    server.shutdown().await;
}

#[tokio::test]
async fn fetching_a_job_from_another_tenant_is_not_found() {
    let server = start_test_server().await;
    let contact_id = uuid::Uuid::new_v4();
    let created: serde_json::Value = server
        .client()
        .post(server.url("/api/v1/jobs"))
        .header("X-Tenant-Id", &server.tenant_id)
        .json(&json!({
            "contact_id": contact_id,
            "title": "no heat",
            "description": "boiler stopped working",
            "trade_category": "plumbing-heating",
            "urgency": "urgent",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = created["id"].as_str().unwrap().to_string();

    let other_tenant = uuid::Uuid::new_v4().to_string();
    let resp = server
        .client()
        .get(server.url(&format!("/api/v1/jobs/{job_id}")))
        .header("X-Tenant-Id", &other_tenant)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    server.shutdown().await;
}

#[tokio::test]
async fn triage_assess_scores_a_gas_leak_as_emergency() {
    let server = start_test_server().await;
    let result: serde_json::Value = server
        .client()
        .post(server.url("/api/v1/triage/assess"))
        .json(&json!({ "description": "I smell gas in my kitchen" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["urgency"], "emergency");
    server.shutdown().await;
}

#[tokio::test]
async fn consent_can_be_granted_then_revoked() {
    let server = start_test_server().await;
    let contact_id = uuid::Uuid::new_v4();

    let granted: serde_json::Value = server
        .client()
        .post(server.url(&format!("/api/v1/consent/{contact_id}")))
        .header("X-Tenant-Id", &server.tenant_id)
        .json(&json!({ "kind": "marketing", "method": "digital" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(granted["revoked_at"].is_null());

    let resp = server
        .client()
        .delete(server.url(&format!("/api/v1/consent/{contact_id}/marketing")))
        .header("X-Tenant-Id", &server.tenant_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let list: Vec<serde_json::Value> = server
        .client()
        .get(server.url(&format!("/api/v1/consent/{contact_id}")))
        .header("X-Tenant-Id", &server.tenant_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert!(!list[0]["revoked_at"].is_null());

    server.shutdown().await;
}

#[tokio::test]
async fn audit_integrity_holds_after_several_operations() {
    let server = start_test_server().await;
    server
        .client()
        .post(server.url("/api/v1/jobs"))
        .header("X-Tenant-Id", &server.tenant_id)
        .json(&json!({
            "contact_id": uuid::Uuid::new_v4(),
            "title": "blown fuse",
            "description": "power is out in the kitchen",
            "trade_category": "electrical",
            "urgency": "urgent",
        }))
        .send()
        .await
        .unwrap();

    let report: serde_json::Value = server
        .client()
        .get(server.url("/api/v1/audit/integrity"))
        .header("X-Tenant-Id", &server.tenant_id)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["valid"], true);

    server.shutdown().await;
}
