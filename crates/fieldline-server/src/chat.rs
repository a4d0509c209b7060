//! Chat WebSocket endpoint (spec §6): client sends `{"type":"user","text":"..."}`,
//! server sends `{"type":"assistant","text":"..."}` and a terminal
//! `{"type":"end","job_id":"..."}`. Idle-closes after the chat idle timeout.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fieldline_conversation::prelude::{
    ConversationMachine, IndustryProfile, TradesProfile, TriageEngine, TriageResult, TurnEffect, TurnInput,
};
use fieldline_core::prelude::*;
use std::result::Result;
use fieldline_session::prelude::{Channel, JobDraft, JobService, SessionDescriptor};

use crate::state::SharedState;
use crate::tenant::tenant_id;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    User { text: String },
    End,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Assistant { text: String },
    End {
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
}

pub async fn chat_ws(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> axum::response::Response {
    match tenant_id(&headers) {
        Ok(tenant) => ws.on_upgrade(move |socket| handle_chat(socket, state, tenant)).into_response(),
        Err(err) => crate::error::ServerError(err).into_response(),
    }
}

async fn handle_chat(socket: WebSocket, state: SharedState, tenant: TenantId) {
    let (mut tx, mut rx) = socket.split();

    let session_id = match state.supervisor.open(
        SessionDescriptor { tenant_id: tenant, channel: Channel::Chat, contact_id: None },
        Utc::now(),
    ) {
        Ok(id) => id,
        Err(err) => {
            let _ = send(&mut tx, &ServerFrame::End { job_id: None }).await;
            warn!(%tenant, error = %err, "chat session rejected");
            return;
        }
    };
    info!(%tenant, %session_id, "chat session opened");

    let profile = TradesProfile::new();
    info!(%session_id, profile = profile.name(), "conversation profile selected");
    let mut machine =
        ConversationMachine::new(profile, TriageEngine::new(TriageEngine::default_rules(), TradeCategory::General));

    let idle_timeout = Duration::from_secs(state.config.session_limits.chat_idle_s);

    loop {
        let frame = tokio::select! {
            msg = rx.next() => msg,
            _ = tokio::time::sleep(idle_timeout) => {
                let outcome = machine.on_idle_timeout();
                if !dispatch(&mut tx, &state, tenant, session_id, outcome.effects).await {
                    break;
                }
                continue;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                state.supervisor.touch(session_id, Utc::now()).ok();
                let client_frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(err) => {
                        warn!(%session_id, error = %err, "malformed chat frame, ignoring");
                        continue;
                    }
                };
                match client_frame {
                    ClientFrame::User { text } => {
                        let outcome = machine.handle_turn(TurnInput { transcript: text, confidence: 0.9 });
                        if !dispatch(&mut tx, &state, tenant, session_id, outcome.effects).await {
                            break;
                        }
                    }
                    ClientFrame::End => {
                        let outcome = machine.on_channel_closed();
                        dispatch(&mut tx, &state, tenant, session_id, outcome.effects).await;
                        break;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                let outcome = machine.on_channel_closed();
                dispatch(&mut tx, &state, tenant, session_id, outcome.effects).await;
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(%session_id, error = %err, "chat socket error");
                break;
            }
        }
    }

    state.supervisor.close(session_id, "closed", Utc::now());
    info!(%session_id, "chat session closed");
}

/// Apply a batch of turn effects: speak, escalate, materialize a Job, or end the
/// session. Returns `false` once the session should stop reading further frames.
async fn dispatch(
    tx: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    state: &SharedState,
    tenant: TenantId,
    session_id: SessionId,
    effects: Vec<TurnEffect>,
) -> bool {
    let mut keep_open = true;
    for effect in effects {
        match effect {
            TurnEffect::Say(text) | TurnEffect::Reprompt(text) => {
                if send(tx, &ServerFrame::Assistant { text }).await.is_err() {
                    keep_open = false;
                }
            }
            TurnEffect::Escalate { message, .. } => {
                if send(tx, &ServerFrame::Assistant { text: message }).await.is_err() {
                    keep_open = false;
                }
            }
            TurnEffect::RequestJobCreation { triage, slots } => {
                let job_id = create_job_from_slots(state, tenant, session_id, &triage, &slots).await;
                if let Some(job_id) = job_id {
                    info!(%session_id, %job_id, "job created from chat conversation");
                }
            }
            TurnEffect::EndSession { .. } => {
                let _ = send(tx, &ServerFrame::End { job_id: None }).await;
                keep_open = false;
            }
        }
    }
    keep_open
}

async fn create_job_from_slots(
    state: &SharedState,
    tenant: TenantId,
    session_id: SessionId,
    triage: &TriageResult,
    slots: &std::collections::HashMap<String, String>,
) -> Option<JobId> {
    let contact_id = ContactId::new();
    let contact = Contact {
        id: contact_id,
        tenant_id: tenant,
        name: slots.get("name").cloned().unwrap_or_else(|| "unknown".to_string()),
        phone: slots.get("phone").cloned(),
        email: None,
        address: None,
        geo: None,
        property_type: PropertyType::Residential,
        created_at: Utc::now(),
        soft_deleted_at: None,
    };
    if state.store.upsert_contact(&contact).await.is_err() {
        return None;
    }

    let draft = JobDraft {
        contact_id,
        title: triage.trade_category.to_string(),
        description: slots.get("problem_description").cloned().unwrap_or_default(),
        trade_category: triage.trade_category.clone(),
        urgency: triage.urgency,
        source: JobSource::Chat,
        address: None,
        distance_km: None,
        preferred_window: None,
        access_notes: slots.get("address").cloned(),
    };

    let rules = state.store.active_routing_rules(tenant).await.ok()?;
    let service = JobService::new(&state.store);
    let action_spec = TradesProfile::new().action_spec();
    let job = service
        .create(tenant, draft, session_id, &rules, Some(&state.scheduler), None, Some(&action_spec), Utc::now())
        .await
        .ok()?;
    state
        .audit
        .append(tenant, Actor::Session(session_id), "job_created_via_chat", "job", job.id.to_string(), serde_json::json!({}))
        .await
        .ok();
    Some(job.id)
}

async fn send(
    tx: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    tx.send(Message::Text(json.into())).await
}
