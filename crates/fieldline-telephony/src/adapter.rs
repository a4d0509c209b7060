//! The Telephony Adapter seam (spec §4.1): translate each provider's concrete
//! protocol into a uniform call event stream and symmetric media streams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldline_core::prelude::CallId;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{Result, TelephonyError};

/// A single 10-30ms frame of ≥16kHz mono 16-bit PCM audio (spec §4.1 media contract).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub call_id: CallId,
    pub pcm: Vec<i16>,
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub enum CallEvent {
    Incoming { call_id: CallId, from: String, to: String, trunk: String, timestamp: DateTime<Utc> },
    Answered { call_id: CallId },
    Ended { call_id: CallId, cause: String },
    Dtmf { call_id: CallId, digit: char },
    Audio(AudioFrame),
}

/// Uniform interface every concrete provider (SIP trunk, PSTN gateway, webhook-based
/// cloud provider) implements. Mirrors the shape of `rvoip-session-core`'s call control
/// surface: a handful of imperative operations plus an event stream.
#[async_trait]
pub trait TelephonyAdapter: Send + Sync {
    async fn answer(&self, call_id: CallId) -> Result<()>;

    /// Idempotent: a second `hangup` after the first succeeded is a no-op.
    async fn hangup(&self, call_id: CallId, reason: &str) -> Result<()>;

    async fn transfer(&self, call_id: CallId, destination: &str) -> Result<()>;

    /// Stream synthesized audio to the call. Dropping the returned handle cancels
    /// playback within one frame duration (used for barge-in, spec §4.2).
    async fn play(&self, call_id: CallId, pcm_stream: mpsc::Receiver<Vec<i16>>) -> Result<PlaybackHandle>;

    /// Subscribe to this adapter's call event stream. A dropped event is a fatal
    /// session fault per spec §4.1; callers must treat a closed channel as such.
    fn events(&self) -> mpsc::Receiver<CallEvent>;
}

pub struct PlaybackHandle {
    cancel: Option<tokio::sync::oneshot::Sender<()>>,
}

impl PlaybackHandle {
    pub fn new(cancel: tokio::sync::oneshot::Sender<()>) -> Self {
        Self { cancel: Some(cancel) }
    }

    pub fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

/// A deterministic in-memory adapter used for tests and for exercising the pipeline
/// without a real provider. Each call event it produces is already validated; it does
/// not itself terminate a webhook (see [`crate::webhook::verify_webhook`]).
pub struct MockAdapter {
    events_tx: mpsc::Sender<CallEvent>,
    events_rx: parking_lot::Mutex<Option<mpsc::Receiver<CallEvent>>>,
    hung_up: dashmap::DashSet<CallId>,
}

impl MockAdapter {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self { events_tx: tx, events_rx: parking_lot::Mutex::new(Some(rx)), hung_up: dashmap::DashSet::new() }
    }

    pub async fn push(&self, event: CallEvent) {
        if self.events_tx.send(event).await.is_err() {
            warn!("mock adapter event dropped: no subscriber");
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelephonyAdapter for MockAdapter {
    async fn answer(&self, call_id: CallId) -> Result<()> {
        self.push(CallEvent::Answered { call_id }).await;
        Ok(())
    }

    async fn hangup(&self, call_id: CallId, reason: &str) -> Result<()> {
        if !self.hung_up.insert(call_id) {
            return Ok(());
        }
        self.push(CallEvent::Ended { call_id, cause: reason.to_string() }).await;
        Ok(())
    }

    async fn transfer(&self, _call_id: CallId, destination: &str) -> Result<()> {
        if destination.is_empty() {
            return Err(TelephonyError::TransferRejected("empty destination".into()));
        }
        Ok(())
    }

    async fn play(&self, _call_id: CallId, mut pcm_stream: mpsc::Receiver<Vec<i16>>) -> Result<PlaybackHandle> {
        let (cancel_tx, mut cancel_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = pcm_stream.recv() => if frame.is_none() { break; },
                    _ = &mut cancel_rx => break,
                }
            }
        });
        Ok(PlaybackHandle::new(cancel_tx))
    }

    fn events(&self) -> mpsc::Receiver<CallEvent> {
        self.events_rx.lock().take().expect("events() called more than once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hangup_is_idempotent() {
        let adapter = MockAdapter::new();
        let mut events = adapter.events();
        let call_id = CallId::new();
        adapter.hangup(call_id, "caller_hangup").await.unwrap();
        adapter.hangup(call_id, "caller_hangup").await.unwrap();
        let first = events.recv().await.unwrap();
        assert!(matches!(first, CallEvent::Ended { .. }));
        // second hangup produced no second event; draining times out
        let second = tokio::time::timeout(std::time::Duration::from_millis(50), events.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn transfer_rejects_empty_destination() {
        let adapter = MockAdapter::new();
        let err = adapter.transfer(CallId::new(), "").await.unwrap_err();
        assert_eq!(err, TelephonyError::TransferRejected("empty destination".into()));
    }
}
