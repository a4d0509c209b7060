//! Session Supervisor (spec §4.9): owns the lifecycle of every live Session, enforces
//! the concurrent-session cap, and periodically sweeps idle/overlong sessions. The
//! registry is a process-wide concurrent map (`dashmap`), mirroring the session
//! registries in the telephony crate's mock adapter.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fieldline_core::prelude::{ContactId, SessionId, SessionLimits, TenantId};

use crate::error::{Result, SessionError};

/// A sweep kills a session once its idle time exceeds this multiple of the configured
/// per-channel idle threshold — the per-turn reprompt-then-end sequence lives in the
/// Conversation SM; this is the supervisor's own backstop for sessions that stopped
/// sending turns entirely (e.g. a dropped socket).
const IDLE_KILL_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Phone,
    Chat,
}

#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub tenant_id: TenantId,
    pub channel: Channel,
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    tenant_id: TenantId,
    channel: Channel,
    contact_id: Option<ContactId>,
    opened_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    pub channel: Channel,
    pub reason: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

pub struct Supervisor {
    sessions: DashMap<SessionId, SessionEntry>,
    limits: SessionLimits,
}

impl Supervisor {
    pub fn new(limits: SessionLimits) -> Self {
        Self { sessions: DashMap::new(), limits }
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }

    /// Allocate a Session. Rejects with [`SessionError::Overloaded`] once the
    /// concurrent-session cap is reached (spec §4.9 invariant).
    pub fn open(&self, descriptor: SessionDescriptor, now: DateTime<Utc>) -> Result<SessionId> {
        if self.sessions.len() >= self.limits.max_concurrent {
            return Err(SessionError::Overloaded);
        }
        let id = SessionId::new();
        self.sessions.insert(
            id,
            SessionEntry {
                tenant_id: descriptor.tenant_id,
                channel: descriptor.channel,
                contact_id: descriptor.contact_id,
                opened_at: now,
                last_activity: now,
            },
        );
        Ok(id)
    }

    /// Record activity, resetting the idle clock (called on every inbound turn).
    pub fn touch(&self, id: SessionId, now: DateTime<Utc>) -> Result<()> {
        match self.sessions.get_mut(&id) {
            Some(mut entry) => {
                entry.last_activity = now;
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    /// Remove the session and return its summary. Idempotent: closing an unknown
    /// session returns `None` rather than erroring, since shutdown races with the
    /// periodic sweep are expected.
    pub fn close(&self, id: SessionId, reason: &str, now: DateTime<Utc>) -> Option<SessionSummary> {
        self.sessions.remove(&id).map(|(session_id, entry)| SessionSummary {
            session_id,
            tenant_id: entry.tenant_id,
            channel: entry.channel,
            reason: reason.to_string(),
            opened_at: entry.opened_at,
            closed_at: now,
        })
    }

    fn idle_threshold_s(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Phone => self.limits.phone_idle_s,
            Channel::Chat => self.limits.chat_idle_s,
        }
    }

    fn max_duration_s(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Phone => self.limits.phone_max_s,
            Channel::Chat => self.limits.chat_max_s,
        }
    }

    /// Close every session that has gone idle beyond `IDLE_KILL_MULTIPLIER` times its
    /// channel's idle threshold, or that has run past its channel's overall duration
    /// cap (spec §4.9, "Periodic sweep"; spec §5, "Overall session" cap).
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<SessionSummary> {
        let expired: Vec<(SessionId, &'static str)> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let id = *entry.key();
                let idle_s = (now - entry.last_activity).num_seconds().max(0) as u64;
                let age_s = (now - entry.opened_at).num_seconds().max(0) as u64;
                if idle_s > self.idle_threshold_s(entry.channel) * IDLE_KILL_MULTIPLIER {
                    Some((id, "idle_timeout"))
                } else if age_s > self.max_duration_s(entry.channel) {
                    Some((id, "max_duration_exceeded"))
                } else {
                    None
                }
            })
            .collect();

        expired.into_iter().filter_map(|(id, reason)| self.close(id, reason, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn descriptor(channel: Channel) -> SessionDescriptor {
        SessionDescriptor { tenant_id: TenantId::new(), channel, contact_id: None }
    }

    #[test]
    fn opening_beyond_the_cap_is_rejected() {
        let limits = SessionLimits { max_concurrent: 1, ..SessionLimits::default() };
        let supervisor = Supervisor::new(limits);
        let now = Utc::now();
        supervisor.open(descriptor(Channel::Chat), now).unwrap();
        let err = supervisor.open(descriptor(Channel::Chat), now).unwrap_err();
        assert_eq!(err, SessionError::Overloaded);
    }

    #[test]
    fn closing_releases_a_slot() {
        let limits = SessionLimits { max_concurrent: 1, ..SessionLimits::default() };
        let supervisor = Supervisor::new(limits);
        let now = Utc::now();
        let id = supervisor.open(descriptor(Channel::Chat), now).unwrap();
        supervisor.close(id, "ended", now);
        assert!(supervisor.open(descriptor(Channel::Chat), now).is_ok());
    }

    #[test]
    fn sweep_kills_sessions_idle_past_double_the_threshold() {
        let limits = SessionLimits::default();
        let supervisor = Supervisor::new(limits);
        let now = Utc::now();
        let id = supervisor.open(descriptor(Channel::Phone), now).unwrap();
        let later = now + Duration::seconds((limits.phone_idle_s * 2 + 1) as i64);
        let summaries = supervisor.sweep(later);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, id);
        assert_eq!(summaries[0].reason, "idle_timeout");
    }

    #[test]
    fn sweep_leaves_active_sessions_alone() {
        let limits = SessionLimits::default();
        let supervisor = Supervisor::new(limits);
        let now = Utc::now();
        supervisor.open(descriptor(Channel::Chat), now).unwrap();
        let summaries = supervisor.sweep(now);
        assert!(summaries.is_empty());
        assert_eq!(supervisor.live_count(), 1);
    }

    #[test]
    fn sweep_kills_sessions_past_the_max_duration_even_if_active() {
        let limits = SessionLimits::default();
        let supervisor = Supervisor::new(limits);
        let now = Utc::now();
        let id = supervisor.open(descriptor(Channel::Chat), now).unwrap();
        let later = now + Duration::seconds((limits.chat_max_s + 1) as i64);
        supervisor.touch(id, later).unwrap();
        let summaries = supervisor.sweep(later);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].reason, "max_duration_exceeded");
    }
}
