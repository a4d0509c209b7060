//! The shared data model (spec §3).
//!
//! Every persisted entity carries a `tenant_id`; nothing here performs I/O, so the
//! invariant "no cross-tenant reads or writes" is enforced by callers (`fieldline-storage`)
//! rather than by these types themselves.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{
    AuditId, ConsentId, ContactId, DepartmentId, JobId, RoutingRuleId, SessionId, TenantId,
    WorkerId,
};

/// Residential, commercial or industrial — affects triage weighting and job routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    /// 5-digit postal code (invariant enforced at validation time, not by the type).
    pub postal_code: String,
    pub city: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Great-circle distance in kilometers (haversine), used by the technician matcher's
    /// proximity score (spec §4.7) and scheduling urgency windows.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }
}

/// A caller or customer (spec §3, "Contact"). Never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub tenant_id: TenantId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<Address>,
    pub geo: Option<GeoPoint>,
    pub property_type: PropertyType,
    pub created_at: DateTime<Utc>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Scrub PII in place for a right-to-erasure request (spec §8 scenario 6). Keys are
    /// retained for referential integrity; only the identifying fields are cleared.
    pub fn anonymize(&mut self, now: DateTime<Utc>) {
        self.name = "[erased]".to_string();
        self.phone = None;
        self.email = None;
        self.address = None;
        self.geo = None;
        self.soft_deleted_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    DataProcessing,
    CallRecording,
    Reminders,
    Marketing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentMethod {
    Verbal,
    Written,
    Digital,
}

/// A grant or revocation keyed by (contact, kind). Append-only: revoking never deletes
/// the prior record (spec §3, "Consent Record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: ConsentId,
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub kind: ConsentKind,
    pub granted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub method: ConsentMethod,
    pub originating_call_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    /// Active means granted, not revoked, and not expired as of `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.granted_at.is_some_and(|g| g <= at)
            && self.revoked_at.is_none()
            && self.expires_at.is_none_or(|e| e > at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradeCategory {
    PlumbingHeating,
    Electrical,
    Sanitary,
    General,
    /// Domain extension: a tenant-defined category beyond the base set.
    Other(String),
}

impl std::fmt::Display for TradeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeCategory::PlumbingHeating => write!(f, "plumbing-heating"),
            TradeCategory::Electrical => write!(f, "electrical"),
            TradeCategory::Sanitary => write!(f, "sanitary"),
            TradeCategory::General => write!(f, "general"),
            TradeCategory::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    // Ordered routine < normal < urgent < emergency so `Ord` reflects severity.
    Routine,
    Normal,
    Urgent,
    Emergency,
}

impl Urgency {
    /// Max wait in hours before the slot search window closes (spec §4.8 step 1).
    pub fn max_wait_hours(self) -> f64 {
        match self {
            Urgency::Emergency => 2.0,
            Urgency::Urgent => 8.0,
            Urgency::Normal => 48.0,
            Urgency::Routine => 24.0 * 14.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Valid transitions per spec §8's status machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self == next {
            return true; // idempotent no-op per spec §8
        }
        matches!(
            (self, next),
            (New, Assigned)
                | (New, Cancelled)
                | (Assigned, InProgress)
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    Phone,
    Email,
    Chat,
    Form,
    Messenger,
}

/// A service request (spec §3, "Job"). The central persisted entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub job_number: String,
    pub contact_id: ContactId,
    pub title: String,
    pub description: String,
    pub trade_category: TradeCategory,
    pub urgency: Urgency,
    pub status: JobStatus,
    pub source: JobSource,
    pub address: Option<Address>,
    pub distance_km: Option<f64>,
    pub routing_priority: Option<u8>,
    pub routing_reason: Option<String>,
    pub assigned_department: Option<DepartmentId>,
    pub assigned_worker: Option<WorkerId>,
    pub preferred_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub access_notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Job {
    /// Invariant: `status=assigned ⇒ assigned_worker ≠ null`.
    pub fn invariants_hold(&self) -> bool {
        if self.status == JobStatus::Assigned && self.assigned_worker.is_none() {
            return false;
        }
        if self.status == JobStatus::Completed && self.completed_at.is_none() {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Actor {
    System,
    User { id: String, name: String },
    Session(SessionId),
}

/// An append-only audit row per job mutation, user-visible (spec §3, "Job History Entry").
/// Distinct from the tenant-wide compliance `AuditEntry` (see design note in SPEC_FULL.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryEntry {
    pub job_id: JobId,
    pub actor: Actor,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub tenant_id: TenantId,
    pub name: String,
    pub accepted_trades: Vec<TradeCategory>,
    pub accepted_urgencies: Vec<Urgency>,
    pub working_hours: std::collections::BTreeMap<String, WeekdayHours>,
    pub contact_channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Owner,
    Admin,
    Worker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub tenant_id: TenantId,
    pub department_id: DepartmentId,
    pub name: String,
    pub role: WorkerRole,
    pub trade_categories: Vec<TradeCategory>,
    pub certifications: Vec<String>,
    pub working_hours: std::collections::BTreeMap<String, WeekdayHours>,
    pub max_concurrent_jobs_per_day: u32,
    pub current_jobs_today: u32,
    pub service_radius_km: f64,
    pub home_base: Option<GeoPoint>,
    pub active: bool,
}

impl Worker {
    pub fn has_headroom(&self) -> bool {
        self.active && self.current_jobs_today < self.max_concurrent_jobs_per_day
    }

    pub fn workload_headroom(&self) -> f64 {
        if self.max_concurrent_jobs_per_day == 0 {
            return 0.0;
        }
        (1.0 - self.current_jobs_today as f64 / self.max_concurrent_jobs_per_day as f64)
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutingAction {
    Department(DepartmentId),
    Worker(WorkerId),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConditions {
    pub task_types: Option<Vec<TradeCategory>>,
    pub urgencies: Option<Vec<Urgency>>,
    pub postal_prefixes: Option<Vec<String>>,
    /// Hour-of-day range `[start, end)` in tenant local time.
    pub time_of_day: Option<(u8, u8)>,
}

/// A declarative mapping from Job properties to a department/worker and priority
/// (spec §3, "Routing Rule"). Ordered by ascending `priority`; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RoutingRuleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub priority: u8,
    pub conditions: RoutingConditions,
    pub action: RoutingAction,
    pub escalation_deadline_minutes: Option<u32>,
    pub notify: bool,
    pub active: bool,
}

/// Ephemeral slot value produced by the scheduling engine (spec §3, "Time Slot"). Not
/// persisted independently — bookings materialize as `Job` fields + a calendar entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: chrono::NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub technician: WorkerId,
    pub preferred: bool,
    pub emergency_capable: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// An ordered (role, content, timestamp) triple within a session, bounded by a sliding
/// window before being handed to the language model (spec §3, "Conversation Message").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A tenant-wide compliance ledger row with an integrity checksum chaining `prev_checksum`
/// and this row's bytes (spec §3, "Audit Entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub tenant_id: TenantId,
    pub actor: Actor,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub detail: serde_json::Value,
    pub prev_checksum: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub status: TenantStatus,
    pub settings: crate::config::TenantSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_transitions() {
        assert!(JobStatus::New.can_transition_to(JobStatus::Assigned));
        assert!(JobStatus::New.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::New));
        // no-op transitions are allowed (idempotence law, spec §8)
        assert!(JobStatus::Assigned.can_transition_to(JobStatus::Assigned));
    }

    #[test]
    fn distance_is_symmetric_and_zero_at_origin() {
        let a = GeoPoint { latitude: 52.52, longitude: 13.405 };
        let b = GeoPoint { latitude: 48.1351, longitude: 11.582 };
        assert!((a.distance_km(&a)).abs() < 1e-6);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-6);
        assert!(a.distance_km(&b) > 400.0 && a.distance_km(&b) < 600.0);
    }

    #[test]
    fn consent_expiry_and_revocation() {
        let now = Utc::now();
        let mut rec = ConsentRecord {
            id: ConsentId::new(),
            tenant_id: TenantId::new(),
            contact_id: ContactId::new(),
            kind: ConsentKind::CallRecording,
            granted_at: Some(now - chrono::Duration::hours(1)),
            revoked_at: None,
            method: ConsentMethod::Verbal,
            originating_call_id: None,
            expires_at: None,
        };
        assert!(rec.is_active_at(now));
        rec.revoked_at = Some(now);
        assert!(!rec.is_active_at(now));
    }
}
