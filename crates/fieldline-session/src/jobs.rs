//! Job Service (spec §4.10): materializes Conversation outcomes into persisted Jobs,
//! hands them to the Routing Engine and, when eligible, the Scheduling Engine, and
//! validates status transitions.

use chrono::{DateTime, Datelike, Utc};
use fieldline_conversation::prelude::ActionSpec;
use fieldline_core::prelude::*;
use fieldline_routing::prelude::route;
use fieldline_scheduling::prelude::{find_slots, Scheduler, SlotCriteria};
use fieldline_storage::prelude::Store;

use crate::error::{Result, SessionError};

#[derive(Debug, Clone)]
pub struct JobDraft {
    pub contact_id: ContactId,
    pub title: String,
    pub description: String,
    pub trade_category: TradeCategory,
    pub urgency: Urgency,
    pub source: JobSource,
    pub address: Option<Address>,
    pub distance_km: Option<f64>,
    pub preferred_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub access_notes: Option<String>,
}

/// Fire-and-forget channel dispatch (spec §4.10 step 6). Kept as a trait so
/// `fieldline-session` stays decoupled from any particular notification transport.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, job: &Job, reason: &str, channels: &[String]);
}

/// Auto-scheduling attempts every urgency up to and including `Urgent` — `Emergency`
/// jobs are dispatched immediately outside the normal slot-booking flow, and `Routine`
/// jobs are left for the customer/dispatcher to book explicitly (Open Question,
/// resolved in DESIGN.md).
fn eligible_for_auto_schedule(urgency: Urgency) -> bool {
    urgency <= Urgency::Urgent
}

pub struct JobService<'a> {
    store: &'a Store,
}

impl<'a> JobService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Step 1-7 of spec §4.10: allocate a job number, persist, route, optionally
    /// auto-schedule, notify, and return the canonical Job.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        draft: JobDraft,
        session: SessionId,
        routing_rules: &[RoutingRule],
        scheduler: Option<&Scheduler>,
        notifications: Option<&dyn NotificationSink>,
        action_spec: Option<&ActionSpec>,
        now: DateTime<Utc>,
    ) -> Result<Job> {
        let job_number = self.store.next_job_number(tenant_id, now.year()).await?;

        let mut job = Job {
            id: JobId::new(),
            tenant_id,
            job_number,
            contact_id: draft.contact_id,
            title: draft.title,
            description: draft.description,
            trade_category: draft.trade_category,
            urgency: draft.urgency,
            status: JobStatus::New,
            source: draft.source,
            address: draft.address,
            distance_km: draft.distance_km,
            routing_priority: None,
            routing_reason: None,
            assigned_department: None,
            assigned_worker: None,
            preferred_window: draft.preferred_window,
            access_notes: draft.access_notes,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancel_reason: None,
        };

        self.store.insert_job(&job).await?;
        self.append_history(&job, Actor::Session(session), "created", serde_json::json!({})).await?;

        let routing = route(&job, routing_rules, now);
        job.routing_priority = Some(routing.priority);
        job.routing_reason = Some(routing.reason.clone());
        job.assigned_department = routing.department;
        job.assigned_worker = routing.worker;
        if routing.worker.is_some() {
            job.status = JobStatus::Assigned;
        }
        job.updated_at = now;
        self.store.update_job(&job).await?;
        self.append_history(
            &job,
            Actor::System,
            "routed",
            serde_json::json!({ "reason": routing.reason, "priority": routing.priority }),
        )
        .await?;

        let auto_book = action_spec.map_or(true, |spec| spec.auto_book);
        if eligible_for_auto_schedule(job.urgency) && auto_book {
            if let (Some(worker_id), Some(scheduler)) = (routing.worker, scheduler) {
                self.try_auto_schedule(&mut job, worker_id, scheduler, now).await?;
            }
        }

        let matched_rule = routing_rules.iter().find(|r| format!("rule:{}", r.name) == routing.reason);
        let notify_channels = action_spec.map(|spec| spec.notify_channels.as_slice()).unwrap_or(&[]);
        let channel_gate = action_spec.map_or(true, |spec| !spec.notify_channels.is_empty());
        if let (Some(sink), Some(rule)) = (notifications, matched_rule) {
            if rule.notify && channel_gate {
                sink.notify(&job, &routing.reason, notify_channels);
            }
        }

        Ok(job)
    }

    async fn try_auto_schedule(
        &self,
        job: &mut Job,
        worker_id: WorkerId,
        scheduler: &Scheduler,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let workers = self.store.list_workers(job.tenant_id, None).await?;
        let Some(worker) = workers.into_iter().find(|w| w.id == worker_id) else { return Ok(()) };
        let departments = self.store.list_departments(job.tenant_id).await?;
        let Some(department) = departments.into_iter().find(|d| d.id == worker.department_id) else {
            return Ok(());
        };

        let existing: Vec<DateTime<Utc>> = self
            .store
            .list_jobs(job.tenant_id, Default::default())
            .await?
            .into_iter()
            .filter(|j| j.assigned_worker == Some(worker_id) && j.id != job.id)
            .filter_map(|j| j.scheduled_at)
            .collect();

        let mut criteria = SlotCriteria::new(job.trade_category.clone(), job.urgency, now);
        if let Some((from, to)) = job.preferred_window {
            criteria.preferred_weekday = Some(from.weekday());
            criteria.preferred_window = Some((from.time(), to.time()));
        }

        let slots = find_slots(&criteria, &department.working_hours, &worker, &existing, &[], now);
        let Some(slot) = slots.into_iter().find(|s| s.available) else { return Ok(()) };

        let job_id = job.id;
        let tenant_id = job.tenant_id;
        let scheduled_start = slot.start;
        let store = self.store;
        let booked = scheduler
            .book(worker_id, scheduled_start, || async move {
                let mut fresh = store.get_job(tenant_id, job_id).await.map_err(|_| {
                    fieldline_scheduling::prelude::SchedulingError::SlotUnavailable
                })?;
                fresh.scheduled_at = Some(scheduled_start);
                fresh.updated_at = Utc::now();
                store
                    .update_job(&fresh)
                    .await
                    .map_err(|_| fieldline_scheduling::prelude::SchedulingError::SlotUnavailable)
            })
            .await;

        if booked.is_ok() {
            job.scheduled_at = Some(scheduled_start);
            job.updated_at = now;
            self.append_history(job, Actor::System, "scheduled", serde_json::json!({ "start": scheduled_start }))
                .await?;
            self.store.adjust_worker_load(worker_id, 1).await?;
        }
        Ok(())
    }

    /// Validate and apply a status transition (spec §4.10, "Status updates").
    pub async fn update_status(&self, mut job: Job, new_status: JobStatus, now: DateTime<Utc>, actor: Actor) -> Result<Job> {
        if !job.status.can_transition_to(new_status) {
            return Err(SessionError::IllegalTransition { from: job.status, to: new_status });
        }
        let from = job.status;
        job.status = new_status;
        if new_status == JobStatus::InProgress {
            job.started_at.get_or_insert(now);
        }
        if new_status == JobStatus::Completed {
            job.completed_at.get_or_insert(now);
        }
        job.updated_at = now;
        self.store.update_job(&job).await?;
        self.append_history(
            &job,
            actor,
            "status_changed",
            serde_json::json!({ "from": format!("{from:?}"), "to": format!("{new_status:?}") }),
        )
        .await?;
        Ok(job)
    }

    async fn append_history(
        &self,
        job: &Job,
        actor: Actor,
        action: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        self.store
            .append_job_history(&JobHistoryEntry {
                job_id: job.id,
                actor,
                action: action.to_string(),
                timestamp: job.updated_at,
                detail,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldline_core::prelude::*;

    fn draft() -> JobDraft {
        JobDraft {
            contact_id: ContactId::new(),
            title: "Heating repair".into(),
            description: "Heizung ist kalt".into(),
            trade_category: TradeCategory::PlumbingHeating,
            urgency: Urgency::Normal,
            source: JobSource::Chat,
            address: None,
            distance_km: None,
            preferred_window: None,
            access_notes: None,
        }
    }

    #[tokio::test]
    async fn create_persists_a_new_job_and_history_row() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let tenant = TenantId::new();
        let session = SessionId::new();
        let now = Utc::now();

        let job = service.create(tenant, draft(), session, &[], None, None, None, now).await.unwrap();
        assert_eq!(job.status, JobStatus::New);
        assert!(job.job_number.starts_with("JOB-"));

        let history = store.job_history(job.id).await.unwrap();
        assert!(history.iter().any(|h| h.action == "created"));
        assert!(history.iter().any(|h| h.action == "routed"));
    }

    #[tokio::test]
    async fn routing_to_a_worker_assigns_the_job() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let tenant = TenantId::new();
        let worker_id = WorkerId::new();
        let rule = RoutingRule {
            id: RoutingRuleId::new(),
            tenant_id: tenant,
            name: "direct".into(),
            priority: 1,
            conditions: RoutingConditions::default(),
            action: RoutingAction::Worker(worker_id),
            escalation_deadline_minutes: None,
            notify: false,
            active: true,
        };

        let job = service.create(tenant, draft(), SessionId::new(), &[rule], None, None, None, Utc::now()).await.unwrap();
        assert_eq!(job.status, JobStatus::Assigned);
        assert_eq!(job.assigned_worker, Some(worker_id));
    }

    #[tokio::test]
    async fn update_status_rejects_illegal_transitions() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let job = service.create(TenantId::new(), draft(), SessionId::new(), &[], None, None, None, Utc::now()).await.unwrap();

        let err = service.update_status(job, JobStatus::Completed, Utc::now(), Actor::System).await.unwrap_err();
        assert!(matches!(err, SessionError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn update_status_cascades_timestamps() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let tenant = TenantId::new();
        let worker_id = WorkerId::new();
        let rule = RoutingRule {
            id: RoutingRuleId::new(),
            tenant_id: tenant,
            name: "direct".into(),
            priority: 1,
            conditions: RoutingConditions::default(),
            action: RoutingAction::Worker(worker_id),
            escalation_deadline_minutes: None,
            notify: false,
            active: true,
        };
        let job = service.create(tenant, draft(), SessionId::new(), &[rule], None, None, None, Utc::now()).await.unwrap();
        let in_progress = service.update_status(job, JobStatus::InProgress, Utc::now(), Actor::System).await.unwrap();
        assert!(in_progress.started_at.is_some());
        let completed =
            service.update_status(in_progress, JobStatus::Completed, Utc::now(), Actor::System).await.unwrap();
        assert!(completed.completed_at.is_some());
    }

    struct RecordingSink {
        calls: std::sync::Mutex<Vec<Vec<String>>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, _job: &Job, _reason: &str, channels: &[String]) {
            self.calls.lock().unwrap().push(channels.to_vec());
        }
    }

    #[tokio::test]
    async fn action_spec_with_empty_channels_suppresses_notification() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let tenant = TenantId::new();
        let worker_id = WorkerId::new();
        let rule = RoutingRule {
            id: RoutingRuleId::new(),
            tenant_id: tenant,
            name: "direct".into(),
            priority: 1,
            conditions: RoutingConditions::default(),
            action: RoutingAction::Worker(worker_id),
            escalation_deadline_minutes: None,
            notify: true,
            active: true,
        };
        let sink = RecordingSink { calls: std::sync::Mutex::new(Vec::new()) };
        let silent_spec = ActionSpec { notify_channels: Vec::new(), auto_book: true };

        service
            .create(tenant, draft(), SessionId::new(), &[rule], None, Some(&sink), Some(&silent_spec), Utc::now())
            .await
            .unwrap();
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn action_spec_with_channels_notifies_on_a_notify_rule() {
        let store = Store::connect_in_memory().await.unwrap();
        let service = JobService::new(&store);
        let tenant = TenantId::new();
        let worker_id = WorkerId::new();
        let rule = RoutingRule {
            id: RoutingRuleId::new(),
            tenant_id: tenant,
            name: "direct".into(),
            priority: 1,
            conditions: RoutingConditions::default(),
            action: RoutingAction::Worker(worker_id),
            escalation_deadline_minutes: None,
            notify: true,
            active: true,
        };
        let sink = RecordingSink { calls: std::sync::Mutex::new(Vec::new()) };
        let spec = ActionSpec { notify_channels: vec!["email".into(), "sms".into()], auto_book: true };

        service
            .create(tenant, draft(), SessionId::new(), &[rule], None, Some(&sink), Some(&spec), Utc::now())
            .await
            .unwrap();
        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["email".to_string(), "sms".to_string()]);
    }
}
