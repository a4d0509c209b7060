//! The Routing Engine (spec §4.6): given a Job, choose a department and/or worker,
//! set routing priority, and record the reason. Pure and idempotent — the same
//! (Job, rule set) pair always yields the same result (spec §8, "Routing
//! determinism").

use chrono::{DateTime, Duration, Utc};
use fieldline_core::prelude::{DepartmentId, Job, RoutingAction, RoutingConditions, RoutingRule, Urgency, WorkerId};

#[derive(Debug, Clone)]
pub struct RoutingResult {
    pub department: Option<DepartmentId>,
    pub worker: Option<WorkerId>,
    pub priority: u8,
    pub reason: String,
    pub escalation_deadline: Option<DateTime<Utc>>,
}

/// Lower numeric priority means more urgent, consistent with rules being ordered by
/// ascending priority (spec §4.6 step 1).
fn default_priority_for_urgency(urgency: Urgency) -> u8 {
    match urgency {
        Urgency::Emergency => 0,
        Urgency::Urgent => 1,
        Urgency::Normal => 2,
        Urgency::Routine => 3,
    }
}

fn conditions_match(conditions: &RoutingConditions, job: &Job, now: DateTime<Utc>) -> bool {
    if let Some(task_types) = &conditions.task_types {
        if !task_types.contains(&job.trade_category) {
            return false;
        }
    }
    if let Some(urgencies) = &conditions.urgencies {
        if !urgencies.contains(&job.urgency) {
            return false;
        }
    }
    if let Some(prefixes) = &conditions.postal_prefixes {
        let matches = job
            .address
            .as_ref()
            .map(|a| prefixes.iter().any(|p| a.postal_code.starts_with(p.as_str())))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if let Some((start, end)) = conditions.time_of_day {
        let hour = now.format("%H").to_string().parse::<u8>().unwrap_or(0);
        if !(hour >= start && hour < end) {
            return false;
        }
    }
    true
}

/// Evaluate `rules` (ascending priority, active only) against `job`; the first match
/// wins. Falls through to an urgency-derived default priority with no assignment if
/// nothing matches (spec §8, "Routing with zero matching active rules falls through
/// to the fallback rule").
pub fn route(job: &Job, rules: &[RoutingRule], now: DateTime<Utc>) -> RoutingResult {
    let mut ordered: Vec<&RoutingRule> = rules.iter().filter(|r| r.active).collect();
    ordered.sort_by_key(|r| r.priority);

    for rule in ordered {
        if conditions_match(&rule.conditions, job, now) {
            let (department, worker) = match &rule.action {
                RoutingAction::Department(d) => (Some(*d), None),
                RoutingAction::Worker(w) => (None, Some(*w)),
            };
            let escalation_deadline =
                rule.escalation_deadline_minutes.map(|minutes| now + Duration::minutes(i64::from(minutes)));
            return RoutingResult {
                department,
                worker,
                priority: rule.priority,
                reason: format!("rule:{}", rule.name),
                escalation_deadline,
            };
        }
    }

    RoutingResult {
        department: None,
        worker: None,
        priority: default_priority_for_urgency(job.urgency),
        reason: "fallback:no_matching_rule".to_string(),
        escalation_deadline: None,
    }
}

/// Raise a priority by one tier (lower number = more urgent), saturating at the top
/// tier. Called by the owner of the escalation timer when a rule's deadline expires
/// and the Job is still `new` or `assigned` (spec §4.6 step 5).
pub fn raise_priority_tier(priority: u8) -> u8 {
    priority.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldline_core::prelude::*;

    fn sample_job(trade: TradeCategory, urgency: Urgency, postal: &str) -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            tenant_id: TenantId::new(),
            job_number: "JOB-2026-0001".into(),
            contact_id: ContactId::new(),
            title: "t".into(),
            description: "d".into(),
            trade_category: trade,
            urgency,
            status: JobStatus::New,
            source: JobSource::Chat,
            address: Some(Address {
                street: "Musterstr".into(),
                number: "1".into(),
                postal_code: postal.into(),
                city: "Berlin".into(),
            }),
            distance_km: None,
            routing_priority: None,
            routing_reason: None,
            assigned_department: None,
            assigned_worker: None,
            preferred_window: None,
            access_notes: None,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancel_reason: None,
        }
    }

    fn rule(priority: u8, conditions: RoutingConditions, action: RoutingAction) -> RoutingRule {
        RoutingRule {
            id: RoutingRuleId::new(),
            tenant_id: TenantId::new(),
            name: format!("rule-{priority}"),
            priority,
            conditions,
            action,
            escalation_deadline_minutes: None,
            notify: false,
            active: true,
        }
    }

    #[test]
    fn first_matching_rule_by_priority_wins() {
        let job = sample_job(TradeCategory::PlumbingHeating, Urgency::Urgent, "10115");
        let dept_a = DepartmentId::new();
        let dept_b = DepartmentId::new();
        let rules = vec![
            rule(5, RoutingConditions::default(), RoutingAction::Department(dept_b)),
            rule(
                1,
                RoutingConditions { task_types: Some(vec![TradeCategory::PlumbingHeating]), ..Default::default() },
                RoutingAction::Department(dept_a),
            ),
        ];
        let result = route(&job, &rules, Utc::now());
        assert_eq!(result.department, Some(dept_a));
        assert_eq!(result.priority, 1);
    }

    #[test]
    fn no_matching_rule_falls_through_to_urgency_default() {
        let job = sample_job(TradeCategory::Electrical, Urgency::Emergency, "99999");
        let rules = vec![rule(
            2,
            RoutingConditions { task_types: Some(vec![TradeCategory::Sanitary]), ..Default::default() },
            RoutingAction::Department(DepartmentId::new()),
        )];
        let result = route(&job, &rules, Utc::now());
        assert!(result.department.is_none());
        assert_eq!(result.reason, "fallback:no_matching_rule");
        assert_eq!(result.priority, 0);
    }

    #[test]
    fn routing_is_deterministic_under_reevaluation() {
        let job = sample_job(TradeCategory::Sanitary, Urgency::Normal, "10115");
        let rules =
            vec![rule(1, RoutingConditions::default(), RoutingAction::Department(DepartmentId::new()))];
        let now = Utc::now();
        let first = route(&job, &rules, now);
        let second = route(&job, &rules, now);
        assert_eq!(first.department, second.department);
        assert_eq!(first.priority, second.priority);
        assert_eq!(first.reason, second.reason);
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let job = sample_job(TradeCategory::Electrical, Urgency::Normal, "10115");
        let mut inactive = rule(1, RoutingConditions::default(), RoutingAction::Department(DepartmentId::new()));
        inactive.active = false;
        let result = route(&job, &[inactive], Utc::now());
        assert!(result.department.is_none());
    }
}
