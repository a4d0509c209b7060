//! The Technician Matcher (spec §4.7): rank candidate workers for a Job by a
//! weighted multi-factor score in `[0, 1]`.

use chrono::{DateTime, Datelike, Utc};
use fieldline_core::prelude::{Job, TradeCategory, Worker, WorkerId};
use serde::Serialize;

const WEIGHT_TRADE_FIT: f64 = 0.35;
const WEIGHT_CERTIFICATION: f64 = 0.15;
const WEIGHT_AVAILABILITY: f64 = 0.20;
const WEIGHT_WORKLOAD: f64 = 0.15;
const WEIGHT_PROXIMITY: f64 = 0.15;

/// Minimum score a candidate must clear to be returned at all (spec §4.7).
pub const MATCH_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerMatch {
    pub worker_id: WorkerId,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Ranked(Vec<WorkerMatch>),
    /// No candidate met the emergency availability bar; the engine MUST surface this
    /// explicitly rather than returning a zero-score match (spec §4.7).
    NoneAvailable,
}

/// 1.0 for an exact trade match; otherwise the best partial-credit similarity score
/// from a small adjacency table (spec §4.7, "e.g. plumbing-heating ↔ sanitary =
/// 0.6"); 0 if nothing is related.
fn trade_fit(worker: &Worker, job_trade: &TradeCategory) -> f64 {
    if worker.trade_categories.contains(job_trade) {
        return 1.0;
    }
    worker
        .trade_categories
        .iter()
        .map(|t| match (job_trade, t) {
            (TradeCategory::PlumbingHeating, TradeCategory::Sanitary)
            | (TradeCategory::Sanitary, TradeCategory::PlumbingHeating) => 0.6,
            _ => 0.0,
        })
        .fold(0.0, f64::max)
}

fn certification_coverage(worker: &Worker, required: &[String]) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let held = required.iter().filter(|c| worker.certifications.contains(c)).count();
    held as f64 / required.len() as f64
}

fn weekday_key(weekday: chrono::Weekday) -> &'static str {
    match weekday {
        chrono::Weekday::Mon => "monday",
        chrono::Weekday::Tue => "tuesday",
        chrono::Weekday::Wed => "wednesday",
        chrono::Weekday::Thu => "thursday",
        chrono::Weekday::Fri => "friday",
        chrono::Weekday::Sat => "saturday",
        chrono::Weekday::Sun => "sunday",
    }
}

fn within_working_hours(worker: &Worker, now: DateTime<Utc>) -> bool {
    let key = weekday_key(now.weekday());
    worker.working_hours.get(key).is_some_and(|hours| {
        let t = now.time();
        hours.open <= t && t < hours.close
    })
}

fn availability_today(worker: &Worker, now: DateTime<Utc>) -> f64 {
    if worker.has_headroom() && within_working_hours(worker, now) {
        1.0
    } else {
        0.0
    }
}

/// `Job.distance_km` is precomputed (by whoever resolved the worker's candidacy)
/// relative to the specific worker being scored; when it is absent, proximity is
/// scored as neutral rather than penalized.
fn proximity(worker: &Worker, job: &Job) -> f64 {
    match job.distance_km {
        Some(distance) if worker.service_radius_km > 0.0 => {
            1.0 - (distance.min(worker.service_radius_km) / worker.service_radius_km)
        }
        _ => 0.5,
    }
}

fn match_score(job: &Job, worker: &Worker, required_certifications: &[String], now: DateTime<Utc>) -> f64 {
    WEIGHT_TRADE_FIT * trade_fit(worker, &job.trade_category)
        + WEIGHT_CERTIFICATION * certification_coverage(worker, required_certifications)
        + WEIGHT_AVAILABILITY * availability_today(worker, now)
        + WEIGHT_WORKLOAD * worker.workload_headroom()
        + WEIGHT_PROXIMITY * proximity(worker, job)
}

/// Rank `candidates` for `job`. Emergency jobs are filtered to workers available
/// right now; if none qualify, returns [`MatchOutcome::NoneAvailable`] rather than a
/// weak match (spec §4.7).
pub fn rank_candidates(
    job: &Job,
    candidates: &[Worker],
    required_certifications: &[String],
    now: DateTime<Utc>,
) -> MatchOutcome {
    use fieldline_core::prelude::Urgency;

    let pool: Vec<&Worker> = if job.urgency == Urgency::Emergency {
        let available: Vec<&Worker> = candidates.iter().filter(|w| availability_today(w, now) == 1.0).collect();
        if available.is_empty() {
            return MatchOutcome::NoneAvailable;
        }
        available
    } else {
        candidates.iter().collect()
    };

    let mut scored: Vec<WorkerMatch> = pool
        .into_iter()
        .map(|w| WorkerMatch { worker_id: w.id, score: match_score(job, w, required_certifications, now) })
        .filter(|m| m.score >= MATCH_THRESHOLD)
        .collect();

    // Deterministic tie-break: higher availability, lower workload, lexical id.
    let availability_of = |id: WorkerId| -> f64 {
        candidates.iter().find(|w| w.id == id).map(|w| availability_today(w, now)).unwrap_or(0.0)
    };
    let workload_of = |id: WorkerId| -> u32 {
        candidates.iter().find(|w| w.id == id).map(|w| w.current_jobs_today).unwrap_or(u32::MAX)
    };

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap()
            .then(availability_of(b.worker_id).partial_cmp(&availability_of(a.worker_id)).unwrap())
            .then(workload_of(a.worker_id).cmp(&workload_of(b.worker_id)))
            .then(a.worker_id.to_string().cmp(&b.worker_id.to_string()))
    });

    if job.urgency == Urgency::Emergency && scored.is_empty() {
        return MatchOutcome::NoneAvailable;
    }

    MatchOutcome::Ranked(scored)
}
