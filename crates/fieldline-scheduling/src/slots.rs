//! Slot search (spec §4.8 `find_slots`): honors business hours, technician working
//! hours, existing bookings and urgency deadlines. Pure — no I/O, no locking; the
//! caller supplies the current bookings/blocks as plain data.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use fieldline_core::prelude::{TimeSlot, TradeCategory, Urgency, WeekdayHours, Worker};

pub const DEFAULT_SLOT_MINUTES: i64 = 30;
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct SlotCriteria {
    pub trade_category: TradeCategory,
    pub urgency: Urgency,
    pub earliest: DateTime<Utc>,
    pub latest: Option<DateTime<Utc>>,
    pub preferred_weekday: Option<chrono::Weekday>,
    pub preferred_window: Option<(NaiveTime, NaiveTime)>,
    pub slot_duration_minutes: i64,
}

impl SlotCriteria {
    pub fn new(trade_category: TradeCategory, urgency: Urgency, earliest: DateTime<Utc>) -> Self {
        Self {
            trade_category,
            urgency,
            earliest,
            latest: None,
            preferred_weekday: None,
            preferred_window: None,
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
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

fn intersect(a: WeekdayHours, b: WeekdayHours) -> Option<WeekdayHours> {
    let open = a.open.max(b.open);
    let close = a.close.min(b.close);
    (open < close).then_some(WeekdayHours { open, close })
}

fn open_interval_for_day(
    date: NaiveDate,
    business_hours: &BTreeMap<String, WeekdayHours>,
    technician: &Worker,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let key = weekday_key(date.weekday());
    let business = business_hours.get(key)?;
    let personal = technician.working_hours.get(key)?;
    let hours = intersect(*business, *personal)?;
    let start = date.and_time(hours.open).and_utc();
    let end = date.and_time(hours.close).and_utc();
    Some((start, end))
}

/// Subtract `busy` intervals from `free`, returning the remaining open sub-intervals.
fn subtract_busy(
    free: (DateTime<Utc>, DateTime<Utc>),
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut remaining = vec![free];
    for &(busy_start, busy_end) in busy {
        let mut next = Vec::new();
        for (start, end) in remaining {
            if busy_end <= start || busy_start >= end {
                next.push((start, end));
                continue;
            }
            if busy_start > start {
                next.push((start, busy_start));
            }
            if busy_end < end {
                next.push((busy_end, end));
            }
        }
        remaining = next;
    }
    remaining
}

/// Find open appointment slots. Returns at most `DEFAULT_TOP_N` slots ordered by
/// earliest start, with same-day preferred slots sorted ahead of non-preferred ones
/// (spec §4.8 steps 1-6).
pub fn find_slots(
    criteria: &SlotCriteria,
    business_hours: &BTreeMap<String, WeekdayHours>,
    technician: &Worker,
    existing_bookings: &[DateTime<Utc>],
    blocked: &[(DateTime<Utc>, DateTime<Utc>)],
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let window_start = now.max(criteria.earliest);
    let urgency_deadline = now + Duration::seconds((criteria.urgency.max_wait_hours() * 3600.0) as i64);
    let window_end = criteria.latest.map_or(urgency_deadline, |l| l.min(urgency_deadline));
    if window_end <= window_start {
        return Vec::new();
    }

    let booking_intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = existing_bookings
        .iter()
        .map(|&start| (start, start + Duration::minutes(criteria.slot_duration_minutes)))
        .collect();
    let busy: Vec<(DateTime<Utc>, DateTime<Utc>)> =
        booking_intervals.into_iter().chain(blocked.iter().copied()).collect();

    let mut slots = Vec::new();
    let mut date = window_start.date_naive();
    let last_date = window_end.date_naive();

    while date <= last_date {
        if let Some((day_open, day_close)) = open_interval_for_day(date, business_hours, technician) {
            let clipped_start = day_open.max(window_start);
            let clipped_end = day_close.min(window_end);
            if clipped_start < clipped_end {
                for (free_start, free_end) in subtract_busy((clipped_start, clipped_end), &busy) {
                    if criteria.urgency == Urgency::Emergency {
                        let end = (free_start + Duration::hours(2)).min(free_end);
                        slots.push(make_slot(date, free_start, end, technician.id, criteria, true));
                    } else {
                        slice_into_slots(free_start, free_end, criteria, date, technician.id, &mut slots);
                    }
                }
            }
        }
        date = date.succ_opt().unwrap_or(date);
        if date > last_date {
            break;
        }
    }

    slots.sort_by(|a, b| a.date.cmp(&b.date).then(b.preferred.cmp(&a.preferred)).then(a.start.cmp(&b.start)));
    slots.truncate(DEFAULT_TOP_N);
    slots
}

fn slice_into_slots(
    mut cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    criteria: &SlotCriteria,
    date: NaiveDate,
    technician: fieldline_core::prelude::WorkerId,
    out: &mut Vec<TimeSlot>,
) {
    let duration = Duration::minutes(criteria.slot_duration_minutes);
    while cursor + duration <= end {
        out.push(make_slot(date, cursor, cursor + duration, technician, criteria, false));
        cursor += duration;
    }
}

fn make_slot(
    date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    technician: fieldline_core::prelude::WorkerId,
    criteria: &SlotCriteria,
    emergency_capable: bool,
) -> TimeSlot {
    let preferred = criteria.preferred_weekday.is_none_or(|wd| date.weekday() == wd)
        && criteria
            .preferred_window
            .is_none_or(|(from, to)| start.time() >= from && start.time() < to);
    TimeSlot { date, start, end, technician, preferred, emergency_capable, available: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldline_core::prelude::*;

    fn hours_all_week(open: (u32, u32), close: (u32, u32)) -> BTreeMap<String, WeekdayHours> {
        let mut map = BTreeMap::new();
        for day in ["monday", "tuesday", "wednesday", "thursday", "friday"] {
            map.insert(
                day.to_string(),
                WeekdayHours {
                    open: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
                    close: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
                },
            );
        }
        map
    }

    fn technician(hours: BTreeMap<String, WeekdayHours>) -> Worker {
        Worker {
            id: WorkerId::new(),
            tenant_id: TenantId::new(),
            department_id: DepartmentId::new(),
            name: "Tech".into(),
            role: WorkerRole::Worker,
            trade_categories: vec![TradeCategory::PlumbingHeating],
            certifications: vec![],
            working_hours: hours,
            max_concurrent_jobs_per_day: 8,
            current_jobs_today: 0,
            service_radius_km: 20.0,
            home_base: None,
            active: true,
        }
    }

    fn next_monday(now: DateTime<Utc>) -> DateTime<Utc> {
        let mut d = now;
        while d.weekday() != chrono::Weekday::Mon {
            d += Duration::days(1);
        }
        d.date_naive().and_time(NaiveTime::from_hms_opt(7, 0, 0).unwrap()).and_utc()
    }

    #[test]
    fn finds_slots_within_business_hours() {
        let business = hours_all_week((8, 0), (17, 0));
        let tech = technician(hours_all_week((8, 0), (17, 0)));
        let now = next_monday(Utc::now());
        let criteria = SlotCriteria::new(TradeCategory::PlumbingHeating, Urgency::Normal, now);
        let slots = find_slots(&criteria, &business, &tech, &[], &[], now);
        assert!(!slots.is_empty());
        for slot in &slots {
            assert!(slot.start.time() >= NaiveTime::from_hms_opt(8, 0, 0).unwrap());
            assert!(slot.end.time() <= NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        }
    }

    #[test]
    fn existing_booking_removes_that_slot() {
        let business = hours_all_week((8, 0), (9, 0));
        let tech = technician(hours_all_week((8, 0), (9, 0)));
        let now = next_monday(Utc::now());
        let criteria = SlotCriteria::new(TradeCategory::PlumbingHeating, Urgency::Normal, now);
        let booked_start = now.date_naive().and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap()).and_utc();
        let slots = find_slots(&criteria, &business, &tech, &[booked_start], &[], now);
        assert!(slots.iter().all(|s| s.start != booked_start));
    }

    #[test]
    fn emergency_job_gets_one_contiguous_slot() {
        let business = hours_all_week((0, 0), (23, 59));
        let tech = technician(hours_all_week((0, 0), (23, 59)));
        let now = next_monday(Utc::now());
        let criteria = SlotCriteria::new(TradeCategory::PlumbingHeating, Urgency::Emergency, now);
        let slots = find_slots(&criteria, &business, &tech, &[], &[], now);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].emergency_capable);
    }

    #[test]
    fn results_are_capped_and_ordered_by_earliest_start() {
        let business = hours_all_week((8, 0), (20, 0));
        let tech = technician(hours_all_week((8, 0), (20, 0)));
        let now = next_monday(Utc::now());
        let criteria = SlotCriteria::new(TradeCategory::PlumbingHeating, Urgency::Routine, now);
        let slots = find_slots(&criteria, &business, &tech, &[], &[], now);
        assert!(slots.len() <= DEFAULT_TOP_N);
        for pair in slots.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }
}
