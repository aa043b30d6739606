use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::availability::{
    candidate_starts, fallback_slots, slot_label, ConflictRule, MAX_SLOTS,
};
use crate::services::calendar::CalendarStore;

/// Open slot labels for `date`, ascending, at most `MAX_SLOTS`.
pub fn open_slots(
    date: NaiveDate,
    duration_minutes: u32,
    booked: &[NaiveDateTime],
    rule: ConflictRule,
) -> Vec<String> {
    candidate_starts(date)
        .into_iter()
        .filter(|candidate| {
            !booked
                .iter()
                .any(|b| rule.conflicts(candidate, b, duration_minutes))
        })
        .take(MAX_SLOTS)
        .map(|slot| slot_label(&slot))
        .collect()
}

/// Queries the calendar and computes open slots. Any failure along the way
/// (bad date, unavailable calendar, timeout) yields the fixed fallback slots.
pub async fn plan_availability(
    calendar: &dyn CalendarStore,
    date: &str,
    duration_minutes: u32,
    rule: ConflictRule,
    timeout: Duration,
) -> Vec<String> {
    let day = match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
        Ok(day) => day,
        Err(e) => {
            tracing::warn!(date = %date, error = %e, "unparseable availability date, using fallback slots");
            return fallback_slots();
        }
    };

    match tokio::time::timeout(timeout, calendar.busy_starts(day)).await {
        Ok(Ok(booked)) => open_slots(day, duration_minutes, &booked, rule),
        Ok(Err(e)) => {
            tracing::warn!(date = %date, error = %e, "calendar query failed, using fallback slots");
            fallback_slots()
        }
        Err(_) => {
            tracing::warn!(date = %date, "calendar query timed out, using fallback slots");
            fallback_slots()
        }
    }
}
