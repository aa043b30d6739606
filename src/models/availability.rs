use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub const OPEN_HOUR: u32 = 9;
pub const CLOSE_HOUR: u32 = 20;
pub const SLOT_STEP_MINUTES: i64 = 60;
pub const MAX_SLOTS: usize = 5;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Length assumed for an existing calendar entry when only its start is known.
pub const BOOKED_LENGTH_MINUTES: i64 = 60;

pub const FALLBACK_SLOTS: [&str; 3] = ["10:00 AM", "2:00 PM", "4:00 PM"];

/// How a candidate slot is compared against already-booked starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Booked start in the same clock hour and within `duration` minutes.
    #[default]
    SameHour,
    /// Half-open interval overlap, booked entries assumed one hour long.
    Overlap,
}

impl ConflictRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictRule::SameHour => "same_hour",
            ConflictRule::Overlap => "overlap",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "overlap" => ConflictRule::Overlap,
            _ => ConflictRule::SameHour,
        }
    }

    pub fn conflicts(&self, candidate: &NaiveDateTime, booked: &NaiveDateTime, duration_minutes: u32) -> bool {
        match self {
            ConflictRule::SameHour => {
                booked.hour() == candidate.hour()
                    && (booked.minute() as i64 - candidate.minute() as i64).abs()
                        < duration_minutes as i64
            }
            ConflictRule::Overlap => {
                let candidate_end = *candidate + Duration::minutes(duration_minutes as i64);
                let booked_end = *booked + Duration::minutes(BOOKED_LENGTH_MINUTES);
                *booked < candidate_end && booked_end > *candidate
            }
        }
    }
}

/// Candidate slot starts for `date`, one per hour across the business window.
pub fn candidate_starts(date: NaiveDate) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let (Some(mut current), Some(end)) = (
        date.and_hms_opt(OPEN_HOUR, 0, 0),
        date.and_hms_opt(CLOSE_HOUR, 0, 0),
    ) else {
        return out;
    };

    while current < end {
        out.push(current);
        current += Duration::minutes(SLOT_STEP_MINUTES);
    }
    out
}

pub fn slot_label(dt: &NaiveDateTime) -> String {
    dt.format("%I:%M %p").to_string()
}

/// Parses labels like "10:00 AM" or "2:00 PM".
pub fn parse_slot_label(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%I:%M %p").ok()
}

pub fn fallback_slots() -> Vec<String> {
    FALLBACK_SLOTS.iter().map(|s| s.to_string()).collect()
}
