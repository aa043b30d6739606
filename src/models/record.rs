use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use super::appointment::Appointment;
use super::lead::LeadRecord;

pub const SOURCE_TAG: &str = "AI Receptionist";
pub const STATUS_NEW: &str = "New";
pub const STATUS_CONFIRMED: &str = "Confirmed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordCategory {
    Leads,
    Appointments,
}

impl RecordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::Leads => "Leads",
            RecordCategory::Appointments => "Appointments",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadRow {
    pub timestamp: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub lead_type: String,
    pub area_interest: String,
    pub budget: String,
    pub timeline: String,
    pub property_address: String,
    pub notes: String,
    pub next_action: String,
    pub source: String,
    pub status: String,
}

impl LeadRow {
    pub fn new(name: &str, phone: &str, lead_type: &str) -> Self {
        Self {
            timestamp: now_stamp(),
            name: name.to_string(),
            phone: phone.to_string(),
            lead_type: lead_type.to_string(),
            source: SOURCE_TAG.to_string(),
            status: STATUS_NEW.to_string(),
            ..Default::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_next_action(mut self, next_action: impl Into<String>) -> Self {
        self.next_action = next_action.into();
        self
    }

    /// Flattens the per-call lead into a row.
    pub fn from_lead(lead: &LeadRecord) -> Self {
        Self {
            timestamp: now_stamp(),
            name: lead.name.clone().unwrap_or_default(),
            phone: lead.phone_or_call_sid(),
            email: lead.email.clone().unwrap_or_default(),
            lead_type: lead.lead_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
            area_interest: lead.area_interest.clone().unwrap_or_default(),
            budget: lead.budget.clone().unwrap_or_default(),
            timeline: lead.timeline.clone().unwrap_or_default(),
            property_address: lead.property_address.clone().unwrap_or_default(),
            notes: lead.notes.join("; "),
            next_action: String::new(),
            source: SOURCE_TAG.to_string(),
            status: STATUS_NEW.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentRow {
    pub timestamp: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub purpose: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub event_link: String,
    pub status: String,
}

impl AppointmentRow {
    pub fn new(appointment: &Appointment, event_link: &str) -> Self {
        Self {
            timestamp: now_stamp(),
            name: appointment.name.clone(),
            phone: appointment.phone.clone(),
            email: appointment.email.clone().unwrap_or_default(),
            purpose: appointment.purpose.as_str().to_string(),
            date: appointment.date.clone(),
            time: appointment.time.clone(),
            location: appointment.location_or_default().to_string(),
            event_link: event_link.to_string(),
            status: STATUS_CONFIRMED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Lead(LeadRow),
    Appointment(AppointmentRow),
}

impl Record {
    pub fn category(&self) -> RecordCategory {
        match self {
            Record::Lead(_) => RecordCategory::Leads,
            Record::Appointment(_) => RecordCategory::Appointments,
        }
    }
}

fn now_stamp() -> String {
    let now: NaiveDateTime = Utc::now().naive_utc();
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lead::{LeadType, LeadUpdate};

    #[test]
    fn test_row_from_lead() {
        let mut lead = LeadRecord::new("CA1", Some("+15145550000"));
        lead.merge(LeadUpdate {
            name: Some("Jane".to_string()),
            lead_type: Some(LeadType::Renter),
            ..Default::default()
        });
        lead.add_note("wants a 2br");
        lead.add_note("July 1st move");

        let row = LeadRow::from_lead(&lead);
        assert_eq!(row.name, "Jane");
        assert_eq!(row.phone, "+15145550000");
        assert_eq!(row.lead_type, "Renter");
        assert_eq!(row.notes, "wants a 2br; July 1st move");
        assert_eq!(row.source, SOURCE_TAG);
        assert_eq!(row.status, STATUS_NEW);
    }

    #[test]
    fn test_row_from_lead_without_phone_uses_call_sid() {
        let lead = LeadRecord::new("CA77", None);
        assert_eq!(LeadRow::from_lead(&lead).phone, "CA77");
    }

    #[test]
    fn test_category() {
        let row = LeadRow::new("SYSTEM", "CA1", "Call Log");
        assert_eq!(Record::Lead(row).category(), RecordCategory::Leads);
    }
}
