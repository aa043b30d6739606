use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::availability::parse_slot_label;
use super::lead::LeadType;

pub const APPOINTMENT_MINUTES: i64 = 60;
pub const DEFAULT_LOCATION: &str = "Phone/Video Call";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Purpose {
    #[serde(rename = "Property Viewing")]
    PropertyViewing,
    #[serde(rename = "Market Analysis (CMA)")]
    MarketAnalysis,
    #[serde(rename = "Buyer Consultation")]
    BuyerConsultation,
    #[serde(rename = "Seller Consultation")]
    SellerConsultation,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::PropertyViewing => "Property Viewing",
            Purpose::MarketAnalysis => "Market Analysis (CMA)",
            Purpose::BuyerConsultation => "Buyer Consultation",
            Purpose::SellerConsultation => "Seller Consultation",
        }
    }

    /// Case-insensitive, keyed on the distinguishing word ("viewing", "cma", ...).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.contains("viewing") || value.contains("visit") || value.contains("showing") {
            Some(Purpose::PropertyViewing)
        } else if value.contains("market") || value.contains("cma") || value.contains("evaluation") {
            Some(Purpose::MarketAnalysis)
        } else if value.contains("buyer") {
            Some(Purpose::BuyerConsultation)
        } else if value.contains("seller") {
            Some(Purpose::SellerConsultation)
        } else {
            None
        }
    }
}

impl<'de> Deserialize<'de> for Purpose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Purpose::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown appointment purpose: {raw:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub date: String,
    pub time: String,
    pub purpose: Purpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<LeadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Appointment {
    pub fn location_or_default(&self) -> &str {
        self.location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(DEFAULT_LOCATION)
    }

    /// Start from `date` ("2025-06-10") and `time` ("10:00 AM").
    pub fn start(&self) -> anyhow::Result<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid appointment date {:?}: {e}", self.date))?;
        let time = parse_slot_label(&self.time)
            .ok_or_else(|| anyhow::anyhow!("invalid appointment time: {:?}", self.time))?;
        Ok(date.and_time(time))
    }

    /// Same-slot key used to spot repeated bookings.
    pub fn slot_key(&self) -> String {
        format!("{} {} {}", self.date.trim(), self.time.trim(), self.phone.trim())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderMethod {
    Email,
    Popup,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes: u32,
}

pub const REMINDERS: [Reminder; 2] = [
    Reminder {
        method: ReminderMethod::Email,
        minutes: 60,
    },
    Reminder {
        method: ReminderMethod::Popup,
        minutes: 15,
    },
];

/// Calendar-store representation of a booked appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: String,
    pub attendees: Vec<String>,
    pub reminders: Vec<Reminder>,
}

impl CalendarEvent {
    pub fn from_appointment(
        appointment: &Appointment,
        timezone: &str,
        agent_email: &str,
    ) -> anyhow::Result<Self> {
        let start = appointment.start()?;
        let end = start + Duration::minutes(APPOINTMENT_MINUTES);

        let description = format!(
            "Client: {}\nPhone: {}\nEmail: {}\nType: {}\nNotes: {}\n\nBooked by AI Receptionist. Agent to confirm.",
            appointment.name,
            appointment.phone,
            appointment.email.as_deref().unwrap_or(""),
            appointment.lead_type.map(|t| t.as_str()).unwrap_or(""),
            appointment.notes.as_deref().unwrap_or(""),
        );

        let attendees = [Some(agent_email), appointment.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            summary: format!(
                "{} - {} (AI Booked)",
                appointment.purpose.as_str(),
                appointment.name
            ),
            location: appointment.location_or_default().to_string(),
            description,
            start,
            end,
            timezone: timezone.to_string(),
            attendees,
            reminders: REMINDERS.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment() -> Appointment {
        Appointment {
            name: "J. Doe".to_string(),
            phone: "+15145550000".to_string(),
            email: Some("jdoe@example.com".to_string()),
            date: "2025-06-10".to_string(),
            time: "10:00 AM".to_string(),
            purpose: Purpose::PropertyViewing,
            location: Some("123 Rue X".to_string()),
            lead_type: Some(LeadType::Buyer),
            notes: None,
        }
    }

    #[test]
    fn test_purpose_accepts_short_market_analysis() {
        let p: Purpose = serde_json::from_str("\"Market Analysis\"").unwrap();
        assert_eq!(p, Purpose::MarketAnalysis);
        let p: Purpose = serde_json::from_str("\"Market Analysis (CMA)\"").unwrap();
        assert_eq!(p, Purpose::MarketAnalysis);
        assert!(serde_json::from_str::<Purpose>("\"Dinner\"").is_err());
    }

    #[test]
    fn test_purpose_ignores_case() {
        let p: Purpose = serde_json::from_str("\"property viewing\"").unwrap();
        assert_eq!(p, Purpose::PropertyViewing);
        let p: Purpose = serde_json::from_str("\"SELLER CONSULTATION\"").unwrap();
        assert_eq!(p, Purpose::SellerConsultation);
        assert_eq!(Purpose::parse("cma"), Some(Purpose::MarketAnalysis));
    }

    #[test]
    fn test_start_parses_twelve_hour_time() {
        let mut a = appointment();
        a.time = "2:30 PM".to_string();
        let start = a.start().unwrap();
        assert_eq!(start.format("%Y-%m-%d %H:%M").to_string(), "2025-06-10 14:30");

        a.time = "half past two".to_string();
        assert!(a.start().is_err());
    }

    #[test]
    fn test_event_from_appointment() {
        let event =
            CalendarEvent::from_appointment(&appointment(), "America/Montreal", "agent@example.com")
                .unwrap();
        assert_eq!(event.summary, "Property Viewing - J. Doe (AI Booked)");
        assert_eq!(event.location, "123 Rue X");
        assert_eq!(event.end - event.start, Duration::minutes(60));
        assert_eq!(event.attendees, vec!["agent@example.com", "jdoe@example.com"]);
        assert_eq!(event.reminders, REMINDERS.to_vec());
        assert!(event.description.contains("Phone: +15145550000"));
    }

    #[test]
    fn test_event_skips_missing_attendees_and_defaults_location() {
        let mut a = appointment();
        a.email = None;
        a.location = None;
        let event = CalendarEvent::from_appointment(&a, "America/Montreal", "").unwrap();
        assert!(event.attendees.is_empty());
        assert_eq!(event.location, DEFAULT_LOCATION);
    }
}
