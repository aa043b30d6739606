use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::appointment::ReminderMethod;
use crate::models::CalendarEvent;

#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Start times of everything already booked on `date`.
    async fn busy_starts(&self, date: NaiveDate) -> anyhow::Result<Vec<NaiveDateTime>>;

    /// Creates the event and returns an external reference to it.
    async fn create_event(&self, event: &CalendarEvent) -> anyhow::Result<String>;

    async fn event_ics(&self, _event_id: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub struct SqliteCalendar {
    db: Arc<Mutex<Connection>>,
    product_name: String,
}

impl SqliteCalendar {
    pub fn new(db: Arc<Mutex<Connection>>, product_name: &str) -> Self {
        Self {
            db,
            product_name: product_name.to_string(),
        }
    }
}

#[async_trait]
impl CalendarStore for SqliteCalendar {
    async fn busy_starts(&self, date: NaiveDate) -> anyhow::Result<Vec<NaiveDateTime>> {
        let db = self.db.lock().unwrap();
        queries::get_event_starts_on(&db, date).context("failed to list calendar events")
    }

    async fn create_event(&self, event: &CalendarEvent) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let db = self.db.lock().unwrap();
            queries::insert_event(&db, &id, event).context("failed to insert calendar event")?;
        }
        tracing::info!(event_id = %id, start = %event.start, "calendar event created");
        Ok(format!("/calendar/{id}.ics"))
    }

    async fn event_ics(&self, event_id: &str) -> anyhow::Result<Option<String>> {
        let loaded = {
            let db = self.db.lock().unwrap();
            queries::get_event(&db, event_id)?
        };
        Ok(loaded.map(|(event, created_at)| generate_ics(event_id, &event, &created_at, &self.product_name)))
    }
}

/// Stand-in when no calendar is configured: availability degrades to the
/// fallback slots and bookings are only logged.
pub struct UnconfiguredCalendar;

#[async_trait]
impl CalendarStore for UnconfiguredCalendar {
    async fn busy_starts(&self, _date: NaiveDate) -> anyhow::Result<Vec<NaiveDateTime>> {
        anyhow::bail!("calendar not configured")
    }

    async fn create_event(&self, event: &CalendarEvent) -> anyhow::Result<String> {
        tracing::info!(summary = %event.summary, start = %event.start, "calendar not configured, mock booking");
        Ok("mock-booking".to_string())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

pub fn generate_ics(
    event_id: &str,
    event: &CalendarEvent,
    created_at: &NaiveDateTime,
    product_name: &str,
) -> String {
    let dtstart = event.start.format("%Y%m%dT%H%M%S");
    let dtend = event.end.format("%Y%m%dT%H%M%S");
    let dtstamp = created_at.format("%Y%m%dT%H%M%S");
    let tz = &event.timezone;
    let uid = format!("{event_id}@receptionist");
    let summary = escape_text(&event.summary);
    let location = escape_text(&event.location);
    let description = escape_text(&event.description);

    let mut ics = format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//{product_name}//AI Receptionist//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART;TZID={tz}:{dtstart}\r\n\
         DTEND;TZID={tz}:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         LOCATION:{location}\r\n\
         DESCRIPTION:{description}\r\n"
    );

    for attendee in &event.attendees {
        ics.push_str(&format!("ATTENDEE:mailto:{attendee}\r\n"));
    }

    for reminder in &event.reminders {
        let action = match reminder.method {
            ReminderMethod::Email => "EMAIL",
            ReminderMethod::Popup => "DISPLAY",
        };
        ics.push_str(&format!(
            "BEGIN:VALARM\r\n\
             ACTION:{action}\r\n\
             TRIGGER:-PT{}M\r\n\
             DESCRIPTION:{summary}\r\n\
             END:VALARM\r\n",
            reminder.minutes
        ));
    }

    ics.push_str("END:VEVENT\r\nEND:VCALENDAR\r\n");
    ics
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::appointment::REMINDERS;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn event() -> CalendarEvent {
        CalendarEvent {
            summary: "Property Viewing - Alice (AI Booked)".to_string(),
            location: "123 Rue X, Montréal".to_string(),
            description: "Client: Alice\nPhone: +15145550000".to_string(),
            start: dt("2025-06-10 10:00:00"),
            end: dt("2025-06-10 11:00:00"),
            timezone: "America/Montreal".to_string(),
            attendees: vec!["agent@example.com".to_string(), "alice@example.com".to_string()],
            reminders: REMINDERS.to_vec(),
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics("evt-123", &event(), &dt("2025-06-01 09:00:00"), "BHHS");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("UID:evt-123@receptionist"));
        assert!(ics.contains("DTSTART;TZID=America/Montreal:20250610T100000"));
        assert!(ics.contains("DTEND;TZID=America/Montreal:20250610T110000"));
        assert!(ics.contains("SUMMARY:Property Viewing - Alice (AI Booked)"));
        assert!(ics.contains("LOCATION:123 Rue X\\, Montréal"));
        assert!(ics.contains("DESCRIPTION:Client: Alice\\nPhone: +15145550000"));
        assert!(ics.contains("ATTENDEE:mailto:alice@example.com"));
        assert!(ics.contains("ACTION:EMAIL\r\nTRIGGER:-PT60M"));
        assert!(ics.contains("ACTION:DISPLAY\r\nTRIGGER:-PT15M"));
        assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
    }

    #[tokio::test]
    async fn test_sqlite_calendar_create_then_list() {
        let conn = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let calendar = SqliteCalendar::new(conn, "BHHS");

        let link = calendar.create_event(&event()).await.unwrap();
        assert!(link.starts_with("/calendar/"));
        assert!(link.ends_with(".ics"));

        let busy = calendar
            .busy_starts(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(busy, vec![dt("2025-06-10 10:00:00")]);

        let id = link
            .trim_start_matches("/calendar/")
            .trim_end_matches(".ics");
        let ics = calendar.event_ics(id).await.unwrap().unwrap();
        assert!(ics.contains("SUMMARY:Property Viewing - Alice (AI Booked)"));
        assert!(calendar.event_ics("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_calendar() {
        let calendar = UnconfiguredCalendar;
        assert!(!calendar.is_configured());
        assert!(calendar
            .busy_starts(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
            .await
            .is_err());
        assert_eq!(calendar.create_event(&event()).await.unwrap(), "mock-booking");
    }
}
