//! Hand-written collaborator fakes shared by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::config::AppConfig;
use crate::models::availability::ConflictRule;
use crate::models::record::{AppointmentRow, LeadRow};
use crate::models::{CalendarEvent, Record};
use crate::services::calendar::CalendarStore;
use crate::services::call_control::CallControl;
use crate::services::messaging::MessagingProvider;
use crate::services::records::RecordStore;

pub fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        database_url: String::new(),
        admin_token: "test-token".to_string(),
        openai_api_key: String::new(),
        realtime_url: "ws://localhost/realtime".to_string(),
        realtime_voice: "alloy".to_string(),
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(),
        twilio_phone_number: String::new(),
        agent_name: "Mark Esposito".to_string(),
        agent_company: "BHHS Québec".to_string(),
        agent_phone: "+15145559999".to_string(),
        agent_email: "mark@example.com".to_string(),
        timezone: "America/Montreal".to_string(),
        cleanup_delay_secs: 300,
        tool_timeout_secs: 1,
        availability_rule: ConflictRule::SameHour,
    }
}

// ── Records ──

#[derive(Clone, Default)]
pub struct MockRecords {
    pub rows: Arc<Mutex<Vec<Record>>>,
    fail: bool,
    stall: bool,
}

impl MockRecords {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// A store whose writes never complete.
    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Default::default()
        }
    }

    pub fn leads(&self) -> Vec<LeadRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Record::Lead(row) => Some(row.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn appointments(&self) -> Vec<AppointmentRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Record::Appointment(row) => Some(row.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    async fn append(&self, record: &Record) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("record store unavailable");
        }
        if self.stall {
            std::future::pending::<()>().await;
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ── Calendar ──

#[derive(Clone, Default)]
pub struct MockCalendar {
    pub busy: Vec<NaiveDateTime>,
    pub created: Arc<Mutex<Vec<CalendarEvent>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockCalendar {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CalendarStore for MockCalendar {
    async fn busy_starts(&self, _date: NaiveDate) -> anyhow::Result<Vec<NaiveDateTime>> {
        if self.fail {
            anyhow::bail!("calendar unavailable");
        }
        Ok(self.busy.clone())
    }

    async fn create_event(&self, event: &CalendarEvent) -> anyhow::Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("calendar unavailable");
        }
        let mut created = self.created.lock().unwrap();
        created.push(event.clone());
        Ok(format!("/calendar/evt-{}.ics", created.len()))
    }
}

// ── Messaging ──

#[derive(Clone, Default)]
pub struct MockMessaging {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MockMessaging {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for fire-and-forget sends to land.
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sms gateway down");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Call control ──

#[derive(Clone, Default)]
pub struct MockCallControl {
    pub transfers: Arc<Mutex<Vec<String>>>,
}

impl MockCallControl {
    pub fn transfers(&self) -> Vec<String> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallControl for MockCallControl {
    async fn transfer(&self, call_sid: &str, _context: &str) -> anyhow::Result<()> {
        self.transfers.lock().unwrap().push(call_sid.to_string());
        Ok(())
    }
}
