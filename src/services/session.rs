use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::models::record::LeadRow;
use crate::models::{LeadRecord, Record, SessionStatus, ToolResult};
use crate::services::realtime::TransportHandle;
use crate::services::records::RecordStore;

pub const CLOSING_NOTE: &str = "Call ended without booking. Follow up required.";
pub const CLOSING_NEXT_ACTION: &str = "Call back to qualify further";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// Live state of one call, from creation until deferred cleanup.
pub struct Session {
    call_sid: String,
    created_at: DateTime<Utc>,
    status: Mutex<SessionStatus>,
    lead: Mutex<LeadRecord>,
    transport: Mutex<Option<TransportHandle>>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    invocations: Mutex<HashMap<String, ToolResult>>,
    booked_slots: Mutex<HashSet<String>>,
    transfer_pending: AtomicBool,
    transfer_signaled: AtomicBool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub call_sid: String,
    pub status: SessionStatus,
    pub caller: Option<String>,
    pub name: Option<String>,
    pub transfer_pending: bool,
    pub appointment_booked: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(call_sid: &str, caller_phone: Option<&str>) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            created_at: Utc::now(),
            status: Mutex::new(SessionStatus::Created),
            lead: Mutex::new(LeadRecord::new(call_sid, caller_phone)),
            transport: Mutex::new(None),
            cleanup: Mutex::new(None),
            invocations: Mutex::new(HashMap::new()),
            booked_slots: Mutex::new(HashSet::new()),
            transfer_pending: AtomicBool::new(false),
            transfer_signaled: AtomicBool::new(false),
        }
    }

    pub fn call_sid(&self) -> &str {
        &self.call_sid
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock().unwrap()
    }

    fn transition(&self, next: SessionStatus) -> Result<SessionStatus, SessionError> {
        let mut status = self.status.lock().unwrap();
        let from = *status;
        if !from.can_transition_to(next) {
            return Err(SessionError::InvalidTransition { from, to: next });
        }
        *status = next;
        tracing::debug!(call_sid = %self.call_sid, from = %from, to = %next, "session transition");
        Ok(from)
    }

    /// Created -> Streaming. Fails for any session that already streamed.
    pub fn begin_streaming(&self) -> Result<(), SessionError> {
        self.transition(SessionStatus::Streaming).map(|_| ())
    }

    /// Moves to Finalizing. Returns false if the session was already past it.
    pub fn begin_finalizing(&self) -> bool {
        self.transition(SessionStatus::Finalizing).is_ok()
    }

    pub fn with_lead<R>(&self, f: impl FnOnce(&mut LeadRecord) -> R) -> R {
        let mut lead = self.lead.lock().unwrap();
        f(&mut lead)
    }

    pub fn lead(&self) -> LeadRecord {
        self.lead.lock().unwrap().clone()
    }

    pub fn attach_transport(&self, handle: TransportHandle) {
        *self.transport.lock().unwrap() = Some(handle);
    }

    /// Closes the AI connection if one is attached. Safe to call repeatedly.
    pub fn close_transport(&self) -> bool {
        match self.transport.lock().unwrap().as_ref() {
            Some(handle) => handle.close(),
            None => false,
        }
    }

    /// Sets the sticky TransferPending flag; only honoured while streaming.
    pub fn request_transfer(&self) -> bool {
        if self.status() != SessionStatus::Streaming {
            tracing::warn!(call_sid = %self.call_sid, status = %self.status(), "transfer requested outside streaming");
            return false;
        }
        self.transfer_pending.store(true, Ordering::SeqCst);
        true
    }

    pub fn transfer_pending(&self) -> bool {
        self.transfer_pending.load(Ordering::SeqCst)
    }

    /// True exactly once, for the first caller after a transfer was requested.
    pub fn take_transfer_signal(&self) -> bool {
        self.transfer_pending()
            && self
                .transfer_signaled
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    pub fn cached_result(&self, invocation_id: &str) -> Option<ToolResult> {
        self.invocations.lock().unwrap().get(invocation_id).cloned()
    }

    pub fn cache_result(&self, invocation_id: &str, result: &ToolResult) {
        self.invocations
            .lock()
            .unwrap()
            .insert(invocation_id.to_string(), result.clone());
    }

    /// Records a booking attempt; true if the same slot was already tried.
    pub fn note_booking(&self, slot_key: &str) -> bool {
        !self.booked_slots.lock().unwrap().insert(slot_key.to_string())
    }

    pub fn set_cleanup(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.cleanup.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel_cleanup(&self) {
        if let Some(handle) = self.cleanup.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Terminal bookkeeping. Persists the unresolved lead when the caller
    /// left a name but never booked. Runs at most once and never fails; the
    /// write is abandoned after `write_timeout`.
    pub async fn close(&self, records: &dyn RecordStore, write_timeout: Duration) -> bool {
        {
            let mut status = self.status.lock().unwrap();
            match *status {
                SessionStatus::Closed => return false,
                SessionStatus::Finalizing => {}
                from => {
                    tracing::debug!(call_sid = %self.call_sid, from = %from, "closing session that never finalized");
                }
            }
            *status = SessionStatus::Closed;
        }
        self.close_transport();

        let row = self.with_lead(|lead| {
            if lead.appointment_booked() || !lead.has_name() {
                return None;
            }
            lead.add_note(CLOSING_NOTE);
            Some(LeadRow::from_lead(lead).with_next_action(CLOSING_NEXT_ACTION))
        });

        if let Some(row) = row {
            match tokio::time::timeout(write_timeout, records.append(&Record::Lead(row))).await {
                Ok(Ok(())) => tracing::info!(call_sid = %self.call_sid, "final lead persisted"),
                Ok(Err(e)) => {
                    tracing::error!(call_sid = %self.call_sid, error = %e, "failed to persist final lead")
                }
                Err(_) => tracing::error!(
                    call_sid = %self.call_sid,
                    timeout_secs = write_timeout.as_secs(),
                    "timed out persisting final lead"
                ),
            }
        }

        tracing::info!(call_sid = %self.call_sid, "session closed");
        true
    }

    pub fn summary(&self) -> SessionSummary {
        let lead = self.lead.lock().unwrap();
        SessionSummary {
            call_sid: self.call_sid.clone(),
            status: self.status(),
            caller: lead.phone.clone(),
            name: lead.name.clone(),
            transfer_pending: self.transfer_pending(),
            appointment_booked: lead.appointment_booked(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadUpdate;
    use crate::services::realtime::RealtimeConnection;
    use crate::testing::MockRecords;

    const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

    fn named(session: &Session, name: &str) {
        session.with_lead(|lead| {
            lead.merge(LeadUpdate {
                name: Some(name.to_string()),
                ..Default::default()
            })
        });
    }

    #[test]
    fn test_lifecycle_transitions() {
        let session = Session::new("CA1", Some("+15145550000"));
        assert_eq!(session.status(), SessionStatus::Created);
        session.begin_streaming().unwrap();
        assert_eq!(
            session.begin_streaming(),
            Err(SessionError::InvalidTransition {
                from: SessionStatus::Streaming,
                to: SessionStatus::Streaming,
            })
        );
        assert!(session.begin_finalizing());
        assert!(!session.begin_finalizing());
        assert!(session.begin_streaming().is_err());
    }

    #[test]
    fn test_transfer_pending_requires_streaming() {
        let session = Session::new("CA1", None);
        assert!(!session.request_transfer());
        assert!(!session.transfer_pending());

        session.begin_streaming().unwrap();
        assert!(session.request_transfer());
        assert!(session.begin_finalizing());
        // Sticky through finalizing.
        assert!(session.transfer_pending());
    }

    #[test]
    fn test_transfer_signal_fires_once() {
        let session = Session::new("CA1", None);
        assert!(!session.take_transfer_signal());
        session.begin_streaming().unwrap();
        session.request_transfer();
        assert!(session.take_transfer_signal());
        assert!(!session.take_transfer_signal());
    }

    #[test]
    fn test_close_transport_once() {
        let session = Session::new("CA1", None);
        assert!(!session.close_transport());
        let (connection, _peer) = RealtimeConnection::channel();
        session.attach_transport(connection.handle);
        assert!(session.close_transport());
        assert!(!session.close_transport());
    }

    #[tokio::test]
    async fn test_close_named_unbooked_writes_one_record() {
        let records = MockRecords::default();
        let session = Session::new("CA1", Some("+15145550000"));
        session.begin_streaming().unwrap();
        named(&session, "Jane");
        session.begin_finalizing();

        assert!(session.close(&records, WRITE_TIMEOUT).await);
        assert!(!session.close(&records, WRITE_TIMEOUT).await);

        let rows = records.leads();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Jane");
        assert_eq!(rows[0].phone, "+15145550000");
        assert!(rows[0].notes.contains(CLOSING_NOTE));
        assert_eq!(rows[0].next_action, CLOSING_NEXT_ACTION);
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_booked_writes_nothing() {
        let records = MockRecords::default();
        let session = Session::new("CA1", Some("+15145550000"));
        named(&session, "Jane");
        session.with_lead(|lead| lead.mark_appointment_booked());
        session.begin_finalizing();

        session.close(&records, WRITE_TIMEOUT).await;
        assert!(records.leads().is_empty());
    }

    #[tokio::test]
    async fn test_close_anonymous_writes_nothing() {
        let records = MockRecords::default();
        let session = Session::new("CA1", Some("+15145550000"));
        session.begin_finalizing();

        session.close(&records, WRITE_TIMEOUT).await;
        assert!(records.leads().is_empty());
    }

    #[tokio::test]
    async fn test_close_survives_failing_store() {
        let records = MockRecords::failing();
        let session = Session::new("CA1", None);
        named(&session, "Jane");
        session.begin_finalizing();

        assert!(session.close(&records, WRITE_TIMEOUT).await);
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_gives_up_on_stalled_store() {
        let records = MockRecords::stalled();
        let session = Session::new("CA1", None);
        named(&session, "Jane");
        session.begin_finalizing();

        assert!(session.close(&records, WRITE_TIMEOUT).await);
        assert_eq!(session.status(), SessionStatus::Closed);
        assert!(records.leads().is_empty());
    }

    #[test]
    fn test_invocation_cache_and_repeat_bookings() {
        let session = Session::new("CA1", None);
        let result = ToolResult::Sms { success: true };
        assert!(session.cached_result("call_1").is_none());
        session.cache_result("call_1", &result);
        assert_eq!(session.cached_result("call_1"), Some(result));

        assert!(!session.note_booking("2025-06-10 10:00 AM +1514"));
        assert!(session.note_booking("2025-06-10 10:00 AM +1514"));
    }
}
