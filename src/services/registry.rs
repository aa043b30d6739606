use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::services::records::RecordStore;
use crate::services::session::Session;

/// Process-wide map from call id to its live session.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    records: Arc<dyn RecordStore>,
    cleanup_delay: Duration,
    write_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(records: Arc<dyn RecordStore>, cleanup_delay: Duration, write_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            records,
            cleanup_delay,
            write_timeout,
        }
    }

    /// Returns the session for `call_sid`, creating it if needed. The caller
    /// phone only seeds a newly created session.
    pub fn get_or_create(&self, call_sid: &str, caller_phone: Option<&str>) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(existing) = sessions.get(call_sid) {
            return Arc::clone(existing);
        }
        let session = Arc::new(Session::new(call_sid, caller_phone));
        sessions.insert(call_sid.to_string(), Arc::clone(&session));
        tracing::info!(call_sid = %call_sid, "session created");
        session
    }

    pub fn get(&self, call_sid: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(call_sid).cloned()
    }

    pub fn remove(&self, call_sid: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().remove(call_sid)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self.sessions.lock().unwrap().values().cloned().collect();
        sessions.sort_by(|a, b| a.call_sid().cmp(b.call_sid()));
        sessions
    }

    /// Arms the deferred finalize-and-evict timer for a finalizing session.
    pub fn schedule_cleanup(self: &Arc<Self>, session: &Session) {
        let registry = Arc::clone(self);
        let call_sid = session.call_sid().to_string();
        let delay = self.cleanup_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.finalize_now(&call_sid).await;
        });
        session.set_cleanup(handle);
        tracing::debug!(call_sid = %session.call_sid(), delay_secs = delay.as_secs(), "cleanup scheduled");
    }

    /// Evicts and closes the session. No-op if it is already gone.
    pub async fn finalize_now(&self, call_sid: &str) -> bool {
        let Some(session) = self.remove(call_sid) else {
            return false;
        };
        session.begin_finalizing();
        session.close(self.records.as_ref(), self.write_timeout).await;
        tracing::info!(call_sid = %call_sid, "session cleaned up");
        true
    }

    /// Finalizes every remaining session immediately, cancelling timers.
    pub async fn flush_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, s)| s).collect()
        };

        for session in &drained {
            session.cancel_cleanup();
            session.begin_finalizing();
            session.close(self.records.as_ref(), self.write_timeout).await;
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "flushed remaining sessions");
        }
        drained.len()
    }
}
