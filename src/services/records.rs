use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::Record;

/// Append-only sink for lead and appointment rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append(&self, record: &Record) -> anyhow::Result<()>;

    fn is_configured(&self) -> bool {
        true
    }
}

pub struct SqliteRecordStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn append(&self, record: &Record) -> anyhow::Result<()> {
        let db = self.db.lock().unwrap();
        let inserted = match record {
            Record::Lead(row) => queries::insert_lead(&db, row),
            Record::Appointment(row) => queries::insert_appointment(&db, row),
        };
        inserted.with_context(|| format!("failed to append {} row", record.category().as_str()))?;
        Ok(())
    }
}

/// Used when no database is configured; rows only reach the log.
pub struct ConsoleRecordStore;

#[async_trait]
impl RecordStore for ConsoleRecordStore {
    async fn append(&self, record: &Record) -> anyhow::Result<()> {
        let row = serde_json::to_string(record)?;
        tracing::info!(category = record.category().as_str(), row = %row, "record store not configured, logging row");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Appointment, AppointmentRow, LeadRow, Purpose};

    #[tokio::test]
    async fn test_sqlite_store_routes_by_category() {
        let conn = Arc::new(Mutex::new(db::init_db(":memory:").unwrap()));
        let store = SqliteRecordStore::new(Arc::clone(&conn));

        store
            .append(&Record::Lead(LeadRow::new("Alice", "+15145550000", "Buyer")))
            .await
            .unwrap();

        let appointment = Appointment {
            name: "Alice".to_string(),
            phone: "+15145550000".to_string(),
            email: None,
            date: "2025-06-10".to_string(),
            time: "10:00 AM".to_string(),
            purpose: Purpose::BuyerConsultation,
            location: None,
            lead_type: None,
            notes: None,
        };
        store
            .append(&Record::Appointment(AppointmentRow::new(&appointment, "evt")))
            .await
            .unwrap();

        let db = conn.lock().unwrap();
        assert_eq!(queries::count_rows(&db, "leads").unwrap(), 1);
        assert_eq!(queries::count_rows(&db, "appointments").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_console_store_never_fails() {
        let store = ConsoleRecordStore;
        assert!(!store.is_configured());
        store
            .append(&Record::Lead(LeadRow::new("SYSTEM", "CA1", "Call Log")))
            .await
            .unwrap();
    }
}
