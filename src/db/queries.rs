use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{AppointmentRow, CalendarEvent, LeadRow};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Records ──

pub fn insert_lead(conn: &Connection, row: &LeadRow) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO leads (timestamp, name, phone, email, lead_type, area_interest, budget, timeline, property_address, notes, next_action, source, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            row.timestamp,
            row.name,
            row.phone,
            row.email,
            row.lead_type,
            row.area_interest,
            row.budget,
            row.timeline,
            row.property_address,
            row.notes,
            row.next_action,
            row.source,
            row.status,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_appointment(conn: &Connection, row: &AppointmentRow) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO appointments (timestamp, name, phone, email, purpose, date, time, location, event_link, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.timestamp,
            row.name,
            row.phone,
            row.email,
            row.purpose,
            row.date,
            row.time,
            row.location,
            row.event_link,
            row.status,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub(crate) fn count_rows(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    let table = match table {
        "leads" | "appointments" | "calendar_events" => table,
        other => anyhow::bail!("unknown table: {other}"),
    };
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}

// ── Calendar ──

pub fn insert_event(conn: &Connection, id: &str, event: &CalendarEvent) -> anyhow::Result<()> {
    let attendees = serde_json::to_string(&event.attendees)?;
    let reminders = serde_json::to_string(&event.reminders)?;
    let created_at = Utc::now().naive_utc().format(DATETIME_FORMAT).to_string();

    conn.execute(
        "INSERT INTO calendar_events (id, summary, location, description, start_time, end_time, timezone, attendees, reminders, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            event.summary,
            event.location,
            event.description,
            event.start.format(DATETIME_FORMAT).to_string(),
            event.end.format(DATETIME_FORMAT).to_string(),
            event.timezone,
            attendees,
            reminders,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_event(conn: &Connection, id: &str) -> anyhow::Result<Option<(CalendarEvent, NaiveDateTime)>> {
    let row = conn
        .query_row(
            "SELECT summary, location, description, start_time, end_time, timezone, attendees, reminders, created_at
             FROM calendar_events WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            },
        )
        .optional()?;

    let Some((summary, location, description, start, end, timezone, attendees, reminders, created_at)) = row
    else {
        return Ok(None);
    };

    let event = CalendarEvent {
        summary,
        location,
        description,
        start: NaiveDateTime::parse_from_str(&start, DATETIME_FORMAT)?,
        end: NaiveDateTime::parse_from_str(&end, DATETIME_FORMAT)?,
        timezone,
        attendees: serde_json::from_str(&attendees).unwrap_or_default(),
        reminders: serde_json::from_str(&reminders).unwrap_or_default(),
    };
    let created_at = NaiveDateTime::parse_from_str(&created_at, DATETIME_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Some((event, created_at)))
}

/// Start times of every event on `date`.
pub fn get_event_starts_on(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<NaiveDateTime>> {
    let day_start = date.format("%Y-%m-%d 00:00:00").to_string();
    let day_end = date.format("%Y-%m-%d 23:59:59").to_string();

    let mut stmt = conn.prepare(
        "SELECT start_time FROM calendar_events WHERE start_time >= ?1 AND start_time <= ?2 ORDER BY start_time ASC",
    )?;

    let starts = stmt
        .query_map(params![day_start, day_end], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .filter_map(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok())
        .collect();
    Ok(starts)
}
