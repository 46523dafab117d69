use rusqlite::Connection;
use crate::models::{AuditEvent, EventKind};
use super::{AuditLog, StoreResult};

/// Audit trail repository over SQLite
pub struct EventRepo<'c> {
    conn: &'c Connection,
}

impl<'c> EventRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Events for one truck, oldest first
    pub fn list_for(&self, tracking_number: &str) -> StoreResult<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tracking_number, kind, detail, actor, ts
             FROM events
             WHERE tracking_number = ?1
             ORDER BY ts, id"
        )?;

        let rows = stmt.query_map([tracking_number], |row| {
            let kind: String = row.get(2)?;
            let kind = EventKind::from_str(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown event kind '{}'", kind).into(),
                )
            })?;
            Ok(AuditEvent {
                id: Some(row.get(0)?),
                tracking_number: row.get(1)?,
                kind,
                detail: row.get(3)?,
                actor: row.get(4)?,
                ts: row.get(5)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

impl AuditLog for EventRepo<'_> {
    fn append(
        &self,
        tracking_number: &str,
        kind: EventKind,
        detail: &str,
        actor: &str,
        ts: i64,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO events (tracking_number, kind, detail, actor, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![tracking_number, kind.as_str(), detail, actor, ts],
        )?;
        Ok(())
    }
}
