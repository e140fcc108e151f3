//! Signal database operations

use crate::db::lock_connection;
use crate::error::{FeedError, FeedResult};
use crate::types::{Action, Confidence, Session, Signal};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Undecoded `trading_signals` row
struct SignalRow {
    id: String,
    pair: String,
    action: String,
    confidence: i64,
    session: String,
    created_at: String,
    details: String,
}

impl SignalRow {
    /// Parse a row from the database
    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(SignalRow {
            id: row.get(0)?,
            pair: row.get(1)?,
            action: row.get(2)?,
            confidence: row.get(3)?,
            session: row.get(4)?,
            created_at: row.get(5)?,
            details: row.get(6)?,
        })
    }

    fn decode(self) -> FeedResult<Signal> {
        let malformed = |reason: String| FeedError::MalformedRecord(self.id.clone(), reason);

        let id = Uuid::parse_str(&self.id).map_err(|e| malformed(format!("invalid id: {}", e)))?;
        let action: Action = self.action.parse().map_err(malformed)?;
        let session: Session = self.session.parse().map_err(malformed)?;
        let confidence = Confidence::try_from(self.confidence).map_err(malformed)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| malformed(format!("invalid created_at '{}': {}", self.created_at, e)))?
            .with_timezone(&Utc);
        let details = serde_json::from_str(&self.details)
            .map_err(|e| malformed(format!("invalid details: {}", e)))?;

        Ok(Signal {
            id,
            pair: self.pair,
            action,
            confidence,
            session,
            created_at,
            details,
        })
    }
}

/// Fixed-width RFC 3339 so lexical order in SQL matches chronological order
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Signal {
    /// Insert signal into database
    pub fn insert(&self, conn: Arc<Mutex<Connection>>) -> FeedResult<()> {
        let conn = lock_connection(&conn)?;
        conn.execute(
            "INSERT INTO trading_signals (
                id, pair, action, confidence, session, created_at, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id.to_string(),
                self.pair,
                self.action.as_str(),
                self.confidence.value(),
                self.session.as_str(),
                format_timestamp(&self.created_at),
                self.details.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Every stored signal, most recent first
    pub fn list_all(conn: Arc<Mutex<Connection>>) -> FeedResult<Vec<Self>> {
        let conn = lock_connection(&conn)?;
        let mut stmt = conn.prepare(
            "SELECT id, pair, action, confidence, session, created_at, details
             FROM trading_signals ORDER BY created_at DESC, id ASC"
        )?;

        let rows = stmt.query_map([], |row| SignalRow::from_row(row))?;
        let mut signals = Vec::new();
        for row in rows {
            signals.push(row?.decode()?);
        }
        Ok(signals)
    }

    /// Delete every stored signal, returning how many rows were removed
    pub fn delete_all(conn: Arc<Mutex<Connection>>) -> FeedResult<usize> {
        let conn = lock_connection(&conn)?;
        Ok(conn.execute("DELETE FROM trading_signals", [])?)
    }

    pub fn count(conn: Arc<Mutex<Connection>>) -> FeedResult<usize> {
        let conn = lock_connection(&conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trading_signals", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
