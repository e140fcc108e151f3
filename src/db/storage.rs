//! Key/value rows backing durable local storage

use crate::db::lock_connection;
use crate::error::FeedResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// Read a value from `local_storage`
pub fn get_value(conn: Arc<Mutex<Connection>>, namespace: &str, key: &str) -> FeedResult<Option<String>> {
    let conn = lock_connection(&conn)?;
    let value = conn
        .query_row(
            "SELECT value FROM local_storage WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Insert or replace a value in a single statement
pub fn set_value(conn: Arc<Mutex<Connection>>, namespace: &str, key: &str, value: &str) -> FeedResult<()> {
    let conn = lock_connection(&conn)?;
    conn.execute(
        "INSERT INTO local_storage (namespace, key, value, updated_at)
         VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT (namespace, key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![namespace, key, value],
    )?;
    Ok(())
}
