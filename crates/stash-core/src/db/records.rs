//! Raw namespaced record access

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub const META_NAMESPACE: &str = "meta";

/// One namespace of the `records` table.
///
/// Payloads are JSON text. Rows that fail to decode are treated as absent and
/// logged, so one damaged record never makes the rest of the namespace unreadable.
#[derive(Clone, Copy)]
pub struct RecordTable<'a> {
    conn: &'a Connection,
    namespace: &'static str,
}

impl<'a> RecordTable<'a> {
    pub const fn new(conn: &'a Connection, namespace: &'static str) -> Self {
        Self { conn, namespace }
    }

    pub const fn meta(conn: &'a Connection) -> Self {
        Self::new(conn, META_NAMESPACE)
    }

    pub const fn connection(&self) -> &'a Connection {
        self.conn
    }

    pub fn get_raw(&self, id: &str) -> Result<Option<String>> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM records WHERE namespace = ? AND id = ?",
                params![self.namespace, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    /// Insert or replace one row. A single statement, so a failed write leaves
    /// the previous row untouched.
    pub fn put_raw(&self, id: &str, payload: &str, updated_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO records (namespace, id, payload, updated_at) VALUES (?, ?, ?, ?)",
                params![self.namespace, id, payload, updated_at],
            )
            .map_err(Error::from_write)?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE namespace = ? AND id = ?",
                params![self.namespace, id],
            )
            .map_err(Error::from_write)?;
        Ok(rows > 0)
    }

    /// All `(id, payload)` rows, most recently updated first.
    pub fn scan_raw(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, payload FROM records WHERE namespace = ? ORDER BY updated_at DESC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![self.namespace], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_json<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        let Some(payload) = self.get_raw(id)? else {
            return Ok(None);
        };
        Ok(self.decode(id, &payload))
    }

    pub fn put_json<T: Serialize>(&self, id: &str, value: &T, updated_at: i64) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.put_raw(id, &payload, updated_at)
    }

    /// Decode every row, skipping corrupted ones.
    pub fn scan_json<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        Ok(self
            .scan_raw()?
            .into_iter()
            .filter_map(|(id, payload)| self.decode(&id, &payload))
            .collect())
    }

    fn decode<T: DeserializeOwned>(&self, id: &str, payload: &str) -> Option<T> {
        match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(
                    "Skipping corrupted {} record {}: {}",
                    self.namespace,
                    id,
                    error
                );
                None
            }
        }
    }
}
