//! Sync metadata repository

use rusqlite::Connection;

use super::records::RecordTable;
use crate::error::Result;
use crate::models::SyncState;
use crate::util::now_ms;

const SYNC_STATE_KEY: &str = "sync_state";

/// Loads and stores the `{userId, lastSyncAt, mode}` record
pub struct MetadataRepository<'a> {
    meta: RecordTable<'a>,
}

impl<'a> MetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            meta: RecordTable::meta(conn),
        }
    }

    /// Load metadata; missing or unreadable records yield defaults
    pub fn load(&self) -> Result<SyncState> {
        Ok(self.meta.get_json(SYNC_STATE_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, state: &SyncState) -> Result<()> {
        self.meta.put_json(SYNC_STATE_KEY, state, now_ms())
    }

    /// Stamp the time of a run that changed at least one item
    pub fn record_sync(&self, at: i64) -> Result<SyncState> {
        let mut state = self.load()?;
        state.last_sync_at = Some(at);
        self.save(&state)?;
        Ok(state)
    }
}
