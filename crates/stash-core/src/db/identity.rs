//! Identifier reconciliation between local tokens and server ids

use std::collections::BTreeMap;

use rusqlite::Connection;

use super::records::RecordTable;
use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind};
use crate::util::now_ms;

const RENAME_MAP_KEY: &str = "rename_map";
const REVERSE_MAP_KEY: &str = "reverse_map";

type IdMap = BTreeMap<String, String>;

/// Durable id maps kept in the `meta` namespace.
///
/// - rename map: old local id -> current id, permanent for the life of the client.
/// - reverse map: `kind:server id` -> local id. Only a cache; every lookup that
///   misses it may fall back to a scan of the entity store.
pub struct IdentityResolver<'a> {
    meta: RecordTable<'a>,
}

impl<'a> IdentityResolver<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            meta: RecordTable::meta(conn),
        }
    }

    /// Follow rename redirects; returns the input unchanged when there are none.
    ///
    /// An unreadable rename map resolves nothing rather than failing reads.
    pub fn resolve(&self, id: &EntityId) -> Result<EntityId> {
        let renames = self.read(RENAME_MAP_KEY)?.unwrap_or_default();
        let mut current = id.as_str();
        // Chains are at most one hop today; the bound guards against a corrupted cycle.
        for _ in 0..=renames.len() {
            match renames.get(current) {
                Some(next) if next != current => current = next.as_str(),
                _ => break,
            }
        }
        Ok(EntityId::from(current))
    }

    /// Persist `old_id -> new_id`. Must succeed before the old record is removed.
    ///
    /// Fails with [`Error::Corrupted`] instead of replacing an unreadable map,
    /// which would drop every earlier redirect.
    pub fn record_rename(&self, old_id: &EntityId, new_id: &EntityId) -> Result<()> {
        let mut renames = self.read(RENAME_MAP_KEY)?.ok_or_else(|| {
            Error::Corrupted(format!(
                "{RENAME_MAP_KEY} cannot be decoded; refusing to overwrite it"
            ))
        })?;
        renames.insert(old_id.to_string(), new_id.to_string());
        self.meta.put_json(RENAME_MAP_KEY, &renames, now_ms())
    }

    pub fn record_reverse(
        &self,
        kind: EntityKind,
        server_id: &EntityId,
        local_id: &EntityId,
    ) -> Result<()> {
        let mut reverse = self.load(REVERSE_MAP_KEY)?;
        reverse.insert(reverse_key(kind, server_id), local_id.to_string());
        self.meta.put_json(REVERSE_MAP_KEY, &reverse, now_ms())
    }

    /// Drop the reverse entry for a purged record.
    pub fn forget_reverse(&self, kind: EntityKind, server_id: &EntityId) -> Result<()> {
        let mut reverse = self.load(REVERSE_MAP_KEY)?;
        if reverse.remove(&reverse_key(kind, server_id)).is_some() {
            self.meta.put_json(REVERSE_MAP_KEY, &reverse, now_ms())?;
        }
        Ok(())
    }

    /// Local id for a server id, if the index has it. Misses are expected.
    pub fn reverse_lookup(
        &self,
        kind: EntityKind,
        server_id: &EntityId,
    ) -> Result<Option<EntityId>> {
        let reverse = self.load(REVERSE_MAP_KEY)?;
        Ok(reverse
            .get(&reverse_key(kind, server_id))
            .map(|local_id| EntityId::from(local_id.as_str())))
    }

    /// `Ok(None)` when the stored map does not decode.
    fn read(&self, key: &str) -> Result<Option<IdMap>> {
        let Some(raw) = self.meta.get_raw(key)? else {
            return Ok(Some(IdMap::new()));
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(Some(map)),
            Err(error) => {
                tracing::warn!("Id map {} is unreadable: {}", key, error);
                Ok(None)
            }
        }
    }

    /// Reverse entries are a cache; an unreadable map is rebuilt from scratch.
    fn load(&self, key: &str) -> Result<IdMap> {
        Ok(self.read(key)?.unwrap_or_default())
    }
}

fn reverse_key(kind: EntityKind, server_id: &EntityId) -> String {
    format!("{}:{}", kind.as_str(), server_id)
}
