//! Entity store: durable local records with dirty/tombstone tracking

use std::marker::PhantomData;

use rusqlite::Connection;

use super::identity::IdentityResolver;
use super::records::RecordTable;
use crate::error::{Error, Result};
use crate::models::{EntityId, SyncEntity};
use crate::util::now_ms;

/// Local persistence for one record kind.
///
/// Every mutation through `create`, `update`, or `soft_delete` leaves the record
/// dirty (`synced = false`) with a fresh `updated_at`, which is what queues it for
/// the next sync pass. "Not found" is reported as `None`/`false`; a failed write is
/// always an error ([`Error::StorageFull`] when the quota is exhausted).
pub struct EntityStore<'a, T> {
    records: RecordTable<'a>,
    _kind: PhantomData<T>,
}

impl<'a, T: SyncEntity> EntityStore<'a, T> {
    /// Create a store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            records: RecordTable::new(conn, T::KIND.namespace()),
            _kind: PhantomData,
        }
    }

    /// Create a new record with a fresh local id
    pub fn create(&self, draft: T::Draft) -> Result<T> {
        let record = T::from_draft(EntityId::new_local(), draft, now_ms())?;
        self.save(&record)?;
        tracing::debug!("Created local {} {}", T::KIND, record.id());
        Ok(record)
    }

    /// Fetch a record by its current id, tombstones included
    pub fn get(&self, id: &EntityId) -> Result<Option<T>> {
        self.records.get_json(id.as_str())
    }

    /// Apply a partial update to a live record
    pub fn update(&self, id: &EntityId, patch: T::Patch) -> Result<Option<T>> {
        let Some(mut record) = self.get(id)? else {
            return Ok(None);
        };
        if record.is_deleted() {
            return Ok(None);
        }

        record.apply_patch(patch)?;
        record.touch(self.next_timestamp(&record));
        self.save(&record)?;
        Ok(Some(record))
    }

    /// Tombstone a record; returns `false` if no such record exists
    pub fn soft_delete(&self, id: &EntityId) -> Result<bool> {
        let Some(mut record) = self.get(id)? else {
            return Ok(false);
        };

        record.set_deleted(true);
        record.touch(self.next_timestamp(&record));
        self.save(&record)?;
        Ok(true)
    }

    /// Persist a record under its current id
    pub fn save(&self, record: &T) -> Result<()> {
        if record.is_deleted() && record.is_synced() {
            return Err(Error::InvalidInput(format!(
                "refusing to store synced tombstone for {} {}",
                T::KIND,
                record.id()
            )));
        }
        self.records
            .put_json(record.id().as_str(), record, record.updated_at())
    }

    /// Remove a record entirely; returns whether anything was removed
    pub fn purge(&self, id: &EntityId) -> Result<bool> {
        self.records.delete(id.as_str())
    }

    /// Every decodable record, most recently updated first
    pub fn list_all(&self) -> Result<Vec<T>> {
        self.records.scan_json()
    }

    /// Records not tombstoned, most recently updated first
    pub fn list_live(&self) -> Result<Vec<T>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| !record.is_deleted())
            .collect())
    }

    /// Dirty records awaiting a remote create or update
    pub fn list_pending_push(&self) -> Result<Vec<T>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| record.is_pending() && !record.is_deleted())
            .collect())
    }

    /// Tombstones awaiting a remote delete
    pub fn list_pending_delete(&self) -> Result<Vec<T>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| record.is_pending() && record.is_deleted())
            .collect())
    }

    /// Linear scan for the record carrying `server_id`
    pub fn find_by_server_id(&self, server_id: &EntityId) -> Result<Option<T>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|record| record.server_id() == Some(server_id)))
    }

    /// Look a record up by any id a caller may hold.
    ///
    /// Tries the id after rename redirection, then the reverse index, then a
    /// full scan comparing server ids.
    pub fn find(&self, resolver: &IdentityResolver<'_>, id: &EntityId) -> Result<Option<T>> {
        let resolved = resolver.resolve(id)?;
        if let Some(record) = self.get(&resolved)? {
            return Ok(Some(record));
        }

        if let Some(local_id) = resolver.reverse_lookup(T::KIND, &resolved)? {
            if let Some(record) = self.get(&local_id)? {
                if record.server_id() == Some(&resolved) {
                    return Ok(Some(record));
                }
            }
        }

        self.find_by_server_id(&resolved)
    }

    /// Move a record from `old_id` to `new_id`.
    ///
    /// Order matters: the record is written under the new id, the rename is
    /// recorded, and only then is the old key removed. If recording the rename
    /// fails the new copy is rolled back and the record stays under `old_id`.
    pub fn rename(
        &self,
        resolver: &IdentityResolver<'_>,
        old_id: &EntityId,
        new_id: &EntityId,
    ) -> Result<T> {
        let mut record = self
            .get(old_id)?
            .ok_or_else(|| Error::NotFound(format!("{} {old_id}", T::KIND)))?;
        if old_id == new_id {
            return Ok(record);
        }

        record.set_id(new_id.clone());
        self.save(&record)?;

        if let Err(error) = resolver.record_rename(old_id, new_id) {
            tracing::warn!(
                "Failed to record rename {} -> {} for {}: {}; rolling back",
                old_id,
                new_id,
                T::KIND,
                error
            );
            if let Err(rollback_error) = self.purge(new_id) {
                tracing::error!(
                    "Rollback of {} {} failed: {}",
                    T::KIND,
                    new_id,
                    rollback_error
                );
            }
            return Err(error);
        }

        self.purge(old_id)?;

        if let Some(server_id) = record.server_id() {
            if let Err(error) = resolver.record_reverse(T::KIND, server_id, new_id) {
                // The reverse index is a cache; lookups fall back to a scan.
                tracing::warn!("Failed to update reverse index for {}: {}", server_id, error);
            }
        }

        tracing::debug!("Renamed {} {} -> {}", T::KIND, old_id, new_id);
        Ok(record)
    }

    /// Point every `folder_ref` equal to `old_id` at `new_id`.
    ///
    /// Timestamps and dirty bits are left alone: the remote side never saw the old
    /// local id. Returns the number of records rewritten.
    pub fn rewrite_folder_refs(&self, old_id: &EntityId, new_id: &EntityId) -> Result<usize> {
        let mut rewritten = 0;
        for mut record in self.list_all()? {
            if record.folder_ref() == Some(old_id) {
                record.set_folder_ref(Some(new_id.clone()));
                self.save(&record)?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Clear every `folder_ref` equal to `folder_id`, marking those records dirty.
    pub fn detach_folder_refs(&self, folder_id: &EntityId) -> Result<usize> {
        let mut detached = 0;
        for mut record in self.list_live()? {
            if record.folder_ref() == Some(folder_id) {
                record.set_folder_ref(None);
                record.touch(self.next_timestamp(&record));
                self.save(&record)?;
                detached += 1;
            }
        }
        Ok(detached)
    }

    /// A modification time strictly after the record's current one, so two edits
    /// within the same millisecond still look different to the race check.
    fn next_timestamp(&self, record: &T) -> i64 {
        now_ms().max(record.updated_at() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Folder, FolderDraft, Snippet, SnippetDraft, SnippetPatch};

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());

        let snippet = store.create(SnippetDraft::new("Hello world")).unwrap();
        assert!(snippet.id.is_local());
        assert!(!snippet.synced);
        assert!(!snippet.deleted);

        let fetched = store.get(&snippet.id).unwrap().unwrap();
        assert_eq!(fetched, snippet);
    }

    #[test]
    fn test_update_marks_dirty_even_without_changes() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());

        let mut snippet = store.create(SnippetDraft::new("Original")).unwrap();
        snippet.synced = true;
        store.save(&snippet).unwrap();

        let updated = store
            .update(&snippet.id, SnippetPatch::default())
            .unwrap()
            .unwrap();
        assert!(!updated.synced);
        assert!(updated.updated_at > snippet.updated_at);
    }

    #[test]
    fn test_update_missing_returns_none() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        assert!(store
            .update(&EntityId::from("nope"), SnippetPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_soft_delete() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());

        let snippet = store.create(SnippetDraft::new("To delete")).unwrap();
        assert!(store.soft_delete(&snippet.id).unwrap());
        assert!(!store.soft_delete(&EntityId::from("missing")).unwrap());

        let tombstone = store.get(&snippet.id).unwrap().unwrap();
        assert!(tombstone.deleted);
        assert!(!tombstone.synced);

        assert!(store.list_live().unwrap().is_empty());
        assert!(store.list_pending_push().unwrap().is_empty());
        assert_eq!(store.list_pending_delete().unwrap().len(), 1);

        // Tombstoned records cannot be edited
        assert!(store
            .update(&snippet.id, SnippetPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_rejects_synced_tombstone() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let mut snippet = store.create(SnippetDraft::new("x")).unwrap();
        snippet.deleted = true;
        snippet.synced = true;
        assert!(matches!(
            store.save(&snippet).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_list_live_newest_first() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());

        let first = store.create(SnippetDraft::new("one")).unwrap();
        let second = store.create(SnippetDraft::new("two")).unwrap();
        store
            .update(
                &first.id,
                SnippetPatch {
                    body: Some("one, edited".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .unwrap();

        let live = store.list_live().unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].id, first.id);
        assert_eq!(live[1].id, second.id);
    }

    #[test]
    fn test_corrupted_record_is_skipped() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        store.create(SnippetDraft::new("fine")).unwrap();
        RecordTable::new(db.connection(), "snippets")
            .put_raw("broken", "{\"id\": 7", 0)
            .unwrap();

        assert_eq!(store.list_live().unwrap().len(), 1);
        assert!(store.get(&EntityId::from("broken")).unwrap().is_none());
    }

    #[test]
    fn test_save_failure_is_not_silent() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let snippet = store.create(SnippetDraft::new("small")).unwrap();

        db.set_max_page_count(db.page_count().unwrap()).unwrap();

        let result = store.update(
            &snippet.id,
            SnippetPatch {
                body: Some("y".repeat(512 * 1024)),
                ..SnippetPatch::default()
            },
        );
        assert!(matches!(result, Err(Error::StorageFull)));
        assert_eq!(store.get(&snippet.id).unwrap().unwrap().body, "small");
    }

    #[test]
    fn test_purge() {
        let db = setup();
        let store = EntityStore::<Folder>::new(db.connection());
        let folder = store.create(FolderDraft::new("Work")).unwrap();
        assert!(store.purge(&folder.id).unwrap());
        assert!(!store.purge(&folder.id).unwrap());
        assert!(store.get(&folder.id).unwrap().is_none());
    }

    #[test]
    fn test_rename_moves_record_and_records_redirect() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let resolver = IdentityResolver::new(db.connection());

        let mut snippet = store.create(SnippetDraft::new("x")).unwrap();
        let old_id = snippet.id.clone();
        let new_id = EntityId::from("srv-1");
        snippet.server_id = Some(new_id.clone());
        store.save(&snippet).unwrap();

        let renamed = store.rename(&resolver, &old_id, &new_id).unwrap();
        assert_eq!(renamed.id, new_id);
        assert!(store.get(&old_id).unwrap().is_none());
        assert_eq!(store.get(&new_id).unwrap().unwrap().body, "x");
        assert_eq!(resolver.resolve(&old_id).unwrap(), new_id);
        assert_eq!(
            resolver
                .reverse_lookup(Snippet::KIND, &new_id)
                .unwrap()
                .as_ref(),
            Some(&new_id)
        );
    }

    #[test]
    fn test_rename_rolls_back_when_redirect_cannot_be_recorded() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let resolver = IdentityResolver::new(db.connection());
        let snippet = store.create(SnippetDraft::new("x")).unwrap();

        db.connection()
            .execute_batch(
                "CREATE TRIGGER reject_rename_map BEFORE INSERT ON records
                 WHEN NEW.namespace = 'meta' AND NEW.id = 'rename_map'
                 BEGIN SELECT RAISE(ABORT, 'rename map unavailable'); END;",
            )
            .unwrap();

        let new_id = EntityId::from("srv-1");
        assert!(store.rename(&resolver, &snippet.id, &new_id).is_err());
        assert!(store.get(&snippet.id).unwrap().is_some());
        assert!(store.get(&new_id).unwrap().is_none());
        assert_eq!(resolver.resolve(&snippet.id).unwrap(), snippet.id);
    }

    #[test]
    fn test_find_by_any_id() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let resolver = IdentityResolver::new(db.connection());

        let mut snippet = store.create(SnippetDraft::new("x")).unwrap();
        snippet.server_id = Some(EntityId::from("srv-9"));
        store.save(&snippet).unwrap();

        // Not renamed yet and no reverse entry: found by scan on server id
        let found = store
            .find(&resolver, &EntityId::from("srv-9"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, snippet.id);

        let found = store.find(&resolver, &snippet.id).unwrap().unwrap();
        assert_eq!(found.id, snippet.id);
    }

    #[test]
    fn test_rewrite_and_detach_folder_refs() {
        let db = setup();
        let store = EntityStore::<Snippet>::new(db.connection());
        let old = EntityId::from("local_f");
        let new = EntityId::from("srv-f");

        let inside = store
            .create(SnippetDraft::new("in").in_folder(old.clone()))
            .unwrap();
        store.create(SnippetDraft::new("out")).unwrap();

        assert_eq!(store.rewrite_folder_refs(&old, &new).unwrap(), 1);
        let rewritten = store.get(&inside.id).unwrap().unwrap();
        assert_eq!(rewritten.folder_id.as_ref(), Some(&new));
        assert_eq!(rewritten.updated_at, inside.updated_at);

        assert_eq!(store.detach_folder_refs(&new).unwrap(), 1);
        let detached = store.get(&inside.id).unwrap().unwrap();
        assert!(detached.folder_id.is_none());
        assert!(detached.updated_at > inside.updated_at);
    }
}
