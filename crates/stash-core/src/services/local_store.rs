//! Shared local store service used by the merge view, the coordinator, and clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, EntityStore, IdentityResolver, MetadataRepository};
use crate::models::{
    EntityId, EntityKind, Folder, FolderDraft, FolderPatch, Snippet, SnippetDraft, SnippetPatch,
    SyncEntity, SyncState,
};
use crate::util::now_ms;
use crate::{Error, Result};

/// Records still waiting for the next sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub folders: usize,
    pub snippets: usize,
    pub deletions: usize,
}

impl PendingCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.folders + self.snippets + self.deletions
    }
}

/// Thread-safe handle over the local database.
///
/// The lock is taken per operation and never held across a network call, so user
/// edits can land while a sync run is waiting on the remote.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path, creating parent directories.
    ///
    /// A file that is not a database is moved aside and a fresh one is created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
            db_path: None,
        })
    }

    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn with_db<R>(&self, operation: impl FnOnce(&Database) -> Result<R>) -> Result<R> {
        let db = self.db.lock().await;
        operation(&db)
    }

    /// Follow rename redirects for an id a caller is holding.
    pub async fn resolve(&self, id: &EntityId) -> Result<EntityId> {
        self.with_db(|db| IdentityResolver::new(db.connection()).resolve(id))
            .await
    }

    // Snippets

    pub async fn create_snippet(&self, mut draft: SnippetDraft) -> Result<Snippet> {
        self.with_db(|db| {
            draft.folder_id = live_folder_ref(db, draft.folder_id.take())?;
            EntityStore::<Snippet>::new(db.connection()).create(draft)
        })
        .await
    }

    /// Live snippet by any id a caller may hold
    pub async fn get_snippet(&self, id: &EntityId) -> Result<Option<Snippet>> {
        Ok(self
            .find::<Snippet>(id)
            .await?
            .filter(|snippet| !snippet.deleted))
    }

    pub async fn update_snippet(
        &self,
        id: &EntityId,
        mut patch: SnippetPatch,
    ) -> Result<Option<Snippet>> {
        self.with_db(|db| {
            let resolver = IdentityResolver::new(db.connection());
            let store = EntityStore::<Snippet>::new(db.connection());
            let Some(current) = store.find(&resolver, id)? else {
                return Ok(None);
            };
            if let Some(folder_id) = patch.folder_id.take() {
                patch.folder_id = Some(live_folder_ref(db, folder_id)?);
            }
            store.update(&current.id, patch)
        })
        .await
    }

    /// Tombstone a snippet; returns `false` if it does not exist
    pub async fn delete_snippet(&self, id: &EntityId) -> Result<bool> {
        self.soft_delete::<Snippet>(id).await
    }

    /// Live snippets, most recently updated first
    pub async fn list_snippets(&self) -> Result<Vec<Snippet>> {
        self.list_live::<Snippet>().await
    }

    // Folders

    pub async fn create_folder(&self, mut draft: FolderDraft) -> Result<Folder> {
        self.with_db(|db| {
            draft.parent_id = live_folder_ref(db, draft.parent_id.take())?;
            EntityStore::<Folder>::new(db.connection()).create(draft)
        })
        .await
    }

    pub async fn get_folder(&self, id: &EntityId) -> Result<Option<Folder>> {
        Ok(self
            .find::<Folder>(id)
            .await?
            .filter(|folder| !folder.deleted))
    }

    pub async fn update_folder(
        &self,
        id: &EntityId,
        mut patch: FolderPatch,
    ) -> Result<Option<Folder>> {
        self.with_db(|db| {
            let resolver = IdentityResolver::new(db.connection());
            let store = EntityStore::<Folder>::new(db.connection());
            let Some(current) = store.find(&resolver, id)? else {
                return Ok(None);
            };
            if let Some(parent_id) = patch.parent_id.take() {
                let parent_id = live_folder_ref(db, parent_id)?;
                if let Some(parent_id) = &parent_id {
                    ensure_not_ancestor(&store, &current.id, parent_id)?;
                }
                patch.parent_id = Some(parent_id);
            }
            store.update(&current.id, patch)
        })
        .await
    }

    /// Tombstone a folder and detach the snippets and subfolders inside it.
    pub async fn delete_folder(&self, id: &EntityId) -> Result<bool> {
        self.with_db(|db| {
            let resolver = IdentityResolver::new(db.connection());
            let folders = EntityStore::<Folder>::new(db.connection());
            let Some(folder) = folders.find(&resolver, id)? else {
                return Ok(false);
            };
            if folder.deleted {
                return Ok(false);
            }

            let snippets = EntityStore::<Snippet>::new(db.connection()).detach_folder_refs(&folder.id)?;
            let subfolders = folders.detach_folder_refs(&folder.id)?;
            if snippets + subfolders > 0 {
                tracing::debug!(
                    "Detached {} snippets and {} folders from folder {}",
                    snippets,
                    subfolders,
                    folder.id
                );
            }
            folders.soft_delete(&folder.id)
        })
        .await
    }

    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.list_live::<Folder>().await
    }

    // Generic record access

    /// Look a record up by current id, stale local id, or server id.
    pub async fn find<T: SyncEntity>(&self, id: &EntityId) -> Result<Option<T>> {
        self.with_db(|db| {
            EntityStore::<T>::new(db.connection())
                .find(&IdentityResolver::new(db.connection()), id)
        })
        .await
    }

    pub async fn list_live<T: SyncEntity>(&self) -> Result<Vec<T>> {
        self.with_db(|db| EntityStore::<T>::new(db.connection()).list_live())
            .await
    }

    pub async fn pending_push<T: SyncEntity>(&self) -> Result<Vec<T>> {
        self.with_db(|db| EntityStore::<T>::new(db.connection()).list_pending_push())
            .await
    }

    pub async fn pending_delete<T: SyncEntity>(&self) -> Result<Vec<T>> {
        self.with_db(|db| EntityStore::<T>::new(db.connection()).list_pending_delete())
            .await
    }

    pub async fn pending_counts(&self) -> Result<PendingCounts> {
        self.with_db(|db| {
            let folders = EntityStore::<Folder>::new(db.connection());
            let snippets = EntityStore::<Snippet>::new(db.connection());
            Ok(PendingCounts {
                folders: folders.list_pending_push()?.len(),
                snippets: snippets.list_pending_push()?.len(),
                deletions: folders.list_pending_delete()?.len()
                    + snippets.list_pending_delete()?.len(),
            })
        })
        .await
    }

    async fn soft_delete<T: SyncEntity>(&self, id: &EntityId) -> Result<bool> {
        self.with_db(|db| {
            let store = EntityStore::<T>::new(db.connection());
            match store.find(&IdentityResolver::new(db.connection()), id)? {
                Some(record) if !record.is_deleted() => store.soft_delete(record.id()),
                _ => Ok(false),
            }
        })
        .await
    }

    /// Persist the server id on the record currently stored as `id`.
    ///
    /// Leaves timestamps and the dirty bit alone. Returns `None` if the record is gone.
    pub async fn assign_server_id<T: SyncEntity>(
        &self,
        id: &EntityId,
        server_id: &EntityId,
    ) -> Result<Option<T>> {
        self.with_db(|db| {
            let store = EntityStore::<T>::new(db.connection());
            let Some(mut record) = store.get(id)? else {
                return Ok(None);
            };
            record.set_server_id(server_id.clone());
            store.save(&record)?;
            Ok(Some(record))
        })
        .await
    }

    /// Rename a record from its local id to its server id.
    ///
    /// Renaming a folder also rewrites every parent and snippet reference to it.
    pub async fn reconcile_id<T: SyncEntity>(
        &self,
        old_id: &EntityId,
        server_id: &EntityId,
    ) -> Result<T> {
        self.with_db(|db| {
            let resolver = IdentityResolver::new(db.connection());
            let renamed = EntityStore::<T>::new(db.connection()).rename(&resolver, old_id, server_id)?;

            if T::KIND == EntityKind::Folder {
                let folders = EntityStore::<Folder>::new(db.connection())
                    .rewrite_folder_refs(old_id, server_id)?;
                let snippets = EntityStore::<Snippet>::new(db.connection())
                    .rewrite_folder_refs(old_id, server_id)?;
                tracing::debug!(
                    "Rewrote {} folder and {} snippet references {} -> {}",
                    folders,
                    snippets,
                    old_id,
                    server_id
                );
            }
            Ok(renamed)
        })
        .await
    }

    /// Clear the dirty bit if the record is unchanged since `seen_updated_at`.
    ///
    /// Returns `false` when the record was edited or deleted in the meantime.
    pub async fn mark_synced<T: SyncEntity>(
        &self,
        id: &EntityId,
        seen_updated_at: i64,
    ) -> Result<bool> {
        self.with_db(|db| {
            let store = EntityStore::<T>::new(db.connection());
            let Some(mut record) = store.get(id)? else {
                return Ok(false);
            };
            if record.updated_at() != seen_updated_at || record.is_deleted() {
                return Ok(false);
            }
            record.set_synced(true);
            store.save(&record)?;
            Ok(true)
        })
        .await
    }

    /// Remove a record entirely, dropping its reverse-index entry.
    pub async fn purge<T: SyncEntity>(&self, id: &EntityId) -> Result<bool> {
        self.with_db(|db| {
            let store = EntityStore::<T>::new(db.connection());
            let server_id = store.get(id)?.and_then(|record| record.server_id().cloned());
            let removed = store.purge(id)?;
            if let Some(server_id) = server_id {
                if let Err(error) =
                    IdentityResolver::new(db.connection()).forget_reverse(T::KIND, &server_id)
                {
                    tracing::warn!("Failed to drop reverse index for {}: {}", server_id, error);
                }
            }
            Ok(removed)
        })
        .await
    }

    /// Keep a synced copy of a record first seen through the remote store.
    ///
    /// Returns the existing local record instead when one already answers to the id.
    pub async fn adopt_remote<T: SyncEntity>(&self, record: T) -> Result<T> {
        self.with_db(|db| {
            let resolver = IdentityResolver::new(db.connection());
            let store = EntityStore::<T>::new(db.connection());
            if let Some(existing) = store.find(&resolver, record.id())? {
                return Ok(existing);
            }
            store.save(&record)?;
            if let Some(server_id) = record.server_id() {
                resolver.record_reverse(T::KIND, server_id, record.id())?;
            }
            Ok(record)
        })
        .await
    }

    /// Server id of a folder reference, if that folder has been created remotely
    pub async fn folder_server_id(&self, folder_id: &EntityId) -> Result<Option<EntityId>> {
        Ok(self
            .find::<Folder>(folder_id)
            .await?
            .and_then(|folder| folder.server_id))
    }

    // Metadata

    pub async fn sync_state(&self) -> Result<SyncState> {
        self.with_db(|db| MetadataRepository::new(db.connection()).load())
            .await
    }

    pub async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        self.with_db(|db| MetadataRepository::new(db.connection()).save(state))
            .await
    }

    /// Stamp the last successful sync time
    pub async fn record_sync(&self) -> Result<SyncState> {
        self.with_db(|db| MetadataRepository::new(db.connection()).record_sync(now_ms()))
            .await
    }

    /// Cap the database size in pages (see [`Database::set_max_page_count`])
    pub async fn set_max_page_count(&self, pages: i64) -> Result<i64> {
        self.with_db(|db| db.set_max_page_count(pages)).await
    }

    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_db(|db| Ok(db.connection().execute_batch(sql)?))
            .await
    }
}

/// Resolve a folder reference to a live folder's current id.
fn live_folder_ref(db: &Database, folder_id: Option<EntityId>) -> Result<Option<EntityId>> {
    let Some(folder_id) = folder_id else {
        return Ok(None);
    };
    let folder = EntityStore::<Folder>::new(db.connection())
        .find(&IdentityResolver::new(db.connection()), &folder_id)?
        .filter(|folder| !folder.deleted)
        .ok_or_else(|| Error::NotFound(format!("folder {folder_id}")))?;
    Ok(Some(folder.id))
}

/// Reject moving `folder_id` under one of its own descendants.
fn ensure_not_ancestor(
    store: &EntityStore<'_, Folder>,
    folder_id: &EntityId,
    new_parent: &EntityId,
) -> Result<()> {
    let folders = store.list_live()?;
    let mut current = Some(new_parent.clone());
    for _ in 0..=folders.len() {
        let Some(id) = current else {
            return Ok(());
        };
        if &id == folder_id {
            return Err(Error::InvalidInput(
                "folder cannot be moved inside itself".into(),
            ));
        }
        current = folders
            .iter()
            .find(|folder| folder.id == id)
            .and_then(|folder| folder.parent_id.clone());
    }
    Ok(())
}

fn is_corrupted_db_error(error: &Error) -> bool {
    matches!(
        error,
        Error::Database(inner)
            if inner.sqlite_error_code() == Some(rusqlite::ErrorCode::NotADatabase)
    )
}

fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
    if db_path.exists() {
        let backup_name = format!(
            "{}.corrupt-{}",
            db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("stash.db"),
            now_ms()
        );
        let backup_path = db_path.with_file_name(backup_name);
        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted local DB file from {} to {}",
            db_path.display(),
            backup_path.display()
        );
    }

    for suffix in ["-wal", "-shm"] {
        let mut sidecar = db_path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            std::fs::remove_file(&sidecar)?;
            tracing::warn!("Removed stale database file {}", sidecar.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn in_memory_create_and_list_roundtrip() {
        let store = LocalStore::open_in_memory().await.unwrap();

        store
            .create_snippet(SnippetDraft::new("hello core").with_tags(["rust"]))
            .await
            .unwrap();
        let snippets = store.list_snippets().await.unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].body, "hello core");
        assert_eq!(store.pending_counts().await.unwrap().snippets, 1);
    }

    #[tokio::test]
    async fn create_rejects_unknown_folder() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let result = store
            .create_snippet(SnippetDraft::new("x").in_folder(EntityId::from("missing")))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn stale_ids_are_redirected_after_rename() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let folder = store.create_folder(FolderDraft::new("Work")).await.unwrap();
        let snippet = store
            .create_snippet(SnippetDraft::new("x").in_folder(folder.id.clone()))
            .await
            .unwrap();

        let server_id = EntityId::from("srv-folder-1");
        store
            .assign_server_id::<Folder>(&folder.id, &server_id)
            .await
            .unwrap();
        store
            .reconcile_id::<Folder>(&folder.id, &server_id)
            .await
            .unwrap();

        assert_eq!(store.resolve(&folder.id).await.unwrap(), server_id);
        assert_eq!(
            store.get_folder(&folder.id).await.unwrap().unwrap().id,
            server_id
        );
        let moved = store.get_snippet(&snippet.id).await.unwrap().unwrap();
        assert_eq!(moved.folder_id, Some(server_id.clone()));
        assert_eq!(moved.updated_at, snippet.updated_at);

        // A stale folder id in a new draft still lands on the renamed folder
        let created = store
            .create_snippet(SnippetDraft::new("y").in_folder(folder.id.clone()))
            .await
            .unwrap();
        assert_eq!(created.folder_id, Some(server_id));
    }

    #[tokio::test]
    async fn delete_folder_detaches_children() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let parent = store.create_folder(FolderDraft::new("Parent")).await.unwrap();
        let child = store
            .create_folder(FolderDraft::new("Child").with_parent(parent.id.clone()))
            .await
            .unwrap();
        let snippet = store
            .create_snippet(SnippetDraft::new("x").in_folder(parent.id.clone()))
            .await
            .unwrap();

        assert!(store.delete_folder(&parent.id).await.unwrap());
        assert!(!store.delete_folder(&parent.id).await.unwrap());

        assert!(store.get_folder(&parent.id).await.unwrap().is_none());
        let child = store.get_folder(&child.id).await.unwrap().unwrap();
        assert!(child.parent_id.is_none());
        let snippet = store.get_snippet(&snippet.id).await.unwrap().unwrap();
        assert!(snippet.folder_id.is_none());
        assert_eq!(store.pending_counts().await.unwrap().deletions, 1);
    }

    #[tokio::test]
    async fn folder_cannot_move_into_descendant() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let parent = store.create_folder(FolderDraft::new("Parent")).await.unwrap();
        let child = store
            .create_folder(FolderDraft::new("Child").with_parent(parent.id.clone()))
            .await
            .unwrap();

        let result = store
            .update_folder(
                &parent.id,
                FolderPatch {
                    parent_id: Some(Some(child.id.clone())),
                    ..FolderPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn mark_synced_refuses_changed_record() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let snippet = store.create_snippet(SnippetDraft::new("x")).await.unwrap();
        store
            .update_snippet(
                &snippet.id,
                SnippetPatch {
                    body: Some("edited".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();

        assert!(!store
            .mark_synced::<Snippet>(&snippet.id, snippet.updated_at)
            .await
            .unwrap());
        let current = store.get_snippet(&snippet.id).await.unwrap().unwrap();
        assert!(store
            .mark_synced::<Snippet>(&snippet.id, current.updated_at)
            .await
            .unwrap());
        assert_eq!(store.pending_counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn purge_drops_reverse_entry() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let snippet = store.create_snippet(SnippetDraft::new("x")).await.unwrap();
        let server_id = EntityId::from("srv-1");
        store
            .assign_server_id::<Snippet>(&snippet.id, &server_id)
            .await
            .unwrap();
        store
            .reconcile_id::<Snippet>(&snippet.id, &server_id)
            .await
            .unwrap();

        assert!(store.purge::<Snippet>(&server_id).await.unwrap());
        assert!(store.find::<Snippet>(&server_id).await.unwrap().is_none());
        assert!(store.find::<Snippet>(&snippet.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn adopt_remote_keeps_a_synced_copy_once() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let remote = crate::remote::RemoteSnippet {
            id: EntityId::from("srv-9"),
            body: "from elsewhere".to_string(),
            tags: vec![],
            folder_id: None,
            created_at: 1,
            updated_at: 2,
        }
        .into_snippet();

        let adopted = store.adopt_remote(remote.clone()).await.unwrap();
        assert_eq!(adopted, remote);
        assert_eq!(store.pending_counts().await.unwrap().total(), 0);

        store
            .update_snippet(
                &adopted.id,
                SnippetPatch {
                    body: Some("edited".to_string()),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();
        let again = store.adopt_remote(remote).await.unwrap();
        assert_eq!(again.body, "edited");
        assert_eq!(store.pending_counts().await.unwrap().snippets, 1);
    }

    #[tokio::test]
    async fn open_path_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("stash.db");
        let store = LocalStore::open_path(&path).await.unwrap();
        store.create_snippet(SnippetDraft::new("x")).await.unwrap();
        drop(store);

        let reopened = LocalStore::open_path(&path).await.unwrap();
        assert_eq!(reopened.list_snippets().await.unwrap().len(), 1);
        assert_eq!(reopened.db_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn open_path_moves_corrupted_file_aside() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("stash.db");
        std::fs::write(&path, "not a database file ".repeat(512)).unwrap();

        let store = LocalStore::open_path(&path).await.unwrap();
        assert!(store.list_snippets().await.unwrap().is_empty());

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt-"))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        let not_a_db = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB),
            None,
        );
        assert!(is_corrupted_db_error(&Error::Database(not_a_db)));
        assert!(!is_corrupted_db_error(&Error::InvalidInput("x".into())));
    }
}
