//! Sync coordinator: pushes pending local changes to the remote store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use super::{Pushable, SyncReport};
use crate::auth::{AuthState, AuthUser};
use crate::models::{EntityId, Folder, Snippet, StorageMode, SyncEntity};
use crate::remote::{RemoteApi, RemoteError};
use crate::services::LocalStore;
use crate::Result;

/// Local folder id -> server id, for folders created during the current run
type FolderMap = HashMap<EntityId, EntityId>;

enum PushOutcome {
    Created(EntityId),
    Updated,
    /// Remote call succeeded but the local record changed meanwhile
    Skipped,
    Failed,
}

/// Pushes pending folders, then pending snippets, then deletions.
///
/// Runs are serialized. Per-item failures are counted and never abort the batch.
pub struct SyncCoordinator {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    auth: Arc<dyn AuthState>,
    run_lock: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteApi>, auth: Arc<dyn AuthState>) -> Self {
        Self {
            store,
            remote,
            auth,
            run_lock: Mutex::new(()),
        }
    }

    /// Push everything pending. Without an authenticated user this is a no-op.
    pub async fn run(&self) -> SyncReport {
        let _guard = self.run_lock.lock().await;
        let Some(user) = self.auth.current_user() else {
            tracing::debug!("Skipping sync: not signed in");
            return SyncReport::default();
        };

        let started = Instant::now();
        let mut report = SyncReport::default();

        let folder_map = match self.push_folders(&mut report).await {
            Ok(map) => map,
            Err(error) => {
                tracing::error!("Folder phase aborted: {}", error);
                report.errors += 1;
                FolderMap::new()
            }
        };
        if let Err(error) = self.push_snippets(&folder_map, &mut report).await {
            tracing::error!("Snippet phase aborted: {}", error);
            report.errors += 1;
        }
        // Snippets first so a folder delete never races its own contents.
        if let Err(error) = self.push_deletes::<Snippet>(&mut report).await {
            tracing::error!("Snippet deletion phase aborted: {}", error);
            report.errors += 1;
        }
        if let Err(error) = self.push_deletes::<Folder>(&mut report).await {
            tracing::error!("Folder deletion phase aborted: {}", error);
            report.errors += 1;
        }

        if let Err(error) = self.record_metadata(&user, report.changed()).await {
            tracing::warn!("Failed to record sync metadata: {}", error);
        }

        if report.is_empty() {
            tracing::debug!("Sync finished with nothing to push");
        } else {
            tracing::info!(
                "Sync finished in {:?}: {}",
                started.elapsed(),
                report
            );
        }
        report
    }

    async fn push_folders(&self, report: &mut SyncReport) -> Result<FolderMap> {
        let pending = parents_first(self.store.pending_push::<Folder>().await?);
        let mut folder_map = FolderMap::new();

        for folder in pending {
            let local_id = folder.id.clone();
            match self.push_record(folder, &folder_map).await {
                Ok(outcome) => {
                    if let PushOutcome::Created(server_id) = &outcome {
                        folder_map.insert(local_id, server_id.clone());
                    }
                    tally(report, &outcome);
                }
                Err(error) => {
                    tracing::warn!("Failed to push folder {}: {}", local_id, error);
                    report.errors += 1;
                }
            }
        }
        Ok(folder_map)
    }

    async fn push_snippets(&self, folder_map: &FolderMap, report: &mut SyncReport) -> Result<()> {
        // Listed after the folder phase so references rewritten by renames are current.
        let pending = self.store.pending_push::<Snippet>().await?;
        for snippet in pending {
            let local_id = snippet.id.clone();
            match self.push_record(snippet, folder_map).await {
                Ok(outcome) => tally(report, &outcome),
                Err(error) => {
                    tracing::warn!("Failed to push snippet {}: {}", local_id, error);
                    report.errors += 1;
                }
            }
        }
        Ok(())
    }

    /// Push one record. `Err` is a local storage failure; remote failures are
    /// reported as [`PushOutcome::Failed`].
    async fn push_record<T: Pushable>(
        &self,
        mut record: T,
        folder_map: &FolderMap,
    ) -> Result<PushOutcome> {
        // A previous run created the record remotely but never finished the rename.
        if record.needs_rename() {
            if let Some(server_id) = record.server_id().cloned() {
                let old_id = record.id().clone();
                record = self.store.reconcile_id::<T>(&old_id, &server_id).await?;
                tracing::debug!("Finished deferred rename {} -> {}", old_id, server_id);
            }
        }

        let folder_server_id = self
            .folder_server_id(record.folder_ref(), folder_map)
            .await?;
        // The reference could not be sent yet; keep the record dirty for a later run.
        let reference_dropped = record.folder_ref().is_some() && folder_server_id.is_none();
        if reference_dropped {
            tracing::debug!(
                "Pushing {} {} without its folder reference; parent not synced yet",
                T::KIND,
                record.id()
            );
        }

        let local_id = record.id().clone();
        let seen_updated_at = record.updated_at();
        let payload = record.payload(folder_server_id);

        let Some(server_id) = record.server_id().cloned() else {
            return self
                .finish_create::<T>(
                    &local_id,
                    seen_updated_at,
                    reference_dropped,
                    self.remote.create(&payload).await,
                )
                .await;
        };

        if let Err(error) = self.remote.update(&server_id, &payload).await {
            tracing::warn!("Remote update of {} {} failed: {}", T::KIND, server_id, error);
            return Ok(PushOutcome::Failed);
        }
        if reference_dropped {
            return Ok(PushOutcome::Updated);
        }
        if self.store.mark_synced::<T>(&local_id, seen_updated_at).await? {
            tracing::debug!("Updated {} {}", T::KIND, server_id);
            Ok(PushOutcome::Updated)
        } else {
            tracing::warn!(
                "{} {} changed during push; leaving it pending",
                T::KIND,
                server_id
            );
            Ok(PushOutcome::Skipped)
        }
    }

    async fn finish_create<T: Pushable>(
        &self,
        local_id: &EntityId,
        seen_updated_at: i64,
        reference_dropped: bool,
        created: std::result::Result<EntityId, RemoteError>,
    ) -> Result<PushOutcome> {
        let server_id = match created {
            Ok(server_id) => server_id,
            Err(error) => {
                tracing::warn!("Remote create of {} {} failed: {}", T::KIND, local_id, error);
                return Ok(PushOutcome::Failed);
            }
        };

        // Persist the server id before anything else so a retry updates instead of
        // creating a second remote copy.
        if self
            .store
            .assign_server_id::<T>(local_id, &server_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                "{} {} disappeared while being created as {}",
                T::KIND,
                local_id,
                server_id
            );
            return Ok(PushOutcome::Skipped);
        }
        self.store.reconcile_id::<T>(local_id, &server_id).await?;

        if reference_dropped {
            return Ok(PushOutcome::Created(server_id));
        }
        if self.store.mark_synced::<T>(&server_id, seen_updated_at).await? {
            tracing::debug!("Created {} {} as {}", T::KIND, local_id, server_id);
            Ok(PushOutcome::Created(server_id))
        } else {
            tracing::warn!(
                "{} {} changed during create; leaving it pending",
                T::KIND,
                server_id
            );
            Ok(PushOutcome::Skipped)
        }
    }

    async fn push_deletes<T: SyncEntity>(&self, report: &mut SyncReport) -> Result<()> {
        for record in self.store.pending_delete::<T>().await? {
            let Some(server_id) = record.server_id() else {
                // Created and deleted offline: the remote never saw it.
                match self.store.purge::<T>(record.id()).await {
                    Ok(_) => report.deleted += 1,
                    Err(error) => {
                        tracing::warn!("Failed to purge {} {}: {}", T::KIND, record.id(), error);
                        report.errors += 1;
                    }
                }
                continue;
            };

            match self.remote.delete(T::KIND, server_id).await {
                Ok(()) | Err(RemoteError::NotFound) => match self.store.purge::<T>(record.id()).await {
                    Ok(_) => {
                        tracing::debug!("Deleted {} {}", T::KIND, server_id);
                        report.deleted += 1;
                    }
                    Err(error) => {
                        tracing::warn!("Failed to purge {} {}: {}", T::KIND, record.id(), error);
                        report.errors += 1;
                    }
                },
                Err(error) => {
                    tracing::warn!("Remote delete of {} {} failed: {}", T::KIND, server_id, error);
                    report.errors += 1;
                }
            }
        }
        Ok(())
    }

    /// Server id for a folder reference: this run's map, then the stored folder.
    async fn folder_server_id(
        &self,
        folder_ref: Option<&EntityId>,
        folder_map: &FolderMap,
    ) -> Result<Option<EntityId>> {
        let Some(folder_ref) = folder_ref else {
            return Ok(None);
        };
        if let Some(server_id) = folder_map.get(folder_ref) {
            return Ok(Some(server_id.clone()));
        }
        self.store.folder_server_id(folder_ref).await
    }

    async fn record_metadata(&self, user: &AuthUser, changed: bool) -> Result<()> {
        let mut state = self.store.sync_state().await?;
        if state.user_id.as_deref() != Some(user.id.as_str()) || state.mode != StorageMode::Cloud {
            state.user_id = Some(user.id.clone());
            state.mode = StorageMode::Cloud;
            self.store.save_sync_state(&state).await?;
        }
        if changed {
            self.store.record_sync().await?;
        }
        Ok(())
    }
}

fn tally(report: &mut SyncReport, outcome: &PushOutcome) {
    match outcome {
        PushOutcome::Created(_) => report.created += 1,
        PushOutcome::Updated => report.updated += 1,
        PushOutcome::Skipped => report.skipped += 1,
        PushOutcome::Failed => report.errors += 1,
    }
}

/// Order pending folders so a parent is pushed before its children.
///
/// Depth counts only ancestors that are themselves pending; ties keep creation order.
fn parents_first(mut folders: Vec<Folder>) -> Vec<Folder> {
    let parents = folders
        .iter()
        .map(|folder| (folder.id.clone(), folder.parent_id.clone()))
        .collect::<HashMap<_, _>>();

    let depth = |folder: &Folder| {
        let mut depth = 0_usize;
        let mut current = folder.parent_id.as_ref();
        while let Some(parent) = current {
            // Bounded so a corrupted parent cycle cannot loop forever.
            if depth >= parents.len() {
                break;
            }
            match parents.get(parent) {
                Some(next) => {
                    depth += 1;
                    current = next.as_ref();
                }
                None => break,
            }
        }
        depth
    };

    folders.sort_by_cached_key(|folder| (depth(folder), folder.created_at, folder.id.clone()));
    folders
}
