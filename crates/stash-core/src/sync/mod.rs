//! Push engine and its debounced trigger.
//!
//! [`SyncCoordinator`] drains pending folders, then pending snippets, then
//! tombstones, reconciling local ids with server ids as creates succeed.
//! [`AutoSyncScheduler`] coalesces bursts of local mutations into one run.

mod coordinator;
mod scheduler;

use std::fmt;

use serde::Serialize;

use crate::models::{EntityId, Folder, Snippet, SyncEntity};
use crate::remote::{EntityPayload, FolderPayload, SnippetPayload};

pub use coordinator::SyncCoordinator;
pub use scheduler::{AutoSyncScheduler, DEFAULT_AUTO_SYNC_DELAY};

/// Aggregate outcome of one coordinator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Pushes discarded because the record changed while the call was in flight
    pub skipped: usize,
    pub errors: usize,
}

impl SyncReport {
    /// Nothing was attempted
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.created + self.updated + self.deleted + self.skipped + self.errors == 0
    }

    /// At least one item reached the remote store or was purged
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, updated {}, deleted {}, skipped {}, errors {}",
            self.created, self.updated, self.deleted, self.skipped, self.errors
        )
    }
}

/// A record kind the coordinator can send to the remote store
pub(crate) trait Pushable: SyncEntity {
    /// Remote body, with the folder reference already mapped to a server id
    fn payload(&self, folder_server_id: Option<EntityId>) -> EntityPayload;
}

impl Pushable for Snippet {
    fn payload(&self, folder_server_id: Option<EntityId>) -> EntityPayload {
        EntityPayload::Snippet(SnippetPayload {
            body: self.body.clone(),
            tags: self.tags.iter().cloned().collect(),
            folder_id: folder_server_id,
        })
    }
}

impl Pushable for Folder {
    fn payload(&self, folder_server_id: Option<EntityId>) -> EntityPayload {
        EntityPayload::Folder(FolderPayload {
            name: self.name.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
            parent_id: folder_server_id,
            position: self.position,
        })
    }
}
