//! Shared sync bookkeeping for folders and snippets

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::Result;

/// The two record kinds kept in the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Folder,
    Snippet,
}

impl EntityKind {
    /// Singular name used in logs, error messages, and reverse-map keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Snippet => "snippet",
        }
    }

    /// Storage namespace holding records of this kind
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Folder => "folders",
            Self::Snippet => "snippets",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record kind the local store persists and the coordinator pushes.
///
/// Both kinds carry the same bookkeeping (`id`, `server_id`, timestamps, `synced`,
/// `deleted`) plus at most one reference to a folder by local id.
pub trait SyncEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Input for `EntityStore::create`
    type Draft;
    /// Partial update for `EntityStore::update`
    type Patch;

    const KIND: EntityKind;

    /// Build a fresh, dirty record from a draft.
    fn from_draft(id: EntityId, draft: Self::Draft, now: i64) -> Result<Self>;

    /// Apply a partial update to the domain fields.
    fn apply_patch(&mut self, patch: Self::Patch) -> Result<()>;

    fn id(&self) -> &EntityId;
    fn set_id(&mut self, id: EntityId);
    fn server_id(&self) -> Option<&EntityId>;
    fn set_server_id(&mut self, server_id: EntityId);
    fn created_at(&self) -> i64;
    fn updated_at(&self) -> i64;
    fn is_synced(&self) -> bool;
    fn set_synced(&mut self, synced: bool);
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);

    /// Local id of the referenced folder (a folder's parent, a snippet's folder)
    fn folder_ref(&self) -> Option<&EntityId>;
    fn set_folder_ref(&mut self, folder: Option<EntityId>);

    /// Mark the record dirty with a new modification time.
    fn touch(&mut self, now: i64);

    /// Local mutation not yet confirmed remotely
    fn is_pending(&self) -> bool {
        !self.is_synced()
    }

    /// Whether the local id still differs from the assigned server id
    fn needs_rename(&self) -> bool {
        self.server_id().is_some_and(|server_id| server_id != self.id())
    }
}
