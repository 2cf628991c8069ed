//! Data models for Stash

mod entity;
mod filters;
mod folder;
mod id;
mod snippet;
mod sync_state;

pub use entity::{EntityKind, SyncEntity};
pub use filters::{ListFilters, SortBy, SortOrder};
pub use folder::{Folder, FolderDraft, FolderPatch};
pub use id::EntityId;
pub use snippet::{normalize_tag, normalize_tags, Snippet, SnippetDraft, SnippetPatch};
pub use sync_state::{StorageMode, SyncState};
