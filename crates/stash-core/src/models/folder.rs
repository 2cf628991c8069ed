//! Folder model

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind, SyncEntity};
use crate::{Error, Result};

/// A folder organizing snippets; folders may nest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Current local identifier (equals `server_id` once synced)
    pub id: EntityId,
    /// Canonical remote identifier, set once created remotely
    #[serde(default)]
    pub server_id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Parent folder (local id)
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    /// Ordering among siblings
    #[serde(default)]
    pub position: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    pub synced: bool,
    pub deleted: bool,
}

/// Fields for a new folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDraft {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<EntityId>,
    pub position: i64,
}

impl FolderDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: EntityId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub color: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub parent_id: Option<Option<EntityId>>,
    pub position: Option<i64>,
}

fn normalize_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("folder name cannot be empty".into()));
    }
    Ok(name.to_string())
}

impl SyncEntity for Folder {
    type Draft = FolderDraft;
    type Patch = FolderPatch;

    const KIND: EntityKind = EntityKind::Folder;

    fn from_draft(id: EntityId, draft: FolderDraft, now: i64) -> Result<Self> {
        Ok(Self {
            id,
            server_id: None,
            name: normalize_name(&draft.name)?,
            color: draft.color,
            icon: draft.icon,
            parent_id: draft.parent_id,
            position: draft.position,
            created_at: now,
            updated_at: now,
            synced: false,
            deleted: false,
        })
    }

    fn apply_patch(&mut self, patch: FolderPatch) -> Result<()> {
        let name = patch.name.as_deref().map(normalize_name).transpose()?;
        if let Some(Some(parent_id)) = &patch.parent_id {
            if parent_id == &self.id {
                return Err(Error::InvalidInput(
                    "folder cannot be its own parent".into(),
                ));
            }
        }
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        Ok(())
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn server_id(&self) -> Option<&EntityId> {
        self.server_id.as_ref()
    }

    fn set_server_id(&mut self, server_id: EntityId) {
        self.server_id = Some(server_id);
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_synced(&self) -> bool {
        self.synced
    }

    fn set_synced(&mut self, synced: bool) {
        self.synced = synced;
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn folder_ref(&self) -> Option<&EntityId> {
        self.parent_id.as_ref()
    }

    fn set_folder_ref(&mut self, folder: Option<EntityId>) {
        self.parent_id = folder;
    }

    fn touch(&mut self, now: i64) {
        self.updated_at = now;
        self.synced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_draft_trims_name() {
        let folder =
            Folder::from_draft(EntityId::new_local(), FolderDraft::new("  Work  "), 10).unwrap();
        assert_eq!(folder.name, "Work");
        assert!(!folder.synced);
    }

    #[test]
    fn from_draft_rejects_blank_name() {
        assert!(Folder::from_draft(EntityId::new_local(), FolderDraft::new("  "), 10).is_err());
    }

    #[test]
    fn apply_patch_rejects_self_parent() {
        let mut folder =
            Folder::from_draft(EntityId::from("f1"), FolderDraft::new("Work"), 10).unwrap();
        let result = folder.apply_patch(FolderPatch {
            parent_id: Some(Some(EntityId::from("f1"))),
            ..FolderPatch::default()
        });
        assert!(result.is_err());
        assert!(folder.parent_id.is_none());
    }

    #[test]
    fn apply_patch_updates_presentation_fields() {
        let mut folder =
            Folder::from_draft(EntityId::new_local(), FolderDraft::new("Work"), 10).unwrap();
        folder
            .apply_patch(FolderPatch {
                color: Some(Some("#ff0000".to_string())),
                icon: Some(Some("briefcase".to_string())),
                position: Some(3),
                ..FolderPatch::default()
            })
            .unwrap();
        assert_eq!(folder.color.as_deref(), Some("#ff0000"));
        assert_eq!(folder.icon.as_deref(), Some("briefcase"));
        assert_eq!(folder.position, 3);
    }
}
