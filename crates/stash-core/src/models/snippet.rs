//! Snippet model

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind, SyncEntity};
use crate::{Error, Result};

const MAX_TAG_LEN: usize = 32;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("Invalid regex"));

/// A text snippet in the user's collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Current local identifier (equals `server_id` once synced)
    pub id: EntityId,
    /// Canonical remote identifier, set once created remotely
    #[serde(default)]
    pub server_id: Option<EntityId>,
    /// Snippet text
    pub body: String,
    /// Normalized tag set
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Owning folder (local id)
    #[serde(default)]
    pub folder_id: Option<EntityId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Durably accepted by the remote store
    pub synced: bool,
    /// Soft delete flag for sync
    pub deleted: bool,
}

/// Fields for a new snippet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetDraft {
    pub body: String,
    pub tags: Vec<String>,
    pub folder_id: Option<EntityId>,
}

impl SnippetDraft {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn in_folder(mut self, folder_id: EntityId) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

/// Partial update; `None` leaves a field unchanged.
///
/// `folder_id: Some(None)` moves the snippet out of its folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetPatch {
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<Option<EntityId>>,
}

impl Snippet {
    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.body
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }

    /// Check if snippet body is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

impl SyncEntity for Snippet {
    type Draft = SnippetDraft;
    type Patch = SnippetPatch;

    const KIND: EntityKind = EntityKind::Snippet;

    fn from_draft(id: EntityId, draft: SnippetDraft, now: i64) -> Result<Self> {
        Ok(Self {
            id,
            server_id: None,
            body: draft.body,
            tags: normalize_tags(&draft.tags)?,
            folder_id: draft.folder_id,
            created_at: now,
            updated_at: now,
            synced: false,
            deleted: false,
        })
    }

    fn apply_patch(&mut self, patch: SnippetPatch) -> Result<()> {
        // Validate before touching any field so a bad tag leaves the record intact.
        let tags = patch.tags.as_deref().map(normalize_tags).transpose()?;
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(folder_id) = patch.folder_id {
            self.folder_id = folder_id;
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
        self.folder_id.as_ref()
    }

    fn set_folder_ref(&mut self, folder: Option<EntityId>) {
        self.folder_id = folder;
    }

    fn touch(&mut self, now: i64) {
        self.updated_at = now;
        self.synced = false;
    }
}

/// Normalize a single tag: trim, strip a leading `#`, lowercase.
///
/// Returns `None` for empty or malformed tags.
#[must_use]
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN || !TAG_PATTERN.is_match(&tag) {
        None
    } else {
        Some(tag)
    }
}

/// Normalize a list of tags into a deduplicated set.
///
/// Blank entries are dropped; malformed ones are rejected.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Result<BTreeSet<String>> {
    let mut tags = BTreeSet::new();
    for value in raw {
        let value = value.as_ref();
        if value.trim().trim_start_matches('#').is_empty() {
            continue;
        }
        let tag = normalize_tag(value)
            .ok_or_else(|| Error::InvalidInput(format!("invalid tag '{}'", value.trim())))?;
        tags.insert(tag);
    }
    Ok(tags)
}
