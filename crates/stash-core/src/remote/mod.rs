//! Remote API seam consumed by the merge view and the sync coordinator.
//!
//! The transport is an external collaborator; [`HttpRemoteApi`] is the REST client
//! the CLI uses, and tests substitute an in-memory remote.

mod http;
#[cfg(test)]
pub(crate) mod mock;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntityId, EntityKind, Folder, ListFilters, Snippet};

pub use http::HttpRemoteApi;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote record not found")]
    NotFound,
    #[error("Remote validation failed: {0}")]
    Validation(String),
    #[error("Not authorized")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Domain fields sent for a snippet create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetPayload {
    pub body: String,
    pub tags: Vec<String>,
    pub folder_id: Option<EntityId>,
}

/// Domain fields sent for a folder create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderPayload {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<EntityId>,
    pub position: i64,
}

/// Body of a create or update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPayload {
    Snippet(SnippetPayload),
    Folder(FolderPayload),
}

impl EntityPayload {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Snippet(_) => EntityKind::Snippet,
            Self::Folder(_) => EntityKind::Folder,
        }
    }

    /// Referenced folder server id (a folder's parent, a snippet's folder)
    #[must_use]
    pub const fn folder_ref(&self) -> Option<&EntityId> {
        match self {
            Self::Snippet(payload) => payload.folder_id.as_ref(),
            Self::Folder(payload) => payload.parent_id.as_ref(),
        }
    }
}

/// Snippet as returned by the server; ids are server ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnippet {
    pub id: EntityId,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<EntityId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteSnippet {
    /// Convert to a local-shaped record; a confirmed server copy is always synced.
    #[must_use]
    pub fn into_snippet(self) -> Snippet {
        Snippet {
            id: self.id.clone(),
            server_id: Some(self.id),
            body: self.body,
            tags: self
                .tags
                .iter()
                .filter_map(|tag| crate::models::normalize_tag(tag))
                .collect::<BTreeSet<_>>(),
            folder_id: self.folder_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced: true,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFolder {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(default)]
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteFolder {
    #[must_use]
    pub fn into_folder(self) -> Folder {
        Folder {
            id: self.id.clone(),
            server_id: Some(self.id),
            name: self.name,
            color: self.color,
            icon: self.icon,
            parent_id: self.parent_id,
            position: self.position,
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced: true,
            deleted: false,
        }
    }
}

/// Filters forwarded to the remote `list` verb
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteQuery {
    pub query: Option<String>,
    pub tag: Option<String>,
    /// Server id of the folder to list
    pub folder_id: Option<EntityId>,
    pub sort_by: crate::models::SortBy,
    pub sort_order: crate::models::SortOrder,
    pub limit: usize,
    pub cursor: Option<String>,
}

impl RemoteQuery {
    /// Build from list filters; `folder_id` must already be a server id.
    ///
    /// Starts at the first remote row. Paging callers set `cursor` themselves,
    /// since a listing cursor is not a remote cursor.
    #[must_use]
    pub fn from_filters(filters: &ListFilters, folder_id: Option<EntityId>, limit: usize) -> Self {
        Self {
            query: filters.query.clone(),
            tag: filters.tag.clone(),
            folder_id,
            sort_by: filters.sort_by,
            sort_order: filters.sort_order,
            limit,
            cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// The remote store's CRUD surface
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create a record; returns the server-assigned id
    async fn create(&self, payload: &EntityPayload) -> RemoteResult<EntityId>;

    /// Replace the domain fields of an existing record
    async fn update(&self, id: &EntityId, payload: &EntityPayload) -> RemoteResult<()>;

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> RemoteResult<()>;

    async fn list_snippets(&self, query: &RemoteQuery) -> RemoteResult<RemotePage<RemoteSnippet>>;

    async fn list_folders(&self) -> RemoteResult<Vec<RemoteFolder>>;

    /// Fetch one snippet; a missing record is [`RemoteError::NotFound`]
    async fn get_snippet(&self, id: &EntityId) -> RemoteResult<RemoteSnippet>;
}

/// Stand-in for clients with no remote configured; every call fails as a network error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedRemote;

impl DisconnectedRemote {
    fn unavailable() -> RemoteError {
        RemoteError::Network("no remote configured".to_string())
    }
}

#[async_trait]
impl RemoteApi for DisconnectedRemote {
    async fn create(&self, _payload: &EntityPayload) -> RemoteResult<EntityId> {
        Err(Self::unavailable())
    }

    async fn update(&self, _id: &EntityId, _payload: &EntityPayload) -> RemoteResult<()> {
        Err(Self::unavailable())
    }

    async fn delete(&self, _kind: EntityKind, _id: &EntityId) -> RemoteResult<()> {
        Err(Self::unavailable())
    }

    async fn list_snippets(&self, _query: &RemoteQuery) -> RemoteResult<RemotePage<RemoteSnippet>> {
        Err(Self::unavailable())
    }

    async fn list_folders(&self) -> RemoteResult<Vec<RemoteFolder>> {
        Err(Self::unavailable())
    }

    async fn get_snippet(&self, _id: &EntityId) -> RemoteResult<RemoteSnippet> {
        Err(Self::unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_snippet_converts_to_synced_record() {
        let remote = RemoteSnippet {
            id: EntityId::from("srv-1"),
            body: "hello".to_string(),
            tags: vec!["Rust".to_string(), "bad tag".to_string()],
            folder_id: Some(EntityId::from("srv-f")),
            created_at: 1,
            updated_at: 2,
        };
        let snippet = remote.into_snippet();
        assert_eq!(snippet.id, EntityId::from("srv-1"));
        assert_eq!(snippet.server_id, Some(EntityId::from("srv-1")));
        assert!(snippet.synced);
        assert_eq!(snippet.tags.iter().collect::<Vec<_>>(), vec!["rust"]);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = SnippetPayload {
            body: "b".to_string(),
            tags: vec![],
            folder_id: Some(EntityId::from("f")),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["folderId"], "f");
    }

    #[tokio::test]
    async fn disconnected_remote_reports_network_errors() {
        let remote = DisconnectedRemote;
        assert!(matches!(
            remote.list_folders().await,
            Err(RemoteError::Network(_))
        ));
        assert!(matches!(
            remote.delete(EntityKind::Snippet, &EntityId::from("x")).await,
            Err(RemoteError::Network(_))
        ));
    }

    #[test]
    fn page_defaults_missing_cursor() {
        let page: RemotePage<RemoteFolder> = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(page.next_cursor.is_none());
    }
}
