use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stash_core::Error),
    #[error(transparent)]
    Remote(#[from] stash_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No snippet body provided")]
    EmptyBody,
    #[error("Edited snippet body cannot be empty")]
    EmptyEditedBody,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("Snippet not found for id/prefix: {0}")]
    SnippetNotFound(String),
    #[error("Folder not found for id/prefix: {0}")]
    FolderNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Sync is not configured. Set api_base_url in the config file (or STASH_API_URL) and run `stash auth login`."
    )]
    SyncNotConfigured,
}
