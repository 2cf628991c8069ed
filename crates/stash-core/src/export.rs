//! Snippet import and export shared by all clients.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{normalize_tag, EntityId, Snippet, SnippetDraft};
use crate::services::LocalStore;
use crate::{Error, Result};

/// Version written into every export document
pub const EXPORT_VERSION: u32 = 1;

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Domain fields of one snippet; sync bookkeeping is never exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnippet {
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<EntityId>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: i64,
    pub snippets: Vec<ExportSnippet>,
}

/// Convert a snippet into an export record (tags are already sorted).
#[must_use]
pub fn snippet_to_export_item(snippet: &Snippet) -> ExportSnippet {
    ExportSnippet {
        body: snippet.body.clone(),
        tags: snippet.tags.iter().cloned().collect(),
        folder_id: snippet.folder_id.clone(),
        created_at: snippet.created_at,
        updated_at: snippet.updated_at,
    }
}

#[must_use]
pub fn build_export_document(snippets: &[Snippet], exported_at: i64) -> ExportDocument {
    ExportDocument {
        version: EXPORT_VERSION,
        exported_at,
        snippets: snippets.iter().map(snippet_to_export_item).collect(),
    }
}

/// Render snippets as a pretty-printed JSON export document.
pub fn render_json_export(snippets: &[Snippet], exported_at: i64) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&build_export_document(snippets, exported_at))
}

/// Render snippets in Markdown with frontmatter blocks.
#[must_use]
pub fn render_markdown_export(snippets: &[Snippet]) -> String {
    let mut output = String::new();

    for (index, snippet) in snippets.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let item = snippet_to_export_item(snippet);
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "created_at: {}", item.created_at);
        let _ = writeln!(output, "updated_at: {}", item.updated_at);
        if let Some(folder_id) = &item.folder_id {
            let _ = writeln!(output, "folder: {folder_id}");
        }
        let _ = writeln!(output, "tags:");
        for tag in item.tags {
            let _ = writeln!(output, "  - {tag}");
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        output.push_str(&item.body);
        output.push('\n');
    }

    output
}

/// Render snippets based on selected export format.
pub fn render_snippets_export(
    snippets: &[Snippet],
    format: ExportFormat,
    exported_at: i64,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(snippets, exported_at),
        ExportFormat::Markdown => Ok(render_markdown_export(snippets)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("stash-export-{timestamp_ms}.{}", format.extension())
}

/// Parse a JSON export document, rejecting versions this build cannot read.
pub fn parse_import_document(raw: &str) -> Result<ExportDocument> {
    let document: ExportDocument = serde_json::from_str(raw)?;
    if document.version != EXPORT_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported export version {} (expected {EXPORT_VERSION})",
            document.version
        )));
    }
    Ok(document)
}

/// Re-create every entry as a fresh local snippet; returns how many were imported.
///
/// Source ids and sync state are never carried over. Malformed tags are dropped,
/// as are folder references that do not name a live local folder.
pub async fn import_document(store: &LocalStore, document: ExportDocument) -> Result<usize> {
    let mut imported = 0;
    for item in document.snippets {
        let folder_id = match item.folder_id {
            Some(folder_id) => {
                let folder = store.get_folder(&folder_id).await?;
                if folder.is_none() {
                    tracing::debug!("Dropping unknown folder {} from imported snippet", folder_id);
                }
                folder.map(|folder| folder.id)
            }
            None => None,
        };

        let mut draft = SnippetDraft::new(item.body)
            .with_tags(item.tags.iter().filter_map(|tag| normalize_tag(tag)));
        draft.folder_id = folder_id;
        store.create_snippet(draft).await?;
        imported += 1;
    }

    tracing::info!("Imported {} snippets", imported);
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FolderDraft, SyncEntity};
    use pretty_assertions::assert_eq;

    fn snippet(body: &str, tags: &[&str]) -> Snippet {
        let mut snippet = Snippet::from_draft(
            EntityId::from("srv-1"),
            SnippetDraft::new(body).with_tags(tags.iter().copied()),
            123,
        )
        .unwrap();
        snippet.updated_at = 456;
        snippet.server_id = Some(EntityId::from("srv-1"));
        snippet.synced = true;
        snippet
    }

    #[test]
    fn export_document_carries_domain_fields_only() {
        let rendered = render_json_export(&[snippet("hello", &["zeta", "alpha"])], 999).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], 999);
        let entry = &value["snippets"][0];
        assert_eq!(entry["body"], "hello");
        assert_eq!(entry["tags"], serde_json::json!(["alpha", "zeta"]));
        assert_eq!(entry["createdAt"], 123);
        assert!(entry.get("id").is_none());
        assert!(entry.get("synced").is_none());
        assert!(entry.get("folderId").is_none());
    }

    #[test]
    fn render_markdown_export_includes_frontmatter_and_body() {
        let mut item = snippet("Hello export", &["tag"]);
        item.folder_id = Some(EntityId::from("srv-f"));

        let rendered = render_markdown_export(&[item]);
        assert!(rendered.contains("created_at: 123"));
        assert!(rendered.contains("updated_at: 456"));
        assert!(rendered.contains("folder: srv-f"));
        assert!(rendered.contains("tags:\n  - tag"));
        assert!(rendered.ends_with("Hello export\n"));
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "stash-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "stash-export-456.md"
        );
    }

    #[test]
    fn parse_rejects_unknown_version() {
        let raw = r#"{"version": 2, "exportedAt": 1, "snippets": []}"#;
        assert!(matches!(
            parse_import_document(raw),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_import_document("{"),
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn import_creates_fresh_pending_records() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let folder = store.create_folder(FolderDraft::new("Keep")).await.unwrap();

        let raw = format!(
            r#"{{
                "version": 1,
                "exportedAt": 10,
                "snippets": [
                    {{"body": "one", "tags": ["Rust", "bad tag"], "folderId": "{}", "createdAt": 1, "updatedAt": 2}},
                    {{"body": "two", "folderId": "srv-unknown", "createdAt": 3, "updatedAt": 4}}
                ]
            }}"#,
            folder.id
        );
        let document = parse_import_document(&raw).unwrap();
        assert_eq!(import_document(&store, document).await.unwrap(), 2);

        let mut imported = store.list_snippets().await.unwrap();
        imported.sort_by(|a, b| a.body.cmp(&b.body));
        assert_eq!(imported.len(), 2);

        let one = &imported[0];
        assert!(one.id.is_local());
        assert!(one.is_pending());
        assert!(one.server_id.is_none());
        assert_eq!(one.tags.iter().collect::<Vec<_>>(), vec!["rust"]);
        assert_eq!(one.folder_id.as_ref(), Some(&folder.id));
        assert!(one.created_at > 1);

        assert!(imported[1].folder_id.is_none());
        assert_eq!(store.pending_counts().await.unwrap().snippets, 2);
    }
}
