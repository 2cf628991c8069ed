use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::Serialize;
use stash_core::auth::{AuthState, SessionHandle};
use stash_core::config::ClientConfig;
use stash_core::merge::MergeView;
use stash_core::models::{EntityId, Folder, ListFilters, Snippet};
use stash_core::remote::{DisconnectedRemote, HttpRemoteApi, RemoteApi};
use stash_core::services::LocalStore;
use stash_core::sync::{AutoSyncScheduler, SyncCoordinator};

use crate::auth::SessionStore;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 19;

/// Where the CLI keeps its files, after flag and environment overrides
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub offline: bool,
}

/// Everything a command needs: the local store, the merged read path, and the
/// push engine with its debounced trigger.
pub struct AppContext {
    pub config: ClientConfig,
    pub store: LocalStore,
    pub session: SessionHandle,
    pub view: MergeView,
    pub coordinator: Arc<SyncCoordinator>,
    scheduler: AutoSyncScheduler,
}

impl AppContext {
    pub async fn open(options: &ContextOptions) -> Result<Self, CliError> {
        let config = load_config(&options.config_path)?;
        let store = LocalStore::open_path(&options.db_path).await?;
        let (session, remote) = connect(&config, options.offline)?;
        Ok(Self::from_parts(config, store, session, remote))
    }

    pub fn from_parts(
        config: ClientConfig,
        store: LocalStore,
        session: SessionHandle,
        remote: Arc<dyn RemoteApi>,
    ) -> Self {
        let auth: Arc<dyn AuthState> = Arc::new(session.clone());
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            Arc::clone(&remote),
            Arc::clone(&auth),
        ));
        let scheduler = AutoSyncScheduler::new(
            Arc::clone(&coordinator),
            Arc::clone(&auth),
            config.auto_sync_delay(),
        );
        let view = MergeView::new(store.clone(), remote, auth).with_page_size(config.page_size);

        Self {
            config,
            store,
            session,
            view,
            coordinator,
            scheduler,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Arm auto-sync after a local write.
    pub fn record_mutation(&self) {
        self.scheduler.notify();
    }

    /// Push anything a command left pending before the process exits.
    pub async fn finish(&self) {
        if !self.scheduler.is_scheduled() {
            return;
        }
        if let Some(report) = self.scheduler.flush().await {
            if report.errors > 0 {
                tracing::warn!("Auto-sync left {} items pending: {}", report.errors, report);
            }
        }
    }
}

fn connect(
    config: &ClientConfig,
    offline: bool,
) -> Result<(SessionHandle, Arc<dyn RemoteApi>), CliError> {
    let disconnected = || -> (SessionHandle, Arc<dyn RemoteApi>) {
        (SessionHandle::default(), Arc::new(DisconnectedRemote))
    };

    if offline {
        return Ok(disconnected());
    }
    let Some(base_url) = config.api_base_url.as_deref() else {
        return Ok(disconnected());
    };
    let Some(session) = SessionStore::new(base_url)
        .load()?
        .filter(|session| !session.is_expired())
    else {
        tracing::debug!("No valid session for {}; working locally", base_url);
        return Ok(disconnected());
    };

    let remote = HttpRemoteApi::new(
        base_url,
        session.access_token.clone(),
        config.request_timeout(),
    )?;
    Ok((SessionHandle::new(Some(session)), Arc::new(remote)))
}

pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    ClientConfig::load(path)
        .and_then(ClientConfig::with_env_overrides)
        .map_err(|error| CliError::Config(format!("{}: {error}", path.display())))
}

// Identifiers

#[derive(Debug, Serialize)]
pub struct SnippetListItem {
    pub id: String,
    pub preview: String,
    pub body: String,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub pending: bool,
}

#[derive(Debug, Serialize)]
pub struct FolderListItem {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub position: i64,
    pub pending: bool,
}

/// Find a snippet by exact id (any id it has ever had) or unique id prefix.
pub async fn resolve_snippet(ctx: &AppContext, query: &str) -> Result<Snippet, CliError> {
    let query = normalize_identifier(query)?;
    match ctx.view.get(&EntityId::from(query.as_str())).await {
        Ok(Some(snippet)) => return Ok(snippet),
        Ok(None) => {}
        Err(error) => tracing::debug!("Exact lookup for {} failed: {}", query, error),
    }

    let matches = ctx
        .view
        .list_all(&ListFilters::default())
        .await?
        .into_iter()
        .filter(|snippet| snippet.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();
    pick_unique(
        matches,
        &query,
        |snippet: &Snippet| &snippet.id,
        CliError::SnippetNotFound,
    )
}

/// Like [`resolve_snippet`], keeping a local copy so the snippet can be changed.
pub async fn local_snippet(ctx: &AppContext, query: &str) -> Result<Snippet, CliError> {
    let snippet = resolve_snippet(ctx, query).await?;
    Ok(ctx.store.adopt_remote(snippet).await?)
}

pub async fn resolve_folder(ctx: &AppContext, query: &str) -> Result<Folder, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(folder) = ctx.store.get_folder(&EntityId::from(query.as_str())).await? {
        return Ok(folder);
    }

    let matches = ctx
        .view
        .list_folders()
        .await?
        .into_iter()
        .filter(|folder| folder.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();
    pick_unique(
        matches,
        &query,
        |folder: &Folder| &folder.id,
        CliError::FolderNotFound,
    )
}

/// Like [`resolve_folder`], keeping a local copy so the folder can be referenced.
pub async fn local_folder(ctx: &AppContext, query: &str) -> Result<Folder, CliError> {
    let folder = resolve_folder(ctx, query).await?;
    Ok(ctx.store.adopt_remote(folder).await?)
}

pub fn pick_unique<T>(
    mut matches: Vec<T>,
    query: &str,
    id_of: impl Fn(&T) -> &EntityId,
    not_found: fn(String) -> CliError,
) -> Result<T, CliError> {
    match matches.len() {
        0 => Err(not_found(query.to_string())),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|item| short_id(id_of(item)))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &EntityId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

// Rendering

pub fn format_snippet_lines(snippets: &[Snippet]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    snippets
        .iter()
        .map(|snippet| {
            let marker = if snippet.synced { ' ' } else { '*' };
            let short_id = short_id(&snippet.id);
            let preview = snippet_preview(snippet, 40);
            let relative_time = format_relative_time(snippet.updated_at, now_ms);
            let tags = render_tags(snippet);

            if tags.is_empty() {
                format!("{marker}{short_id:<SHORT_ID_LEN$}  {preview:<40}  {relative_time}")
            } else {
                format!(
                    "{marker}{short_id:<SHORT_ID_LEN$}  {preview:<40}  {relative_time:<10}  {tags}"
                )
            }
        })
        .collect()
}

pub fn snippet_to_list_item(snippet: &Snippet) -> SnippetListItem {
    let now_ms = Utc::now().timestamp_millis();
    SnippetListItem {
        id: snippet.id.to_string(),
        preview: snippet_preview(snippet, 80),
        body: snippet.body.clone(),
        tags: snippet.tags.iter().cloned().collect(),
        folder_id: snippet.folder_id.as_ref().map(ToString::to_string),
        created_at: snippet.created_at,
        updated_at: snippet.updated_at,
        relative_time: format_relative_time(snippet.updated_at, now_ms),
        pending: !snippet.synced,
    }
}

pub fn folder_to_list_item(folder: &Folder) -> FolderListItem {
    FolderListItem {
        id: folder.id.to_string(),
        name: folder.name.clone(),
        parent_id: folder.parent_id.as_ref().map(ToString::to_string),
        color: folder.color.clone(),
        icon: folder.icon.clone(),
        position: folder.position,
        pending: !folder.synced,
    }
}

/// Folders as an indented tree; folders whose parent is not listed start a new root.
pub fn format_folder_lines(folders: &[Folder]) -> Vec<String> {
    fn visit(
        folders: &[Folder],
        parent: Option<&EntityId>,
        depth: usize,
        seen: &mut Vec<EntityId>,
        lines: &mut Vec<String>,
    ) {
        for folder in folders {
            let is_child = match parent {
                Some(parent) => folder.parent_id.as_ref() == Some(parent),
                None => folder
                    .parent_id
                    .as_ref()
                    .map_or(true, |parent_id| !folders.iter().any(|f| &f.id == parent_id)),
            };
            if !is_child || seen.contains(&folder.id) {
                continue;
            }
            seen.push(folder.id.clone());

            let marker = if folder.synced { ' ' } else { '*' };
            let short_id = short_id(&folder.id);
            let indent = "  ".repeat(depth);
            lines.push(format!(
                "{marker}{short_id:<SHORT_ID_LEN$}  {indent}{}",
                folder.name
            ));
            visit(folders, Some(&folder.id), depth + 1, seen, lines);
        }
    }

    let mut lines = Vec::new();
    visit(folders, None, 0, &mut Vec::new(), &mut lines);
    lines
}

pub fn snippet_preview(snippet: &Snippet, max_chars: usize) -> String {
    let first_line = snippet.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(snippet: &Snippet) -> String {
    snippet
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

// Input

pub fn resolve_body(parts: &[String]) -> Result<String, CliError> {
    if let Some(body) = normalize_body(&parts.join(" ")) {
        return Ok(body);
    }

    if let Some(body) = read_piped_stdin()? {
        return Ok(body);
    }

    if let Some(body) = capture_editor_input_with_initial("")? {
        return Ok(body);
    }

    Err(CliError::EmptyBody)
}

pub fn normalize_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_body(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_body: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_snippet_file_path();
    std::fs::write(&temp_file, initial_body)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let body = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_body(&body))
}

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        // `EDITOR="code --wait"` style values carry arguments
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_snippet_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("stash-snippet-{}-{now}.md", std::process::id()))
}

// Paths

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("STASH_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("stash").join("stash.db"))
        .ok_or_else(|| CliError::Config("could not resolve a data directory; pass --db-path".into()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) =
        cli_config_path.or_else(|| env::var_os("STASH_CONFIG").map(PathBuf::from))
    {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("stash").join("config.json"))
        .ok_or_else(|| {
            CliError::Config("could not resolve a config directory; pass --config".into())
        })
}
