use serde::Serialize;
use stash_core::models::StorageMode;

use crate::commands::common::{format_timestamp, AppContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub mode: StorageMode,
    pub signed_in: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub api_base_url: Option<String>,
    pub last_sync_at: Option<i64>,
    pub pending_folders: usize,
    pub pending_snippets: usize,
    pub pending_deletions: usize,
    pub db_path: Option<String>,
}

pub async fn collect_status(ctx: &AppContext) -> Result<StatusReport, CliError> {
    let state = ctx.store.sync_state().await?;
    let pending = ctx.store.pending_counts().await?;
    let session = ctx.session.session();

    Ok(StatusReport {
        mode: state.mode,
        signed_in: session.is_some(),
        user_id: session
            .as_ref()
            .map(|session| session.user.id.clone())
            .or(state.user_id),
        email: session.and_then(|session| session.user.email),
        api_base_url: ctx.config.api_base_url.clone(),
        last_sync_at: state.last_sync_at,
        pending_folders: pending.folders,
        pending_snippets: pending.snippets,
        pending_deletions: pending.deletions,
        db_path: ctx.store.db_path().map(|path| path.display().to_string()),
    })
}

pub fn format_status_lines(status: &StatusReport) -> Vec<String> {
    let mode = match status.mode {
        StorageMode::Local => "local",
        StorageMode::Cloud => "cloud",
    };
    let account = match (&status.email, &status.user_id, status.signed_in) {
        (Some(email), _, true) => format!("signed in as {email}"),
        (None, Some(user_id), true) => format!("signed in as {user_id}"),
        (_, Some(user_id), false) => format!("signed out (last synced for {user_id})"),
        _ => "signed out".to_string(),
    };

    vec![
        format!("Mode:      {mode} ({account})"),
        format!(
            "Remote:    {}",
            status.api_base_url.as_deref().unwrap_or("(not configured)")
        ),
        format!(
            "Last sync: {}",
            status
                .last_sync_at
                .map_or_else(|| "never".to_string(), format_timestamp)
        ),
        format!(
            "Pending:   {} folders, {} snippets, {} deletions",
            status.pending_folders, status.pending_snippets, status.pending_deletions
        ),
        format!(
            "Database:  {}",
            status.db_path.as_deref().unwrap_or("(in memory)")
        ),
    ]
}

pub async fn run_status(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let status = collect_status(ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}
