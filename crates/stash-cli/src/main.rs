//! Stash CLI - keep text snippets from the terminal
//!
//! Every command works offline against the local store. When a remote is
//! configured and a session is stored, local changes are pushed before exit.

mod auth;
mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{resolve_config_path, resolve_db_path, AppContext, ContextOptions};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, EditOptions};
use crate::commands::export::run_export;
use crate::commands::folder::run_folder;
use crate::commands::import::run_import;
use crate::commands::list::{run_list, ListOptions};
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "stash=info"
        .parse::<Directive>()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let Cli {
        command,
        db_path,
        config,
        offline,
        snippet,
    } = Cli::parse();
    let config_path = resolve_config_path(config)?;

    // Commands that never touch the local store
    let command = match command {
        Some(Commands::Completions { shell, output }) => {
            return run_completions(shell, output.as_deref());
        }
        Some(Commands::Auth { command }) => return run_auth(command, &config_path),
        None if snippet.is_empty() => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
            return Ok(());
        }
        command => command,
    };

    let options = ContextOptions {
        db_path: resolve_db_path(db_path)?,
        config_path,
        offline,
    };
    let ctx = AppContext::open(&options).await?;
    let result = dispatch(&ctx, command, &snippet).await;
    ctx.finish().await;
    result
}

async fn dispatch(
    ctx: &AppContext,
    command: Option<Commands>,
    quick_capture: &[String],
) -> Result<(), CliError> {
    let Some(command) = command else {
        // Quick capture mode: stash "my snippet"
        return run_add(ctx, quick_capture, Vec::new(), None).await;
    };

    match command {
        Commands::Add { body, tags, folder } => {
            run_add(ctx, &body, tags, folder.as_deref()).await?;
        }
        Commands::List {
            limit,
            query,
            tag,
            folder,
            sort,
            asc,
            cursor,
            json,
        } => {
            let options = ListOptions {
                limit,
                query,
                tag,
                folder,
                sort,
                ascending: asc,
                cursor,
            };
            run_list(ctx, &options, json).await?;
        }
        Commands::Show { id, json } => run_show(ctx, &id, json).await?,
        Commands::Edit {
            id,
            tags,
            folder,
            no_folder,
        } => {
            let options = EditOptions {
                tags,
                folder,
                no_folder,
            };
            run_edit(ctx, &id, options).await?;
        }
        Commands::Delete { id } => run_delete(ctx, &id).await?,
        Commands::Folder { command } => run_folder(ctx, command).await?,
        Commands::Sync { json } => run_sync(ctx, json).await?,
        Commands::Export { format, output } => run_export(ctx, format, output.as_deref()).await?,
        Commands::Import { path } => run_import(ctx, &path).await?,
        Commands::Status { json } => run_status(ctx, json).await?,
        // Handled before the store is opened
        Commands::Completions { .. } | Commands::Auth { .. } => {}
    }

    Ok(())
}
