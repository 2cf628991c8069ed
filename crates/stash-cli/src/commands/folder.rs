use stash_core::models::{FolderDraft, FolderPatch};

use crate::cli::FolderCommands;
use crate::commands::common::{
    folder_to_list_item, format_folder_lines, local_folder, AppContext, FolderListItem,
};
use crate::commands::delete::run_delete_folder;
use crate::error::CliError;

pub async fn run_folder(ctx: &AppContext, command: FolderCommands) -> Result<(), CliError> {
    match command {
        FolderCommands::Add {
            name,
            parent,
            color,
            icon,
            position,
        } => {
            let parent_id = match parent.as_deref() {
                Some(parent) => Some(local_folder(ctx, parent).await?.id),
                None => None,
            };
            let folder = ctx
                .store
                .create_folder(FolderDraft {
                    name,
                    color,
                    icon,
                    parent_id,
                    position,
                })
                .await?;
            ctx.record_mutation();
            println!("{}", folder.id);
        }
        FolderCommands::List { json } => {
            let folders = ctx.view.list_folders().await?;
            if json {
                let json_items = folders
                    .iter()
                    .map(folder_to_list_item)
                    .collect::<Vec<FolderListItem>>();
                println!("{}", serde_json::to_string_pretty(&json_items)?);
            } else if folders.is_empty() {
                println!("No folders yet.");
            } else {
                for line in format_folder_lines(&folders) {
                    println!("{line}");
                }
            }
        }
        FolderCommands::Edit {
            id,
            name,
            parent,
            root,
            position,
        } => {
            let folder = local_folder(ctx, &id).await?;
            let parent_id = if root {
                Some(None)
            } else if let Some(parent) = parent.as_deref() {
                Some(Some(local_folder(ctx, parent).await?.id))
            } else {
                None
            };

            let patch = FolderPatch {
                name,
                parent_id,
                position,
                ..FolderPatch::default()
            };
            if patch == FolderPatch::default() {
                println!("{}", folder.id);
                return Ok(());
            }

            let updated = ctx
                .store
                .update_folder(&folder.id, patch)
                .await?
                .ok_or_else(|| CliError::FolderNotFound(id.clone()))?;
            ctx.record_mutation();
            println!("{}", updated.id);
        }
        FolderCommands::Delete { id } => run_delete_folder(ctx, &id).await?,
    }

    Ok(())
}
