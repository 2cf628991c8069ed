use crate::commands::common::{local_folder, local_snippet, AppContext};
use crate::error::CliError;

pub async fn run_delete(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let snippet = local_snippet(ctx, id).await?;

    if !ctx.store.delete_snippet(&snippet.id).await? {
        return Err(CliError::SnippetNotFound(id.to_string()));
    }
    ctx.record_mutation();

    println!("{}", snippet.id);
    Ok(())
}

pub async fn run_delete_folder(ctx: &AppContext, id: &str) -> Result<(), CliError> {
    let folder = local_folder(ctx, id).await?;

    if !ctx.store.delete_folder(&folder.id).await? {
        return Err(CliError::FolderNotFound(id.to_string()));
    }
    ctx.record_mutation();

    println!("{}", folder.id);
    Ok(())
}
