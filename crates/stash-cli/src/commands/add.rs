use stash_core::models::SnippetDraft;

use crate::commands::common::{local_folder, resolve_body, AppContext};
use crate::error::CliError;

pub async fn run_add(
    ctx: &AppContext,
    body_parts: &[String],
    tags: Vec<String>,
    folder: Option<&str>,
) -> Result<(), CliError> {
    let body = resolve_body(body_parts)?;

    let mut draft = SnippetDraft::new(body).with_tags(tags);
    if let Some(folder) = folder {
        draft = draft.in_folder(local_folder(ctx, folder).await?.id);
    }

    let snippet = ctx.store.create_snippet(draft).await?;
    ctx.record_mutation();

    println!("{}", snippet.id);
    Ok(())
}
