use stash_core::models::SnippetPatch;

use crate::commands::common::{
    capture_editor_input_with_initial, local_folder, local_snippet, AppContext,
};
use crate::error::CliError;

/// Changes requested on the command line besides the body
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub tags: Option<Vec<String>>,
    pub folder: Option<String>,
    pub no_folder: bool,
}

impl EditOptions {
    /// Without metadata flags the body is edited in `$EDITOR`.
    const fn edits_body(&self) -> bool {
        self.tags.is_none() && self.folder.is_none() && !self.no_folder
    }
}

pub async fn run_edit(ctx: &AppContext, id: &str, options: EditOptions) -> Result<(), CliError> {
    let snippet = local_snippet(ctx, id).await?;

    let body = if options.edits_body() {
        let Some(edited) = capture_editor_input_with_initial(&snippet.body)? else {
            return Err(CliError::EmptyEditedBody);
        };
        (edited != snippet.body).then_some(edited)
    } else {
        None
    };
    let folder_id = if options.no_folder {
        Some(None)
    } else if let Some(folder) = options.folder.as_deref() {
        Some(Some(local_folder(ctx, folder).await?.id))
    } else {
        None
    };

    let patch = SnippetPatch {
        body,
        tags: options.tags,
        folder_id,
    };
    if patch == SnippetPatch::default() {
        println!("{}", snippet.id);
        return Ok(());
    }

    let updated = ctx
        .store
        .update_snippet(&snippet.id, patch)
        .await?
        .ok_or_else(|| CliError::SnippetNotFound(id.to_string()))?;
    ctx.record_mutation();

    println!("{}", updated.id);
    Ok(())
}
