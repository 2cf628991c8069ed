use crate::commands::common::{
    format_timestamp, render_tags, resolve_snippet, snippet_to_list_item, AppContext,
};
use crate::error::CliError;

pub async fn run_show(ctx: &AppContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let snippet = resolve_snippet(ctx, id).await?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snippet_to_list_item(&snippet))?
        );
        return Ok(());
    }

    println!("id:      {}", snippet.id);
    if let Some(folder_id) = &snippet.folder_id {
        println!("folder:  {folder_id}");
    }
    let tags = render_tags(&snippet);
    if !tags.is_empty() {
        println!("tags:    {tags}");
    }
    println!("updated: {}", format_timestamp(snippet.updated_at));
    if !snippet.synced {
        println!("status:  pending sync");
    }
    println!();
    println!("{}", snippet.body);
    Ok(())
}
