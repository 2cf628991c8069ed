use stash_core::models::{EntityId, ListFilters, SortBy, SortOrder};

use crate::cli::SortKey;
use crate::commands::common::{
    format_snippet_lines, resolve_folder, snippet_to_list_item, AppContext, SnippetListItem,
};
use crate::error::CliError;

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: usize,
    pub query: Option<String>,
    pub tag: Option<String>,
    pub folder: Option<String>,
    pub sort: SortKey,
    pub ascending: bool,
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn to_filters(&self, folder_id: Option<EntityId>) -> ListFilters {
        ListFilters {
            query: self.query.clone(),
            tag: self.tag.clone(),
            folder_id,
            sort_by: match self.sort {
                SortKey::Updated => SortBy::UpdatedAt,
                SortKey::Created => SortBy::CreatedAt,
                SortKey::Title => SortBy::Title,
            },
            sort_order: if self.ascending {
                SortOrder::Asc
            } else {
                SortOrder::Desc
            },
            limit: Some(self.limit),
            cursor: self.cursor.clone(),
        }
    }
}

pub async fn run_list(ctx: &AppContext, options: &ListOptions, as_json: bool) -> Result<(), CliError> {
    let folder_id = match options.folder.as_deref() {
        Some(folder) => Some(resolve_folder(ctx, folder).await?.id),
        None => None,
    };
    let page = ctx.view.list(&options.to_filters(folder_id)).await?;

    if as_json {
        let json_items = page
            .items
            .iter()
            .map(snippet_to_list_item)
            .collect::<Vec<SnippetListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_snippet_lines(&page.items) {
            println!("{line}");
        }
    }
    if let Some(cursor) = page.next_cursor {
        eprintln!("More snippets: stash list --cursor {cursor}");
    }

    Ok(())
}
