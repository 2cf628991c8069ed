use std::path::Path;

use chrono::Utc;
use stash_core::export::{self, render_snippets_export};
use stash_core::models::ListFilters;

use crate::cli::ExportFormat;
use crate::commands::common::AppContext;
use crate::error::CliError;

impl From<ExportFormat> for export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

pub async fn run_export(
    ctx: &AppContext,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let snippets = ctx.view.list_all(&ListFilters::default()).await?;
    let rendered = render_snippets_export(
        &snippets,
        format.into(),
        Utc::now().timestamp_millis(),
    )?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
