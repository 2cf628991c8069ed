use std::path::Path;

use stash_core::export::{import_document, parse_import_document};

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_import(ctx: &AppContext, path: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;
    let document = parse_import_document(&raw)?;
    let imported = import_document(&ctx.store, document).await?;
    if imported > 0 {
        ctx.record_mutation();
    }

    println!("Imported {imported} snippets");
    Ok(())
}
