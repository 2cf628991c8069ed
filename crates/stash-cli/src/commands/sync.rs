use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_sync(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    if !ctx.config.has_remote() {
        return Err(CliError::SyncNotConfigured);
    }
    if !ctx.is_connected() {
        return Err(CliError::Auth(
            "not signed in (or the session expired). Run `stash auth login`.".to_string(),
        ));
    }

    let report = ctx.coordinator.run().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_empty() {
        println!("Nothing to sync");
    } else {
        println!("Sync completed: {report}");
    }
    Ok(())
}
