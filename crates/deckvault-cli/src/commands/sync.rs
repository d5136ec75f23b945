use deckvault_core::config::AppConfig;

use crate::commands::common::{
    build_engine, format_sync_report, open_store, sync_report_to_item,
};
use crate::error::CliError;

pub async fn run_sync(config: &AppConfig, full: bool, as_json: bool) -> Result<(), CliError> {
    let store = open_store(&config.db_path).await?;
    let engine = build_engine(config, store).await?;

    let outcome = if full {
        engine.full_sync().await?
    } else {
        engine.incremental_sync().await?
    };

    let Some(report) = outcome.report() else {
        println!("A sync is already running.");
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&sync_report_to_item(report))?);
    } else {
        println!("{}", format_sync_report(report));
    }
    Ok(())
}
