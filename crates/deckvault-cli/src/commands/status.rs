use chrono::Utc;
use deckvault_core::config::AppConfig;

use crate::commands::common::{
    format_relative_time, format_sync_run_lines, format_timestamp, open_store,
    resolve_install_id, StatusItem,
};
use crate::error::CliError;

pub async fn run_status(config: &AppConfig, runs: usize, as_json: bool) -> Result<(), CliError> {
    let store = open_store(&config.db_path).await?;
    let install_id = resolve_install_id(&store).await?;
    let card_count = store.count().await?;
    let watermark = store.watermark().await?;
    let recent_runs = store.list_sync_runs(runs).await?;

    if as_json {
        let item = StatusItem {
            db_path: store.path().map(|path| path.display().to_string()),
            install_id,
            card_count,
            watermark: watermark.as_ref().map(chrono::DateTime::to_rfc3339),
            catalog_configured: config.catalog.is_some(),
            recent_runs,
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Database:    {}", config.db_path.display());
    println!("Install ID:  {install_id}");
    println!("Cards:       {card_count}");
    match watermark {
        Some(watermark) => println!(
            "Newest card: {} ({})",
            format_timestamp(&watermark),
            format_relative_time(&watermark, &Utc::now())
        ),
        None => println!("Newest card: none (never synced)"),
    }
    if config.catalog.is_none() {
        println!("Catalog:     not configured");
    }

    if recent_runs.is_empty() {
        println!("No sync runs recorded.");
    } else {
        println!();
        for line in format_sync_run_lines(&recent_runs) {
            println!("{line}");
        }
    }
    Ok(())
}
