use deckvault_core::config::AppConfig;
use deckvault_core::notify::TracingNotifier;
use deckvault_core::startup::{self, InitialSync, StoreStatus};

use crate::commands::common::format_sync_report;
use crate::error::CliError;

/// Start the app the way a host shell would, then wait for Ctrl-C while the
/// background refresh runs.
pub async fn run_app(config: &AppConfig) -> Result<(), CliError> {
    let report = startup::start(config, &TracingNotifier).await;

    if let StoreStatus::Unavailable(reason) = report.store_status {
        return Err(CliError::StoreUnavailable(reason));
    }

    match &report.initial_sync {
        InitialSync::Completed(sync) => println!("{}", format_sync_report(sync)),
        InitialSync::NotAttempted => println!("Remote catalog not configured; using local data."),
        InitialSync::AlreadyRunning => println!("A sync is already running."),
        InitialSync::Failed(message) => {
            println!("Initial sync failed ({message}); local data may be stale.");
        }
    }

    let Some(services) = report.services else {
        return Ok(());
    };
    let Some(scheduler) = services.scheduler else {
        return Ok(());
    };

    let status = scheduler.status().await;
    println!(
        "Refreshing every {}s as '{}'. Press Ctrl-C to stop.",
        status.interval.as_secs(),
        status.task_id
    );

    tokio::signal::ctrl_c().await?;
    scheduler.unregister().await;
    println!("Stopped.");
    Ok(())
}
