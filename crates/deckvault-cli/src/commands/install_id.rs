use deckvault_core::config::AppConfig;

use crate::commands::common::{open_store, resolve_install_id};
use crate::error::CliError;

pub async fn run_install_id(config: &AppConfig) -> Result<(), CliError> {
    let store = open_store(&config.db_path).await?;
    println!("{}", resolve_install_id(&store).await?);
    Ok(())
}
