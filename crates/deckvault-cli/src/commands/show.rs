use deckvault_core::config::AppConfig;
use deckvault_core::Card;

use crate::commands::common::{format_card_detail, normalize_card_id, open_store};
use crate::error::CliError;

pub async fn find_card(config: &AppConfig, id: &str) -> Result<Card, CliError> {
    let id = normalize_card_id(id)?;
    let store = open_store(&config.db_path).await?;
    store
        .get(&id)
        .await?
        .ok_or(CliError::CardNotFound(id))
}

pub async fn run_show(config: &AppConfig, id: &str, as_json: bool) -> Result<(), CliError> {
    let card = find_card(config, id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&card)?);
    } else {
        for line in format_card_detail(&card) {
            println!("{line}");
        }
    }
    Ok(())
}
