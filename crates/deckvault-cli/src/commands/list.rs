use deckvault_core::config::AppConfig;

use crate::cli::FilterArgs;
use crate::commands::common::{build_filter, format_card_lines, open_store};
use crate::error::CliError;

pub async fn run_list(config: &AppConfig, args: &FilterArgs, as_json: bool) -> Result<(), CliError> {
    let filter = build_filter(args)?;
    let store = open_store(&config.db_path).await?;
    let cards = store.query_by_filter(&filter).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
    } else if cards.is_empty() {
        println!("No cards found.");
    } else {
        for line in format_card_lines(&cards) {
            println!("{line}");
        }
    }

    Ok(())
}
