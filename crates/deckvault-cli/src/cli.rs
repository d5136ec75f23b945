use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deckvault")]
#[command(about = "Browse and refresh the local card catalog mirror")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON config file (defaults to <config dir>/deckvault/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Remote catalog base URL
    #[arg(long, global = true, value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Remote catalog read-only key
    #[arg(long, global = true, value_name = "KEY")]
    pub catalog_key: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull catalog changes into the local mirror
    Sync {
        /// Re-fetch the whole catalog instead of changes since the last sync
        #[arg(long)]
        full: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show local mirror, identity and recent sync runs
    Status {
        /// Number of recent sync runs to show
        #[arg(short, long, default_value = "5")]
        runs: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cards from the local mirror
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single card
    Show {
        /// Card ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync once, then keep refreshing in the background until interrupted
    Run,
    /// Print this install's identifier
    InstallId,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive name fragment
    #[arg(long, value_name = "TEXT")]
    pub name: Option<String>,
    /// Set abbreviation (e.g. OGN)
    #[arg(long = "set", value_name = "ABBR")]
    pub set: Option<String>,
    #[arg(long)]
    pub rarity: Option<String>,
    #[arg(long)]
    pub domain: Option<String>,
    /// Card type (unit, spell, gear, ...)
    #[arg(long = "type", value_name = "TYPE")]
    pub card_type: Option<String>,
    #[arg(long, value_name = "PRICE")]
    pub min_price: Option<f64>,
    #[arg(long, value_name = "PRICE")]
    pub max_price: Option<f64>,
    /// Number of cards to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}
