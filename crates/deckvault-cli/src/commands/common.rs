use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use deckvault_core::catalog::{CatalogSource, RemoteCatalogClient};
use deckvault_core::config::{AppConfig, CatalogConfig};
use deckvault_core::identity::InstallIdentity;
use deckvault_core::models::SyncRunStatus;
use deckvault_core::services::CardStore;
use deckvault_core::sync::{SyncEngine, SyncReport};
use deckvault_core::{Card, CardFilter, SyncRun};
use serde::Serialize;

use crate::cli::{FilterArgs, GlobalArgs};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncReportItem {
    pub run_id: String,
    pub mode: String,
    pub fetched: u64,
    pub applied: u64,
    pub stale: u64,
    pub watermark_before: Option<String>,
    pub watermark_after: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub db_path: Option<String>,
    pub install_id: String,
    pub card_count: u64,
    pub watermark: Option<String>,
    pub catalog_configured: bool,
    pub recent_runs: Vec<SyncRun>,
}

/// Layer configuration: defaults, then the config file, then environment,
/// then command-line flags.
pub fn resolve_config(
    global: &GlobalArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::new(default_db_path());

    if let Some(path) = global.config.clone().or_else(default_config_path) {
        config = config.apply_file(&path)?;
    }
    config = config.apply_lookup(lookup)?;

    if let Some(db_path) = &global.db_path {
        config.db_path.clone_from(db_path);
    }
    apply_catalog_flags(
        &mut config,
        global.catalog_url.clone(),
        global.catalog_key.clone(),
    )?;

    Ok(config)
}

fn apply_catalog_flags(
    config: &mut AppConfig,
    url: Option<String>,
    key: Option<String>,
) -> Result<(), CliError> {
    if url.is_none() && key.is_none() {
        return Ok(());
    }

    let base = config.catalog.take();
    let url = url.or_else(|| base.as_ref().map(|catalog| catalog.base_url.clone()));
    let key = key.or_else(|| base.as_ref().map(|catalog| catalog.api_key.clone()));
    let (Some(url), Some(key)) = (url, key) else {
        return Err(deckvault_core::Error::Config(
            "--catalog-url and --catalog-key must be given together".to_string(),
        )
        .into());
    };

    let catalog = match base {
        Some(base) => CatalogConfig::new(url, key).with_options_of(base),
        None => CatalogConfig::new(url, key),
    };
    catalog.validate()?;
    config.catalog = Some(catalog);
    Ok(())
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckvault")
        .join("deckvault.db")
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deckvault").join("config.json"))
}

pub async fn open_store(db_path: &Path) -> Result<CardStore, CliError> {
    CardStore::open_path(db_path).await.map_err(|error| {
        if error.is_storage_fatal() {
            CliError::StoreUnavailable(error.to_string())
        } else {
            CliError::Core(error)
        }
    })
}

pub async fn resolve_install_id(store: &CardStore) -> Result<String, CliError> {
    Ok(InstallIdentity::new(store.clone()).install_id().await?)
}

pub async fn build_engine(config: &AppConfig, store: CardStore) -> Result<SyncEngine, CliError> {
    let catalog = config
        .catalog
        .as_ref()
        .ok_or(CliError::CatalogNotConfigured)?;
    let source: Arc<dyn CatalogSource> = Arc::new(RemoteCatalogClient::new(catalog)?);
    let install_id = resolve_install_id(&store).await?;
    Ok(SyncEngine::new(store, source, install_id))
}

pub fn build_filter(args: &FilterArgs) -> Result<CardFilter, CliError> {
    if let (Some(min), Some(max)) = (args.min_price, args.max_price) {
        if min > max {
            return Err(CliError::InvalidPriceRange { min, max });
        }
    }

    let mut filter = CardFilter::default()
        .price_between(args.min_price, args.max_price)
        .limit(args.limit);
    if let Some(name) = normalize_text(args.name.as_deref()) {
        filter = filter.name_contains(name);
    }
    if let Some(set) = normalize_text(args.set.as_deref()) {
        filter = filter.in_set(set);
    }
    if let Some(rarity) = normalize_text(args.rarity.as_deref()) {
        filter = filter.rarity(rarity);
    }
    if let Some(domain) = normalize_text(args.domain.as_deref()) {
        filter = filter.domain(domain);
    }
    if let Some(card_type) = normalize_text(args.card_type.as_deref()) {
        filter = filter.card_type(card_type);
    }
    Ok(filter)
}

pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

pub fn normalize_card_id(id: &str) -> Result<String, CliError> {
    normalize_text(Some(id)).ok_or(CliError::EmptyCardId)
}

pub fn format_card_lines(cards: &[Card]) -> Vec<String> {
    cards
        .iter()
        .map(|card| {
            let name = truncate(&card.name, 32);
            let rarity = card.rarity.as_deref().unwrap_or("-");
            format!(
                "{:<12}  {:<5}  {name:<32}  {rarity:<10}  {:>9}",
                card.id,
                card.set_abbreviation,
                format_price(card.price)
            )
        })
        .collect()
}

pub fn format_card_detail(card: &Card) -> Vec<String> {
    let mut lines = vec![
        format!("{} ({})", card.name, card.id),
        format!("Set:      {} [{}]", card.set_name, card.set_abbreviation),
    ];
    let optional = [
        ("Type:     ", card.card_type.as_deref()),
        ("Rarity:   ", card.rarity.as_deref()),
        ("Domain:   ", card.domain.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            lines.push(format!("{label}{value}"));
        }
    }

    let stats = [("energy", card.energy), ("might", card.might), ("power", card.power)]
        .into_iter()
        .filter_map(|(label, value)| value.map(|value| format!("{label} {value}")))
        .collect::<Vec<_>>();
    if !stats.is_empty() {
        lines.push(format!("Stats:    {}", stats.join(", ")));
    }
    if !card.tags.is_empty() {
        lines.push(format!("Tags:     {}", card.tags.join(", ")));
    }
    if let Some(ability) = card.ability.as_deref() {
        lines.push(format!("Ability:  {ability}"));
    }

    let change = card
        .price_change
        .map_or_else(String::new, |change| format!(" ({change:+.2})"));
    lines.push(format!("Price:    {}{change}", format_price(card.price)));
    lines.push(format!("Updated:  {}", format_timestamp(&card.updated_at)));
    lines
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_sync_report(report: &SyncReport) -> String {
    format!(
        "Sync completed ({}): fetched {}, applied {}, skipped {} stale",
        report.mode, report.fetched, report.applied, report.stale
    )
}

pub fn sync_report_to_item(report: &SyncReport) -> SyncReportItem {
    SyncReportItem {
        run_id: report.run_id.clone(),
        mode: report.mode.to_string(),
        fetched: report.fetched,
        applied: report.applied,
        stale: report.stale,
        watermark_before: report.watermark_before.as_ref().map(DateTime::to_rfc3339),
        watermark_after: report.watermark_after.as_ref().map(DateTime::to_rfc3339),
    }
}

pub fn format_sync_run_lines(runs: &[SyncRun]) -> Vec<String> {
    runs.iter()
        .map(|run| {
            let base = format!(
                "{}  {:<9}  {:<11}  fetched={} applied={} stale={}",
                format_timestamp(&run.finished_at),
                run.status.as_str(),
                run.mode.as_str(),
                run.fetched,
                run.applied,
                run.stale
            );
            match (&run.status, run.error.as_deref()) {
                (SyncRunStatus::Failed, Some(error)) => format!("{base}  error={error}"),
                _ => base,
            }
        })
        .collect()
}

pub fn format_relative_time(timestamp: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(*timestamp).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
