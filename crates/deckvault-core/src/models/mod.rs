//! Data models for Deckvault

mod card;
mod filter;
mod sync_run;

pub use card::Card;
pub use filter::CardFilter;
pub use sync_run::{SyncMode, SyncRun, SyncRunStatus};
