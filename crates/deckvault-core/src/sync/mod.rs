//! Catalog synchronization: the engine that mirrors the remote catalog into
//! the local store, and the scheduler that runs it in the background.

mod engine;
mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use scheduler::{BackgroundScheduler, SchedulerState, SchedulerStatus, TickOutcome};
