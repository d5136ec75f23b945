//! Shared services used by every shell.

mod card_store;

pub use card_store::CardStore;
