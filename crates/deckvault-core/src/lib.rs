//! deckvault-core - Core library for Deckvault
//!
//! This crate contains the card models, the on-device catalog mirror, the
//! remote catalog client and the sync engine shared by every Deckvault shell.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod services;
pub mod startup;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Card, CardFilter, SyncRun};
