//! daybook-core: day-bounded personal activity event store
//!
//! This crate persists window, keystroke-frequency, note, journal and
//! coffee events in SQLite, migrates legacy per-day flat-file logs into the
//! store, and normalizes each day's rows into the payload served to the
//! timeline front end.

pub mod backfill;
pub mod config;
pub mod day;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod paths;
pub mod schema;

pub use crate::config::Config;
pub use db::EventStore;
pub use error::Error;
pub use error::Result;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "daybook";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "DAYBOOK".to_string()
}
