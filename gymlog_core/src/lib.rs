#![forbid(unsafe_code)]

//! Core domain model and business logic for Gymlog.
//!
//! This crate provides:
//! - Domain types (log entries, identities)
//! - Statistics over the workout log (streaks, monthly counts, favorites)
//! - The log store client and its backends (local file, spreadsheet,
//!   JSON bin, GraphQL)
//! - Application state with optimistic updates and reconciliation
//! - Local preferences (workout catalog, theme) and configuration

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod prefs;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result, SyncError, SyncResult};
pub use types::*;
pub use catalog::WorkoutCatalog;
pub use config::Config;
pub use prefs::{Preferences, Theme};
pub use stats::Dashboard;
pub use store::{Capabilities, Created, LoadOutcome, LoadSource, LogClient, LogStore};
pub use tracker::{SyncReport, Tracker};
