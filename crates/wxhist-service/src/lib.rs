//! Scheduler and command line for weather station history rollups.
//!
//! This crate provides a service that:
//! - Loads stations and rollup flags from a TOML file
//! - Runs history passes a fixed number of times per day
//! - Bounds every pass with a timeout and stops cleanly on shutdown
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/wxhist/config.toml`:
//!
//! ```toml
//! [storage]
//! path = "~/.local/share/wxhist/data.db"
//!
//! [history]
//! enabled = true
//! full = false
//! runs_per_day = 4
//! window_end_hour = 12
//! run_timeout_secs = 600
//!
//! [[stations]]
//! id = "70:ee:50:00:00:01"
//! name = "Garden"
//! timezone = "Europe/Paris"
//! ```

pub mod config;
pub mod scheduler;
pub mod summary;

pub use config::{
    Config, ConfigError, HistoryConfig, StationConfig, StorageConfig, ValidationError,
    default_config_path,
};
pub use scheduler::{Scheduler, SchedulerError};
pub use summary::{FailureSummary, RunSummary, StationSummary};
