//! Daily history rollup for weather station readings.
//!
//! This crate turns the high-frequency readings of the daily store into one
//! summary value per day, module, measurement and statistic, then purges the
//! summarized raw rows.
//!
//! # Components
//!
//! - [`OperatorPolicy`] / [`resolve`]: which statistics a series gets
//! - [`aggregate_series`]: computes them over a station-local [`DayWindow`]
//! - [`sweep_series`] / [`sweep_remaining`]: retention of the daily store
//! - [`HistoryBuilder`]: runs the pipeline over every station
//! - [`RollupStore`]: storage seam, implemented by [`wxhist_store::Store`]
//!   and by [`MockStore`] for tests
//!
//! # Example
//!
//! ```
//! use wxhist_core::{HistoryBuilder, RollupPolicy};
//! use wxhist_store::Store;
//! use wxhist_types::Station;
//!
//! let store = Store::open_in_memory()?;
//! let stations = vec![Station::new("70:ee:50:00:00:01", "Garden", "Europe/Paris")];
//! let policy = RollupPolicy { full_mode: true, ..RollupPolicy::default() };
//!
//! let builder = HistoryBuilder::new(store, stations, policy);
//! let report = builder.run();
//! println!("{} record(s) written", report.records_written());
//! # Ok::<(), wxhist_store::Error>(())
//! ```

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod mock;
pub mod policy;
pub mod stats;
pub mod sweeper;
pub mod traits;
pub mod window;

pub use coordinator::{
    HistoryBuilder, RollupPolicy, RunControl, RunReport, StationFailure, StationOutcome,
    StationReport,
};
pub use error::{Error, Result};
pub use executor::{AggregationOutcome, aggregate_series};
pub use mock::MockStore;
pub use policy::{OperatorPolicy, RequestMode, resolve};
pub use sweeper::{SweepOutcome, sweep_remaining, sweep_remaining_except, sweep_series};
pub use traits::RollupStore;
pub use window::{DEFAULT_WINDOW_END_HOUR, DayWindow, LocalZone};

// Re-export the crates the public API is built on
pub use wxhist_store;
pub use wxhist_types;
