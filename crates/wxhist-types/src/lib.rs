//! Shared types for weather station history rollups.
//!
//! This crate provides the vocabulary used by the store (wxhist-store) and
//! the rollup engine (wxhist-core):
//!
//! - Stations, raw readings and historical records
//! - Operator tokens and `measure_set` labels
//! - The static measurement catalog (standard and extended tiers)
//!
//! # Example
//!
//! ```
//! use wxhist_types::{MeasureSet, Operator, OperatorSet, MeasurementCatalog};
//!
//! let catalog = MeasurementCatalog::DEFAULT;
//! assert!(catalog.is_standard("temperature"));
//!
//! let set = OperatorSet::new().with(Operator::Max, MeasureSet::Agg);
//! assert_eq!(set.label(Operator::Max), Some(MeasureSet::Agg));
//! ```

pub mod catalog;
pub mod error;
pub mod operator;
pub mod types;

pub use catalog::{LIVE_MODULE, MeasurementCatalog, Tier, is_live_module, kinds};
pub use error::{ParseError, ParseResult};
pub use operator::{Central, MeasureSet, Operator, OperatorSet, OperatorSpec};
pub use types::{HistoricalRecord, RawReading, SeriesKey, Station, amplitude, midpoint};
