//! Core records handled by the rollup.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::operator::MeasureSet;

/// A weather station, as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Station {
    /// Station (device) identifier, usually the main module MAC address.
    pub id: String,
    /// Display name.
    pub name: String,
    /// IANA zone (`Europe/Paris`) or fixed offset (`+02:00`, `UTC-3:30`).
    pub timezone: String,
    /// Whether daily readings of this station are rolled up into history.
    #[cfg_attr(feature = "serde", serde(default = "default_build"))]
    pub build: bool,
}

#[cfg(feature = "serde")]
fn default_build() -> bool {
    true
}

impl Station {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timezone: timezone.into(),
            build: true,
        }
    }

    /// Enable or disable the history rollup for this station.
    #[must_use]
    pub fn with_build(mut self, build: bool) -> Self {
        self.build = build;
        self
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One measurement series of a station: a module and a measurement kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesKey {
    pub station_id: String,
    pub module_id: String,
    pub module_type: String,
    pub measure_type: String,
}

impl SeriesKey {
    pub fn new(
        station_id: impl Into<String>,
        module_id: impl Into<String>,
        module_type: impl Into<String>,
        measure_type: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            module_id: module_id.into(),
            module_type: module_type.into(),
            measure_type: measure_type.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}[{}]/{}",
            self.station_id, self.module_id, self.module_type, self.measure_type
        )
    }
}

/// A raw observation in the daily store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawReading {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    pub station_id: String,
    pub module_id: String,
    pub module_type: String,
    pub measure_type: String,
    pub value: f64,
}

impl RawReading {
    /// Build a reading for `series` at `timestamp`.
    pub fn new(series: &SeriesKey, timestamp: OffsetDateTime, value: f64) -> Self {
        Self {
            timestamp,
            station_id: series.station_id.clone(),
            module_id: series.module_id.clone(),
            module_type: series.module_type.clone(),
            measure_type: series.measure_type.clone(),
            value,
        }
    }

    pub fn series(&self) -> SeriesKey {
        SeriesKey::new(
            &self.station_id,
            &self.module_id,
            &self.module_type,
            &self.measure_type,
        )
    }
}

/// A daily summary value in the historical store.
///
/// Records are keyed by `(date, station_id, module_id, measure_type,
/// measure_set)`; writing the same key again replaces the value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoricalRecord {
    pub date: Date,
    pub station_id: String,
    pub module_id: String,
    pub module_type: String,
    pub measure_type: String,
    pub measure_set: MeasureSet,
    pub value: f64,
}

impl HistoricalRecord {
    pub fn new(series: &SeriesKey, date: Date, measure_set: MeasureSet, value: f64) -> Self {
        Self {
            date,
            station_id: series.station_id.clone(),
            module_id: series.module_id.clone(),
            module_type: series.module_type.clone(),
            measure_type: series.measure_type.clone(),
            measure_set,
            value,
        }
    }
}

/// Midpoint of a day, computed from its stored max and min.
pub fn midpoint(max: f64, min: f64) -> f64 {
    (max + min) / 2.0
}

/// Amplitude of a day, computed from its stored max and min.
pub fn amplitude(max: f64, min: f64) -> f64 {
    max - min
}
