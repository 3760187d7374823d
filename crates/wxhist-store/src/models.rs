//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use wxhist_types::{HistoricalRecord, RawReading};

/// A raw reading stored in the daily store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    #[serde(flatten)]
    pub reading: RawReading,
}

/// A record stored in the historical store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Database row ID.
    pub id: i64,
    #[serde(flatten)]
    pub record: HistoricalRecord,
    /// When the value was last written.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Direct aggregates over a set of raw readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingAggregate {
    /// Number of readings with a value.
    pub count: u64,
    pub min: f64,
    pub max: f64,
    /// Arithmetic mean.
    pub avg: f64,
    /// Mean of squared values, kept to derive the standard deviation.
    pub avg_sq: f64,
}

impl ReadingAggregate {
    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        (self.avg_sq - self.avg * self.avg).max(0.0).sqrt()
    }
}

/// Number of occurrences of one exact value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: f64,
    pub count: u64,
}
