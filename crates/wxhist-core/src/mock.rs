//! In-memory store implementation for testing.
//!
//! The [`MockStore`] implements the [`RollupStore`] trait, allowing the
//! executor, the sweeper and the [`HistoryBuilder`](crate::HistoryBuilder) to
//! run without a database.
//!
//! # Features
//!
//! - **Failure injection**: fail every read, write or delete, or only the
//!   operations touching one measurement kind
//! - **Call counters**: observe how many deletes and upserts a pass issued
//! - **Rollback**: [`RollupStore::atomic`] restores the previous contents when
//!   the unit fails

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use wxhist_store::{Error as StoreError, ReadingAggregate, ReadingQuery, ValueFrequency};
use wxhist_types::{HistoricalRecord, RawReading, SeriesKey};

use crate::error::Result;
use crate::stats::value_frequencies;
use crate::traits::RollupStore;

/// An in-memory daily and historical store for testing.
///
/// # Example
///
/// ```
/// use wxhist_core::{MockStore, RollupStore};
/// use wxhist_store::ReadingQuery;
/// use wxhist_types::{RawReading, SeriesKey};
/// use time::macros::datetime;
///
/// let store = MockStore::new();
/// let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
/// store.insert_reading(RawReading::new(&series, datetime!(2024-06-01 08:00 UTC), 15.0));
///
/// assert_eq!(store.count_readings(&ReadingQuery::series(&series)).unwrap(), 1);
///
/// store.set_fail_reads(true);
/// assert!(store.count_readings(&ReadingQuery::new()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    readings: Mutex<Vec<RawReading>>,
    records: Mutex<Vec<HistoricalRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    /// Measurement kind whose reads and writes fail, if any.
    failing_measure: Mutex<Option<String>>,
    upsert_calls: AtomicU32,
    delete_calls: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with raw readings.
    pub fn with_readings(readings: impl IntoIterator<Item = RawReading>) -> Self {
        let store = Self::new();
        lock(&store.readings).extend(readings);
        store
    }

    pub fn insert_reading(&self, reading: RawReading) {
        lock(&self.readings).push(reading);
    }

    /// Snapshot of the raw readings.
    pub fn readings(&self) -> Vec<RawReading> {
        lock(&self.readings).clone()
    }

    /// Snapshot of the historical records.
    pub fn records(&self) -> Vec<HistoricalRecord> {
        lock(&self.records).clone()
    }

    /// Make every read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make every historical write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make every delete fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }

    /// Fail reads filtered on `measure_type` and writes of its records.
    pub fn set_failing_measure(&self, measure_type: Option<&str>) {
        *lock(&self.failing_measure) = measure_type.map(str::to_string);
    }

    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::Relaxed)
    }

    fn check_read(&self, query: &ReadingQuery) -> wxhist_store::Result<()> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("mock read failure".into()));
        }
        self.check_measure(query.measure_type.as_deref())
    }

    fn check_measure(&self, measure_type: Option<&str>) -> wxhist_store::Result<()> {
        let failing = lock(&self.failing_measure);
        if let (Some(failing), Some(measure)) = (failing.as_deref(), measure_type)
            && failing == measure
        {
            return Err(StoreError::Unavailable(format!(
                "mock failure for measure '{}'",
                measure
            )));
        }
        Ok(())
    }

    fn matching(&self, query: &ReadingQuery) -> Vec<RawReading> {
        lock(&self.readings)
            .iter()
            .filter(|r| matches(query, r))
            .cloned()
            .collect()
    }
}

fn matches(query: &ReadingQuery, reading: &RawReading) -> bool {
    query.device_id.as_deref().is_none_or(|d| d == reading.station_id)
        && query.module_id.as_deref().is_none_or(|m| m == reading.module_id)
        && query.measure_type.as_deref().is_none_or(|m| m == reading.measure_type)
        && query.since.is_none_or(|t| reading.timestamp >= t)
        && query.until.is_none_or(|t| reading.timestamp <= t)
        && !query
            .excluded
            .iter()
            .any(|e| e.covers(&reading.module_id, &reading.measure_type, reading.timestamp))
}

fn same_key(a: &HistoricalRecord, b: &HistoricalRecord) -> bool {
    a.date == b.date
        && a.station_id == b.station_id
        && a.module_id == b.module_id
        && a.measure_type == b.measure_type
        && a.measure_set == b.measure_set
}

impl RollupStore for MockStore {
    fn count_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<u64> {
        self.check_read(query)?;
        Ok(self.matching(query).len() as u64)
    }

    fn distinct_series(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<SeriesKey>> {
        self.check_read(query)?;
        let mut series: Vec<SeriesKey> =
            self.matching(query).iter().map(RawReading::series).collect();
        series.sort();
        series.dedup();
        Ok(series)
    }

    fn aggregate_readings(
        &self,
        query: &ReadingQuery,
    ) -> wxhist_store::Result<Option<ReadingAggregate>> {
        self.check_read(query)?;
        let values: Vec<f64> = self.matching(query).iter().map(|r| r.value).collect();
        if values.is_empty() {
            return Ok(None);
        }
        let n = values.len() as f64;
        Ok(Some(ReadingAggregate {
            count: values.len() as u64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg: values.iter().sum::<f64>() / n,
            avg_sq: values.iter().map(|v| v * v).sum::<f64>() / n,
        }))
    }

    fn value_frequencies(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<ValueFrequency>> {
        self.check_read(query)?;
        let values: Vec<f64> = self.matching(query).iter().map(|r| r.value).collect();
        Ok(value_frequencies(&values))
    }

    fn reading_values(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<f64>> {
        self.check_read(query)?;
        let mut values: Vec<f64> = self.matching(query).iter().map(|r| r.value).collect();
        values.sort_by(f64::total_cmp);
        Ok(values)
    }

    fn delete_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<usize> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_deletes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("mock delete failure".into()));
        }
        let mut readings = lock(&self.readings);
        let before = readings.len();
        readings.retain(|r| !matches(query, r));
        Ok(before - readings.len())
    }

    fn upsert_record(&self, record: &HistoricalRecord) -> wxhist_store::Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("mock write failure".into()));
        }
        self.check_measure(Some(&record.measure_type))?;

        let mut records = lock(&self.records);
        match records.iter_mut().find(|r| same_key(r, record)) {
            Some(existing) => existing.clone_from(record),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let readings = self.readings();
        let records = self.records();
        let result = f(self);
        if result.is_err() {
            *lock(&self.readings) = readings;
            *lock(&self.records) = records;
        }
        result
    }
}
