//! Trait abstraction over the daily and historical stores.
//!
//! This module provides the [`RollupStore`] trait that abstracts over the
//! SQLite [`Store`] and the in-memory [`MockStore`](crate::MockStore) used for
//! testing.

use wxhist_store::{ReadingAggregate, ReadingQuery, Store, ValueFrequency};
use wxhist_types::{HistoricalRecord, SeriesKey};

use crate::error::Result;

/// Storage operations needed by a rollup pass.
///
/// Reads and deletes on the daily store take a [`ReadingQuery`], so the
/// executor and the sweeper select rows with identical predicates.
///
/// # Example
///
/// ```
/// use wxhist_core::RollupStore;
/// use wxhist_store::{ReadingQuery, Store};
///
/// fn pending<S: RollupStore>(store: &S, station: &str) -> wxhist_store::Result<u64> {
///     store.count_readings(&ReadingQuery::new().device(station))
/// }
///
/// let store = Store::open_in_memory()?;
/// assert_eq!(pending(&store, "70:ee:50:00:00:01")?, 0);
/// # Ok::<(), wxhist_store::Error>(())
/// ```
pub trait RollupStore {
    // --- Daily store ---

    /// Count raw readings matching `query`.
    fn count_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<u64>;

    /// Distinct series among the raw readings matching `query`.
    fn distinct_series(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<SeriesKey>>;

    /// Count, min, max, mean and mean of squares, or `None` without rows.
    fn aggregate_readings(
        &self,
        query: &ReadingQuery,
    ) -> wxhist_store::Result<Option<ReadingAggregate>>;

    /// Occurrences of each distinct value, ascending by value.
    fn value_frequencies(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<ValueFrequency>>;

    /// Values matching `query`, sorted ascending.
    fn reading_values(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<f64>>;

    /// Delete raw readings matching `query`, returning the number removed.
    fn delete_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<usize>;

    // --- Historical store ---

    /// Insert or replace a historical record.
    fn upsert_record(&self, record: &HistoricalRecord) -> wxhist_store::Result<()>;

    // --- Units of work ---

    /// Run `f` so that either all of its writes and deletes persist, or none
    /// do. Units do not nest.
    fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T>;
}

impl RollupStore for Store {
    fn count_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<u64> {
        Store::count_readings(self, query)
    }

    fn distinct_series(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<SeriesKey>> {
        Store::distinct_series(self, query)
    }

    fn aggregate_readings(
        &self,
        query: &ReadingQuery,
    ) -> wxhist_store::Result<Option<ReadingAggregate>> {
        Store::aggregate_readings(self, query)
    }

    fn value_frequencies(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<ValueFrequency>> {
        Store::value_frequencies(self, query)
    }

    fn reading_values(&self, query: &ReadingQuery) -> wxhist_store::Result<Vec<f64>> {
        Store::reading_values(self, query)
    }

    fn delete_readings(&self, query: &ReadingQuery) -> wxhist_store::Result<usize> {
        Store::delete_readings(self, query)
    }

    fn upsert_record(&self, record: &HistoricalRecord) -> wxhist_store::Result<()> {
        Store::upsert_record(self, record)
    }

    fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.transaction(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use time::macros::{date, datetime};
    use wxhist_store::RecordQuery;
    use wxhist_types::{MeasureSet, RawReading};

    fn seeded() -> (Store, SeriesKey) {
        let store = Store::open_in_memory().unwrap();
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        store
            .insert_reading(&RawReading::new(&series, datetime!(2024-06-01 08:00 UTC), 12.0))
            .unwrap();
        (store, series)
    }

    #[test]
    fn test_atomic_commits() {
        let (store, series) = seeded();
        RollupStore::atomic(&store, |s| {
            let record =
                HistoricalRecord::new(&series, date!(2024 - 06 - 01), MeasureSet::Max, 12.0);
            s.upsert_record(&record)?;
            s.delete_readings(&ReadingQuery::series(&series))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(store.count_records(None).unwrap(), 1);
        assert_eq!(RollupStore::count_readings(&store, &ReadingQuery::new()).unwrap(), 0);
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let (store, series) = seeded();
        let result: Result<()> = RollupStore::atomic(&store, |s| {
            let record =
                HistoricalRecord::new(&series, date!(2024 - 06 - 01), MeasureSet::Max, 12.0);
            s.upsert_record(&record)?;
            s.delete_readings(&ReadingQuery::series(&series))?;
            Err(Error::Cancelled)
        });

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(store.query_records(&RecordQuery::new()).unwrap().is_empty());
        assert_eq!(RollupStore::count_readings(&store, &ReadingQuery::new()).unwrap(), 1);
    }
}
