//! Aggregation of one series window into historical records.
//!
//! Operators are grouped by the query family they need:
//!
//! | Operators | Query |
//! |-----------|-------|
//! | `MAX`, `MIN`, `AVG`, `STD`, `HR_MAX` | one aggregate query |
//! | `MED` | sorted values |
//! | `FQC_MAX`, `FQC_MIN` | values grouped by occurrence count |
//! | `MID`, `AMP`, `x\|y` | none, derived on read |
//!
//! Each family is queried at most once. All reads happen before the first
//! write, so a failed read leaves the historical store untouched.

use tracing::{debug, warn};

use wxhist_store::{ReadingAggregate, ReadingQuery, ValueFrequency};
use wxhist_types::{HistoricalRecord, Operator, OperatorSet, SeriesKey};

use crate::error::Result;
use crate::stats::{FrequencyPick, hourly_max, median, pick_by_frequency};
use crate::traits::RollupStore;
use crate::window::DayWindow;

/// Result of aggregating one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// This many historical records were written (at least one).
    Written(usize),
    /// The operator set was empty, or the window held no readings.
    NothingToAggregate,
}

impl AggregationOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, AggregationOutcome::Written(_))
    }

    /// Number of records written.
    pub fn records(&self) -> usize {
        match self {
            AggregationOutcome::Written(n) => *n,
            AggregationOutcome::NothingToAggregate => 0,
        }
    }
}

/// Lazily fetched query results for one window.
struct WindowData<'a, S> {
    store: &'a S,
    query: ReadingQuery,
    aggregate: Option<Option<ReadingAggregate>>,
    values: Option<Vec<f64>>,
    frequencies: Option<Vec<ValueFrequency>>,
}

impl<'a, S: RollupStore> WindowData<'a, S> {
    fn new(store: &'a S, query: ReadingQuery) -> Self {
        Self {
            store,
            query,
            aggregate: None,
            values: None,
            frequencies: None,
        }
    }

    fn aggregate(&mut self) -> Result<Option<ReadingAggregate>> {
        if self.aggregate.is_none() {
            self.aggregate = Some(self.store.aggregate_readings(&self.query)?);
        }
        Ok(self.aggregate.flatten())
    }

    fn values(&mut self) -> Result<&[f64]> {
        if self.values.is_none() {
            self.values = Some(self.store.reading_values(&self.query)?);
        }
        Ok(self.values.as_deref().unwrap_or_default())
    }

    fn frequencies(&mut self) -> Result<&[ValueFrequency]> {
        if self.frequencies.is_none() {
            self.frequencies = Some(self.store.value_frequencies(&self.query)?);
        }
        Ok(self.frequencies.as_deref().unwrap_or_default())
    }
}

/// Compute the operators of `operators` over the window of `series` and
/// upsert one historical record per computed value.
///
/// Records are dated `window.day`. Writing is not atomic on its own: wrap
/// the call in [`RollupStore::atomic`] to roll back partial writes.
pub fn aggregate_series<S: RollupStore>(
    store: &S,
    series: &SeriesKey,
    window: &DayWindow,
    operators: &OperatorSet,
) -> Result<AggregationOutcome> {
    if operators.is_empty() {
        return Ok(AggregationOutcome::NothingToAggregate);
    }

    let query = ReadingQuery::series(series)
        .since(window.start)
        .until(window.end);
    let mut data = WindowData::new(store, query);
    let mut records = Vec::with_capacity(operators.len());

    for spec in operators {
        let value = match spec.operator {
            Operator::Max => data.aggregate()?.map(|a| a.max),
            Operator::Min => data.aggregate()?.map(|a| a.min),
            Operator::Avg => data.aggregate()?.map(|a| a.avg),
            Operator::Std => data.aggregate()?.map(|a| a.std_dev()),
            Operator::HrMax => data.aggregate()?.map(|a| hourly_max(a.max)),
            Operator::Med => median(data.values()?),
            Operator::FqcMax => pick_by_frequency(data.frequencies()?, FrequencyPick::MostFrequent),
            Operator::FqcMin => {
                pick_by_frequency(data.frequencies()?, FrequencyPick::LeastFrequent)
            }
            Operator::Mid | Operator::Amp | Operator::Compare(..) => {
                debug!("{}: {} is derived on read, skipped", series, spec.operator);
                continue;
            }
        };

        match value {
            Some(value) if value.is_finite() => {
                debug!("{}: {} = {} ({})", series, spec.operator, value, spec.label);
                records.push(HistoricalRecord::new(series, window.day, spec.label, value));
            }
            Some(value) => {
                warn!("{}: {} is not finite ({}), skipped", series, spec.operator, value)
            }
            None => debug!("{}: no readings for {}", series, spec.operator),
        }
    }

    if records.is_empty() {
        return Ok(AggregationOutcome::NothingToAggregate);
    }

    for record in &records {
        store.upsert_record(record)?;
    }
    Ok(AggregationOutcome::Written(records.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockStore;
    use crate::window::LocalZone;
    use time::macros::{date, datetime};
    use wxhist_types::{Central, MeasureSet, RawReading};

    fn window() -> DayWindow {
        let zone: LocalZone = "UTC".parse().unwrap();
        DayWindow::yesterday(&zone, datetime!(2024-06-02 09:00 UTC), 12).unwrap()
    }

    fn store_with(series: &SeriesKey, values: &[f64]) -> MockStore {
        let store = MockStore::new();
        for (i, &value) in values.iter().enumerate() {
            let ts = datetime!(2024-06-01 01:00 UTC) + time::Duration::minutes(10 * i as i64);
            store.insert_reading(RawReading::new(series, ts, value));
        }
        store
    }

    fn value_of(store: &MockStore, set: MeasureSet) -> Option<f64> {
        store
            .records()
            .into_iter()
            .find(|r| r.measure_set == set)
            .map(|r| r.value)
    }

    #[test]
    fn test_plain_temperature() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[15.0, 18.0, 20.0, 14.0]);
        let ops = crate::resolve("temperature", "NAModule1", false, false, false);

        let outcome = aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(outcome, AggregationOutcome::Written(3));
        assert_eq!(value_of(&store, MeasureSet::Max), Some(20.0));
        assert_eq!(value_of(&store, MeasureSet::Min), Some(14.0));
        assert_eq!(value_of(&store, MeasureSet::Avg), Some(16.75));
        assert_eq!(value_of(&store, MeasureSet::Mid), None);
        assert!(store.records().iter().all(|r| r.date == date!(2024 - 06 - 01)));
    }

    #[test]
    fn test_full_mode_deviation_and_median() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let ops = crate::resolve("temperature", "NAModule1", true, false, false);

        let outcome = aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(outcome, AggregationOutcome::Written(5));
        assert_eq!(value_of(&store, MeasureSet::Dev), Some(2.0));
        assert_eq!(value_of(&store, MeasureSet::Med), Some(4.5));
        assert_eq!(value_of(&store, MeasureSet::Amp), None);
    }

    #[test]
    fn test_rain_day_aggregated_writes_agg() {
        let series = SeriesKey::new("st", "r1", "NAModule3", "rain_day_aggregated");
        let store = store_with(&series, &[0.0, 1.2, 3.4, 3.4]);
        let ops = crate::resolve("rain_day_aggregated", "NAModule3", false, false, false);

        aggregate_series(&store, &series, &window(), &ops).unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].measure_set, MeasureSet::Agg);
        assert_eq!(records[0].value, 3.4);
    }

    #[test]
    fn test_dominant_weather() {
        let series = SeriesKey::new("st", "c1", "NACurrent", "weather");
        let store = store_with(&series, &[10.0, 10.0, 10.0, 20.0, 20.0, 30.0]);
        let ops = OperatorSet::new()
            .with(Operator::FqcMax, MeasureSet::Dom)
            .with(Operator::FqcMin, MeasureSet::Min);

        aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(value_of(&store, MeasureSet::Dom), Some(10.0));
        assert_eq!(value_of(&store, MeasureSet::Min), Some(30.0));
    }

    #[test]
    fn test_hourly_max() {
        let series = SeriesKey::new("st", "c1", "NACurrent", "strike_count");
        let store = store_with(&series, &[0.0, 12.0, 6.0]);
        let ops = crate::resolve("strike_count", "NACurrent", true, false, false);

        aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(value_of(&store, MeasureSet::MaxHr), Some(4.0));
    }

    #[test]
    fn test_only_window_rows_count() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[15.0]);
        // After the end hour, and the day before
        store.insert_reading(RawReading::new(&series, datetime!(2024-06-01 12:00:01 UTC), 99.0));
        store.insert_reading(RawReading::new(&series, datetime!(2024-05-31 23:59 UTC), -99.0));
        let ops = OperatorSet::new().with(Operator::Max, MeasureSet::Max);

        aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(value_of(&store, MeasureSet::Max), Some(15.0));
    }

    #[test]
    fn test_empty_window_is_nothing() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = MockStore::new();
        let ops = crate::resolve("temperature", "NAModule1", true, false, false);

        let outcome = aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(outcome, AggregationOutcome::NothingToAggregate);
        assert_eq!(store.upsert_calls(), 0);
    }

    #[test]
    fn test_empty_operator_set_skips_reads() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[1.0]);
        store.set_fail_reads(true);

        let outcome = aggregate_series(&store, &series, &window(), &OperatorSet::new()).unwrap();
        assert_eq!(outcome, AggregationOutcome::NothingToAggregate);
    }

    #[test]
    fn test_derived_only_set_is_nothing() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[1.0, 2.0]);
        let ops = crate::resolve("temperature", "NAModule1", true, true, false);
        assert!(ops.contains(Operator::Compare(Central::Avg, Central::Mid)));

        let outcome = aggregate_series(&store, &series, &window(), &ops).unwrap();
        assert_eq!(outcome, AggregationOutcome::NothingToAggregate);
    }

    #[test]
    fn test_read_failure_writes_nothing() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[1.0, 2.0]);
        store.set_fail_reads(true);
        let ops = crate::resolve("temperature", "NAModule1", true, false, false);

        assert!(aggregate_series(&store, &series, &window(), &ops).is_err());
        assert_eq!(store.upsert_calls(), 0);
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = store_with(&series, &[15.0, 18.0, 20.0, 14.0]);
        let ops = crate::resolve("temperature", "NAModule1", false, false, false);

        aggregate_series(&store, &series, &window(), &ops).unwrap();
        let first = store.records();
        aggregate_series(&store, &series, &window(), &ops).unwrap();

        assert_eq!(store.records(), first);
    }
}
