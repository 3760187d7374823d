//! Retention of the daily store.
//!
//! Two deletes keep the daily store bounded:
//!
//! - the scoped delete removes one series' rows once they are summarized;
//! - the remaining-rows delete removes every row of a station up to the
//!   cutoff, including series that have no operators, except the series
//!   whose rollup failed in the same pass.
//!
//! Sweeps are reported, not retried. A row missed today is caught by the
//! next day's remaining-rows delete, which also retires the rows kept after
//! a failed rollup.

use time::OffsetDateTime;
use tracing::{error, info};

use wxhist_store::ReadingQuery;
use wxhist_types::SeriesKey;

use crate::traits::RollupStore;
use crate::window::DayWindow;

/// Result of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Rows removed.
    Deleted(usize),
    /// The delete failed; the message is the storage error.
    Failed(String),
}

impl SweepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SweepOutcome::Failed(_))
    }

    /// Number of rows removed, zero on failure.
    pub fn deleted(&self) -> usize {
        match self {
            SweepOutcome::Deleted(n) => *n,
            SweepOutcome::Failed(_) => 0,
        }
    }
}

/// Delete the raw rows of `series` at or before `cutoff`.
///
/// Call only after the series was aggregated successfully.
pub fn sweep_series<S: RollupStore>(
    store: &S,
    series: &SeriesKey,
    cutoff: OffsetDateTime,
) -> SweepOutcome {
    match store.delete_readings(&ReadingQuery::series(series).until(cutoff)) {
        Ok(deleted) => {
            info!("Daily cleanup done for {}: {} rows removed", series, deleted);
            SweepOutcome::Deleted(deleted)
        }
        Err(e) => {
            error!("Daily cleanup failed for {}: {}", series, e);
            SweepOutcome::Failed(e.to_string())
        }
    }
}

/// Delete every raw row of `station_id` at or before `cutoff`.
pub fn sweep_remaining<S: RollupStore>(
    store: &S,
    station_id: &str,
    cutoff: OffsetDateTime,
) -> SweepOutcome {
    remove_remaining(store, station_id, ReadingQuery::new().device(station_id).until(cutoff))
}

/// Delete every raw row of `station_id` up to the cutoff of `window`, except
/// the rows of `keep` inside the window.
///
/// Rows of a kept series from before the window are still removed, so a
/// series that keeps failing holds at most one extra day of raw rows.
pub fn sweep_remaining_except<S: RollupStore>(
    store: &S,
    station_id: &str,
    window: &DayWindow,
    keep: &[SeriesKey],
) -> SweepOutcome {
    let mut query = ReadingQuery::new().device(station_id).until(window.cutoff());
    for series in keep {
        query = query.exclude(series, window.start);
    }
    if !keep.is_empty() {
        info!("Keeping raw rows of {} failed series for station {}", keep.len(), station_id);
    }
    remove_remaining(store, station_id, query)
}

fn remove_remaining<S: RollupStore>(
    store: &S,
    station_id: &str,
    query: ReadingQuery,
) -> SweepOutcome {
    match store.delete_readings(&query) {
        Ok(deleted) => {
            info!(
                "Remaining-rows cleanup done for station {}: {} rows removed",
                station_id, deleted
            );
            SweepOutcome::Deleted(deleted)
        }
        Err(e) => {
            error!("Remaining-rows cleanup failed for station {}: {}", station_id, e);
            SweepOutcome::Failed(e.to_string())
        }
    }
}
