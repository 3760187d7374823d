//! Run coordination across stations.
//!
//! A pass walks every configured station in order. For each station:
//!
//! 1. With historization disabled, only the remaining-rows sweep runs.
//! 2. Stations with `build = false` only get the remaining-rows sweep.
//! 3. Stations without any reading since local midnight today are skipped,
//!    so an offline station never loses its backlog.
//! 4. Each series present in yesterday's window is resolved (plain mode),
//!    aggregated and, when something was written, swept. Aggregation and
//!    the scoped sweep form one atomic unit.
//! 5. The remaining-rows sweep runs last. It keeps the in-window rows of
//!    series that failed in step 4; the next day's sweep removes them.
//!
//! A failing series is logged and does not stop its station; a failing
//! station does not stop the pass. Cancellation and the deadline are checked
//! between series and between stations. An interrupted station never reaches
//! its remaining-rows sweep.

use std::time::{Duration, Instant};

use time::{Date, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wxhist_store::ReadingQuery;
use wxhist_types::{OperatorSet, SeriesKey, Station};

use crate::error::{Error, Result};
use crate::executor::{AggregationOutcome, aggregate_series};
use crate::policy::{OperatorPolicy, RequestMode};
use crate::sweeper::{SweepOutcome, sweep_remaining, sweep_remaining_except, sweep_series};
use crate::traits::RollupStore;
use crate::window::{DEFAULT_WINDOW_END_HOUR, DayWindow};

/// Global flags driving a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupPolicy {
    /// Build history at all. When `false`, passes only purge the daily store.
    pub historization: bool,
    /// Include extended kinds and the full operator sets.
    pub full_mode: bool,
    /// Local hour closing yesterday's window, in `1..=24`.
    pub window_end_hour: u8,
}

impl Default for RollupPolicy {
    fn default() -> Self {
        Self {
            historization: true,
            full_mode: false,
            window_end_hour: DEFAULT_WINDOW_END_HOUR,
        }
    }
}

/// Cancellation and deadline for one pass.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the pass when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stop the pass once `deadline` has passed.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop the pass `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `Err` once the pass should stop.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }
}

/// What happened to a station during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOutcome {
    /// Series were aggregated and the daily store swept.
    Built,
    /// Historization is disabled; only the remaining-rows sweep ran.
    SweptOnly,
    /// The station has `build = false`; only the remaining-rows sweep ran.
    Disabled,
    /// No reading since local midnight today.
    NoRecentReadings,
    /// Stopped between series; the remaining-rows sweep did not run.
    Interrupted,
}

/// Per-station counters of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReport {
    pub station_id: String,
    /// Local date that was summarized.
    pub day: Date,
    pub outcome: StationOutcome,
    /// Series found in the window.
    pub series_seen: usize,
    /// Series with at least one record written.
    pub series_aggregated: usize,
    pub records_written: usize,
    pub rows_swept: usize,
    pub sweep_failures: usize,
    /// One message per failed series (or failed series listing).
    pub failures: Vec<String>,
}

impl StationReport {
    fn new(station: &Station, day: Date, outcome: StationOutcome) -> Self {
        Self {
            station_id: station.id.clone(),
            day,
            outcome,
            series_seen: 0,
            series_aggregated: 0,
            records_written: 0,
            rows_swept: 0,
            sweep_failures: 0,
            failures: Vec::new(),
        }
    }

    fn record_sweep(&mut self, sweep: &SweepOutcome) {
        self.rows_swept += sweep.deleted();
        if sweep.is_failed() {
            self.sweep_failures += 1;
        }
    }

    pub fn series_failed(&self) -> usize {
        self.failures.len()
    }
}

/// A station whose processing failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationFailure {
    pub station_id: String,
    pub error: String,
}

/// Summary of a pass over all stations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stations: Vec<StationReport>,
    pub failures: Vec<StationFailure>,
    /// The pass stopped early (cancelled or past its deadline).
    pub interrupted: bool,
}

impl RunReport {
    pub fn records_written(&self) -> usize {
        self.stations.iter().map(|s| s.records_written).sum()
    }

    pub fn rows_swept(&self) -> usize {
        self.stations.iter().map(|s| s.rows_swept).sum()
    }

    pub fn series_failed(&self) -> usize {
        self.stations.iter().map(StationReport::series_failed).sum()
    }

    /// Report for `station_id`, if the station was processed.
    pub fn station(&self, station_id: &str) -> Option<&StationReport> {
        self.stations.iter().find(|s| s.station_id == station_id)
    }

    /// No station, series or sweep failed and the pass ran to completion.
    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self.failures.is_empty()
            && self
                .stations
                .iter()
                .all(|s| s.failures.is_empty() && s.sweep_failures == 0)
    }
}

/// Builds daily history for a fixed set of stations.
///
/// # Example
///
/// ```
/// use wxhist_core::{HistoryBuilder, MockStore, RollupPolicy};
/// use wxhist_types::Station;
///
/// let stations = vec![Station::new("70:ee:50:00:00:01", "Garden", "Europe/Paris")];
/// let builder = HistoryBuilder::new(MockStore::new(), stations, RollupPolicy::default());
///
/// let report = builder.run();
/// assert!(report.failures.is_empty());
/// ```
#[derive(Debug)]
pub struct HistoryBuilder<S> {
    store: S,
    stations: Vec<Station>,
    policy: RollupPolicy,
    resolver: OperatorPolicy,
}

impl<S: RollupStore> HistoryBuilder<S> {
    pub fn new(store: S, stations: Vec<Station>, policy: RollupPolicy) -> Self {
        Self {
            store,
            stations,
            policy,
            resolver: OperatorPolicy::default(),
        }
    }

    /// Use a resolver bound to another catalog.
    #[must_use]
    pub fn with_resolver(mut self, resolver: OperatorPolicy) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn policy(&self) -> RollupPolicy {
        self.policy
    }

    /// Configured station with the given id.
    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == station_id)
    }

    /// Process every station as of now.
    pub fn run(&self) -> RunReport {
        self.run_at(OffsetDateTime::now_utc())
    }

    /// Process every station as of `now`.
    pub fn run_at(&self, now: OffsetDateTime) -> RunReport {
        self.run_with(now, &RunControl::default())
    }

    /// Process every station as of `now`, stopping when `control` says so.
    pub fn run_with(&self, now: OffsetDateTime, control: &RunControl) -> RunReport {
        let mut report = RunReport::default();
        info!("Starting history build for {} station(s)", self.stations.len());

        for station in &self.stations {
            if let Err(e) = control.check() {
                warn!("History build stopped before {}: {}", station, e);
                report.interrupted = true;
                break;
            }

            match self.build_for_with(station, now, control) {
                Ok(station_report) => {
                    let interrupted = station_report.outcome == StationOutcome::Interrupted;
                    report.stations.push(station_report);
                    if interrupted {
                        report.interrupted = true;
                        break;
                    }
                }
                Err(e) => {
                    error!("History build failed for {}: {}", station, e);
                    let interrupted = e.is_interruption();
                    report.failures.push(StationFailure {
                        station_id: station.id.clone(),
                        error: e.to_string(),
                    });
                    if interrupted {
                        report.interrupted = true;
                        break;
                    }
                }
            }
        }

        info!(
            "History build finished: {} station(s), {} record(s) written, {} row(s) swept, {} failure(s)",
            report.stations.len(),
            report.records_written(),
            report.rows_swept(),
            report.failures.len() + report.series_failed()
        );
        report
    }

    /// Process one station as of now.
    pub fn build_for(&self, station: &Station) -> Result<StationReport> {
        self.build_for_at(station, OffsetDateTime::now_utc())
    }

    /// Process one station as of `now`.
    pub fn build_for_at(&self, station: &Station, now: OffsetDateTime) -> Result<StationReport> {
        self.build_for_with(station, now, &RunControl::default())
    }

    /// Process one station as of `now`, stopping when `control` says so.
    ///
    /// Returns `Err` only when the station could not be processed at all
    /// (bad timezone, daily store unreadable, interrupted before starting).
    pub fn build_for_with(
        &self,
        station: &Station,
        now: OffsetDateTime,
        control: &RunControl,
    ) -> Result<StationReport> {
        control.check()?;
        let window = DayWindow::for_station(station, now, self.policy.window_end_hour)?;

        if !self.policy.historization {
            let mut report = StationReport::new(station, window.day, StationOutcome::SweptOnly);
            report.record_sweep(&sweep_remaining(&self.store, &station.id, window.cutoff()));
            return Ok(report);
        }

        if !station.build {
            info!("History build disabled for {}, daily cleanup only", station);
            let mut report = StationReport::new(station, window.day, StationOutcome::Disabled);
            report.record_sweep(&sweep_remaining(&self.store, &station.id, window.cutoff()));
            return Ok(report);
        }

        let recent = self
            .store
            .count_readings(&ReadingQuery::new().device(&station.id).since(window.today_start))?;
        if recent == 0 {
            info!("No readings today for {}, history build skipped", station);
            return Ok(StationReport::new(
                station,
                window.day,
                StationOutcome::NoRecentReadings,
            ));
        }

        let mut report = StationReport::new(station, window.day, StationOutcome::Built);
        let window_query = ReadingQuery::new()
            .device(&station.id)
            .since(window.start)
            .until(window.end);
        let series = match self.store.distinct_series(&window_query) {
            Ok(series) => series,
            Err(e) => {
                error!("Listing series failed for {}: {}", station, e);
                report.failures.push(format!("series listing: {}", e));
                Vec::new()
            }
        };

        let mut failed = Vec::new();
        for key in &series {
            if let Err(e) = control.check() {
                warn!("History build for {} interrupted: {}", station, e);
                report.outcome = StationOutcome::Interrupted;
                return Ok(report);
            }
            report.series_seen += 1;

            let operators = self.resolver.resolve(
                &key.measure_type,
                &key.module_type,
                self.policy.full_mode,
                RequestMode::Plain,
            );
            if operators.is_empty() {
                debug!("{}: no operators", key);
                continue;
            }
            debug!("{}: operators {:?}", key, operators.tokens());

            match self.process_series(key, &window, &operators) {
                Ok((outcome, sweep)) => {
                    report.records_written += outcome.records();
                    if outcome.is_written() {
                        report.series_aggregated += 1;
                    }
                    if let Some(sweep) = sweep {
                        report.record_sweep(&sweep);
                    }
                }
                Err(e) => {
                    warn!("Daily compaction failed for {}: {}", key, e);
                    report.failures.push(format!("{}: {}", key, e));
                    failed.push(key.clone());
                }
            }
        }

        info!(
            "Daily compaction done for {} ({}): {} series, {} record(s), {} failed",
            station,
            window.day,
            report.series_aggregated,
            report.records_written,
            report.series_failed()
        );

        report.record_sweep(&sweep_remaining_except(&self.store, &station.id, &window, &failed));
        Ok(report)
    }

    fn process_series(
        &self,
        key: &SeriesKey,
        window: &DayWindow,
        operators: &OperatorSet,
    ) -> Result<(AggregationOutcome, Option<SweepOutcome>)> {
        self.store.atomic(|store| {
            let outcome = aggregate_series(store, key, window, operators)?;
            let sweep = outcome
                .is_written()
                .then(|| sweep_series(store, key, window.cutoff()));
            Ok((outcome, sweep))
        })
    }
}
