//! Scheduled history builds.
//!
//! Passes run on the blocking thread pool, one at a time: the builder sits
//! behind a mutex, and a pass that outlives its timeout is cancelled at the
//! next series boundary while the caller gets [`SchedulerError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use wxhist_core::{HistoryBuilder, RollupStore, RunControl, RunReport, StationReport};

use crate::config::HistoryConfig;

/// Scheduler errors.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("History pass timed out after {0:?}")]
    Timeout(Duration),
    #[error("History pass aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Unknown station: {0}")]
    UnknownStation(String),
    #[error(transparent)]
    Build(#[from] wxhist_core::Error),
}

/// Runs history passes on a fixed cadence.
pub struct Scheduler<S> {
    builder: Arc<Mutex<HistoryBuilder<S>>>,
    period: Duration,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl<S> Scheduler<S>
where
    S: RollupStore + Send + 'static,
{
    /// Create a scheduler with the cadence and timeout of `history`.
    pub fn new(builder: HistoryBuilder<S>, history: &HistoryConfig) -> Self {
        Self::with_timing(builder, history.run_interval(), history.run_timeout())
    }

    pub fn with_timing(builder: HistoryBuilder<S>, period: Duration, timeout: Duration) -> Self {
        Self {
            builder: Arc::new(Mutex::new(builder)),
            period,
            timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token stopping [`Scheduler::run`] and any pass in progress.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one pass over every station.
    pub async fn run_once(&self) -> Result<RunReport, SchedulerError> {
        self.pass(|builder, control| builder.run_with(OffsetDateTime::now_utc(), control))
            .await
    }

    /// Run one pass over a single configured station.
    pub async fn run_station(&self, station_id: &str) -> Result<StationReport, SchedulerError> {
        let station_id = station_id.to_string();
        self.pass(move |builder, control| {
            let station = builder
                .station(&station_id)
                .cloned()
                .ok_or(SchedulerError::UnknownStation(station_id))?;
            builder
                .build_for_with(&station, OffsetDateTime::now_utc(), control)
                .map_err(SchedulerError::from)
        })
        .await?
    }

    /// Run passes every period until shutdown. Returns the number of
    /// completed passes.
    pub async fn run(&self) -> u64 {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes = 0;

        info!(
            "Scheduling history builds every {}s (timeout {}s)",
            self.period.as_secs(),
            self.timeout.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("History scheduler stopped after {} pass(es)", passes);
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => {
                            passes += 1;
                            if !report.is_clean() {
                                warn!(
                                    "History pass finished with {} station failure(s) and {} series failure(s)",
                                    report.failures.len(),
                                    report.series_failed()
                                );
                            }
                        }
                        Err(e) => error!("History pass failed: {}", e),
                    }
                }
            }
        }

        passes
    }

    async fn pass<T, F>(&self, f: F) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
        F: FnOnce(&HistoryBuilder<S>, &RunControl) -> T + Send + 'static,
    {
        let control = RunControl::new()
            .with_cancellation(self.shutdown.child_token())
            .with_timeout(self.timeout);
        let cancel = control.cancellation_token();
        let builder = Arc::clone(&self.builder);

        let handle = tokio::task::spawn_blocking(move || {
            let builder = builder.blocking_lock();
            f(&builder, &control)
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(joined) => Ok(joined?),
            Err(_) => {
                warn!("History pass exceeded {}s, cancelling", self.timeout.as_secs());
                cancel.cancel();
                Err(SchedulerError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxhist_core::{MockStore, RollupPolicy, StationOutcome};
    use wxhist_types::Station;

    fn scheduler(stations: Vec<Station>) -> Scheduler<MockStore> {
        let builder = HistoryBuilder::new(MockStore::new(), stations, RollupPolicy::default());
        Scheduler::with_timing(builder, Duration::from_secs(3600), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_run_once_reports_every_station() {
        let scheduler = scheduler(vec![
            Station::new("a", "A", "UTC"),
            Station::new("b", "B", "Europe/Paris"),
        ]);

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(report.stations.len(), 2);
        assert!(
            report
                .stations
                .iter()
                .all(|s| s.outcome == StationOutcome::NoRecentReadings)
        );
    }

    #[tokio::test]
    async fn test_run_station_unknown() {
        let scheduler = scheduler(vec![Station::new("a", "A", "UTC")]);

        let err = scheduler.run_station("zz").await.unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownStation(id) if id == "zz"));
    }

    #[tokio::test]
    async fn test_run_station_bad_timezone() {
        let scheduler = scheduler(vec![Station::new("a", "A", "Nowhere/Special")]);

        let err = scheduler.run_station("a").await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Build(wxhist_core::Error::InvalidTimezone { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let scheduler = scheduler(vec![Station::new("a", "A", "UTC")]);
        scheduler.shutdown_token().cancel();

        assert_eq!(scheduler.run().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_pass() {
        let scheduler = scheduler(vec![Station::new("a", "A", "UTC")]);
        scheduler.shutdown_token().cancel();

        let report = scheduler.run_once().await.unwrap();
        assert!(report.interrupted);
        assert!(report.stations.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_first_pass_runs_immediately() {
        let scheduler = Arc::new(scheduler(vec![Station::new("a", "A", "UTC")]));
        let shutdown = scheduler.shutdown_token();

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();

        let passes = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(passes, 1);
    }
}
