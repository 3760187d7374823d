//! Printable summaries of history passes.

use serde::Serialize;

use wxhist_core::{RunReport, StationOutcome, StationReport};

/// Summary of one station, as printed by the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationSummary {
    pub station_id: String,
    /// Summarized local date (`YYYY-MM-DD`).
    pub day: String,
    pub outcome: &'static str,
    pub series_seen: usize,
    pub series_aggregated: usize,
    pub series_failed: usize,
    pub records_written: usize,
    pub rows_swept: usize,
    pub sweep_failures: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl From<&StationReport> for StationSummary {
    fn from(report: &StationReport) -> Self {
        Self {
            station_id: report.station_id.clone(),
            day: format!(
                "{:04}-{:02}-{:02}",
                report.day.year(),
                u8::from(report.day.month()),
                report.day.day()
            ),
            outcome: outcome_label(report.outcome),
            series_seen: report.series_seen,
            series_aggregated: report.series_aggregated,
            series_failed: report.series_failed(),
            records_written: report.records_written,
            rows_swept: report.rows_swept,
            sweep_failures: report.sweep_failures,
            failures: report.failures.clone(),
        }
    }
}

/// A station that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub station_id: String,
    pub error: String,
}

/// Summary of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub stations: Vec<StationSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureSummary>,
    pub records_written: usize,
    pub rows_swept: usize,
    pub interrupted: bool,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            stations: report.stations.iter().map(StationSummary::from).collect(),
            failures: report
                .failures
                .iter()
                .map(|f| FailureSummary {
                    station_id: f.station_id.clone(),
                    error: f.error.clone(),
                })
                .collect(),
            records_written: report.records_written(),
            rows_swept: report.rows_swept(),
            interrupted: report.interrupted,
        }
    }
}

pub fn outcome_label(outcome: StationOutcome) -> &'static str {
    match outcome {
        StationOutcome::Built => "built",
        StationOutcome::SweptOnly => "swept-only",
        StationOutcome::Disabled => "disabled",
        StationOutcome::NoRecentReadings => "no-recent-readings",
        StationOutcome::Interrupted => "interrupted",
    }
}

impl std::fmt::Display for StationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}]: {} series, {} record(s), {} row(s) swept",
            self.station_id,
            self.day,
            self.outcome,
            self.series_aggregated,
            self.records_written,
            self.rows_swept
        )?;
        if self.series_failed > 0 {
            write!(f, ", {} series failed", self.series_failed)?;
        }
        if self.sweep_failures > 0 {
            write!(f, ", {} sweep(s) failed", self.sweep_failures)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use wxhist_core::{HistoryBuilder, MockStore, RollupPolicy};
    use wxhist_types::{RawReading, SeriesKey, Station};

    fn report() -> RunReport {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let store = MockStore::with_readings([
            RawReading::new(&series, datetime!(2024-06-01 08:00 UTC), 15.0),
            RawReading::new(&series, datetime!(2024-06-02 08:00 UTC), 16.0),
        ]);
        let stations = vec![
            Station::new("st", "Garden", "UTC"),
            Station::new("bad", "Broken", "Nowhere/Special"),
        ];
        HistoryBuilder::new(store, stations, RollupPolicy::default())
            .run_at(datetime!(2024-06-02 09:00 UTC))
    }

    #[test]
    fn test_run_summary() {
        let summary = RunSummary::from(&report());

        assert_eq!(summary.stations.len(), 1);
        let station = &summary.stations[0];
        assert_eq!(station.day, "2024-06-01");
        assert_eq!(station.outcome, "built");
        assert_eq!(station.records_written, 3);
        assert_eq!(summary.failures[0].station_id, "bad");
        assert_eq!(
            station.to_string(),
            "st 2024-06-01 [built]: 1 series, 3 record(s), 1 row(s) swept"
        );
    }

    #[test]
    fn test_run_summary_json() {
        let json = serde_json::to_value(RunSummary::from(&report())).unwrap();

        assert_eq!(json["records_written"], 3);
        assert_eq!(json["stations"][0]["outcome"], "built");
        assert!(json["stations"][0].get("failures").is_none());
        assert_eq!(json["failures"][0]["station_id"], "bad");
    }
}
