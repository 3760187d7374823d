//! Configuration to database, through the scheduler.

use std::time::Duration;

use time::{OffsetDateTime, Time};

use wxhist_core::{HistoryBuilder, StationOutcome};
use wxhist_service::{Config, Scheduler, SchedulerError};
use wxhist_store::{RecordQuery, Store};
use wxhist_types::{MeasureSet, RawReading, SeriesKey};

const CONFIG: &str = r#"
[history]
runs_per_day = 24
run_timeout_secs = 30

[[stations]]
id = "70:ee:50:00:00:01"
name = "Garden"
timezone = "UTC"

[[stations]]
id = "70:ee:50:00:00:02"
name = "Roof"
timezone = "UTC"
build = false
"#;

fn setup() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, CONFIG).unwrap();

    let mut config = Config::load_validated(&config_path).unwrap();
    config.storage.path = dir.path().join("data").join("wx.db");
    (dir, config)
}

fn seed(store: &Store) {
    let today = OffsetDateTime::now_utc().replace_time(Time::MIDNIGHT);
    let yesterday = today - time::Duration::days(1);
    for station in ["70:ee:50:00:00:01", "70:ee:50:00:00:02"] {
        let series = SeriesKey::new(station, "02:00:00:00:00:01", "NAModule1", "temperature");
        let readings = [
            RawReading::new(&series, yesterday + time::Duration::hours(2), 11.0),
            RawReading::new(&series, yesterday + time::Duration::hours(6), 13.0),
            RawReading::new(&series, today, 12.0),
        ];
        store.insert_readings(&readings).unwrap();
    }
}

#[tokio::test]
async fn test_station_pass_from_config() {
    let (_dir, config) = setup();
    let store = Store::open(&config.storage.path).unwrap();
    seed(&store);

    let builder = HistoryBuilder::new(store, config.stations(), config.history.policy());
    let scheduler = Scheduler::new(builder, &config.history);

    let report = scheduler.run_station("70:ee:50:00:00:01").await.unwrap();
    assert_eq!(report.outcome, StationOutcome::Built);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.rows_swept, 2);

    let report = scheduler.run_station("70:ee:50:00:00:02").await.unwrap();
    assert_eq!(report.outcome, StationOutcome::Disabled);
    assert_eq!(report.rows_swept, 2);

    let err = scheduler.run_station("70:ee:50:00:00:03").await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnknownStation(_)));

    drop(scheduler);
    let store = Store::open(&config.storage.path).unwrap();
    let avg = store
        .query_records(&RecordQuery::new().measure_set(MeasureSet::Avg))
        .unwrap();
    assert_eq!(avg.len(), 1);
    assert_eq!(avg[0].record.station_id, "70:ee:50:00:00:01");
    assert_eq!(avg[0].record.value, 12.0);
}

#[tokio::test]
async fn test_run_once_covers_every_station() {
    let (_dir, config) = setup();
    let store = Store::open(&config.storage.path).unwrap();
    let builder = HistoryBuilder::new(store, config.stations(), config.history.policy());
    let scheduler =
        Scheduler::with_timing(builder, Duration::from_secs(3600), Duration::from_secs(30));

    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.stations.len(), 2);
    assert!(report.is_clean());
}
