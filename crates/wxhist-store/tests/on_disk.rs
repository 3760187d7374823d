//! Integration tests against a database file on disk.

use time::macros::{date, datetime};

use wxhist_store::{ReadingQuery, RecordQuery, Store};
use wxhist_types::{HistoricalRecord, MeasureSet, RawReading, SeriesKey};

#[test]
fn test_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("wx").join("data.db");

    let store = Store::open(&path).unwrap();
    drop(store);

    assert!(path.exists());
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.db");
    let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");

    {
        let store = Store::open(&path).unwrap();
        store
            .insert_reading(&RawReading::new(&series, datetime!(2024-06-01 08:00 UTC), 12.5))
            .unwrap();
        store
            .upsert_record(&HistoricalRecord::new(
                &series,
                date!(2024 - 05 - 31),
                MeasureSet::Avg,
                11.0,
            ))
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count_readings(&ReadingQuery::series(&series)).unwrap(), 1);
    let records = store
        .query_records(&RecordQuery::new().measure("temperature"))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.value, 11.0);
}
