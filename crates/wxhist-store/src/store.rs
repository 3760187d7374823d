//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use time::{Date, Month, OffsetDateTime};
use tracing::{debug, info};

use wxhist_types::{HistoricalRecord, MeasureSet, RawReading, SeriesKey};

use crate::error::{Error, Result};
use crate::models::{ReadingAggregate, StoredReading, StoredRecord, ValueFrequency};
use crate::queries::{ReadingQuery, RecordQuery, day_key};
use crate::schema;

/// SQLite-based store holding the daily (raw) and historical tables.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside a transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise,
    /// so a failed unit leaves no partial writes or deletes behind.
    /// Transactions do not nest.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| E::from(Error::from(e)))?;
        let value = f(self)?;
        tx.commit().map_err(|e| E::from(Error::from(e)))?;
        Ok(value)
    }
}

fn timestamp_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let ts: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(ts).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e))
    })
}

fn day_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Date> {
    let text: String = row.get(idx)?;
    parse_day(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid day '{}'", text).into(),
        )
    })
}

fn measure_set_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<MeasureSet> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_day(s: &str) -> Option<Date> {
    let mut parts = s.splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = Month::try_from(parts.next()?.parse::<u8>().ok()?).ok()?;
    let day = parts.next()?.parse().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

// Daily store operations
impl Store {
    /// Insert a raw reading.
    pub fn insert_reading(&self, reading: &RawReading) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO daily_readings (timestamp, device_id, module_id, module_type,
             measure_type, measure_value) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                reading.timestamp.unix_timestamp(),
                reading.station_id,
                reading.module_id,
                reading.module_type,
                reading.measure_type,
                reading.value,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a batch of raw readings in one transaction.
    pub fn insert_readings(&self, readings: &[RawReading]) -> Result<usize> {
        let inserted = self.transaction(|store| {
            for reading in readings {
                store.insert_reading(reading)?;
            }
            Ok::<_, Error>(readings.len())
        })?;

        debug!("Inserted {} raw readings", inserted);
        Ok(inserted)
    }

    /// Query raw readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(StoredReading {
                    id: row.get(0)?,
                    reading: RawReading {
                        timestamp: timestamp_from_row(row, 1)?,
                        station_id: row.get(2)?,
                        module_id: row.get(3)?,
                        module_type: row.get(4)?,
                        measure_type: row.get(5)?,
                        value: row.get(6)?,
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Count raw readings matching the query.
    pub fn count_readings(&self, query: &ReadingQuery) -> Result<u64> {
        let (where_clause, params) = query.build_where();
        let sql = format!("SELECT COUNT(*) FROM daily_readings {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = self
            .conn
            .query_row(&sql, params_ref.as_slice(), |row| row.get(0))?;

        Ok(count as u64)
    }

    /// Distinct series present among the readings matching the query.
    ///
    /// Ordered by module then measurement so callers iterate in a stable order.
    pub fn distinct_series(&self, query: &ReadingQuery) -> Result<Vec<SeriesKey>> {
        let (where_clause, params) = query.build_where();
        let sql = format!(
            "SELECT DISTINCT device_id, module_id, module_type, measure_type
             FROM daily_readings {}
             ORDER BY device_id, module_id, module_type, measure_type",
            where_clause
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let series = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(SeriesKey {
                    station_id: row.get(0)?,
                    module_id: row.get(1)?,
                    module_type: row.get(2)?,
                    measure_type: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(series)
    }

    /// Direct aggregates (count, min, max, mean, mean of squares) in one pass.
    ///
    /// Returns `None` when no reading with a value matches.
    pub fn aggregate_readings(&self, query: &ReadingQuery) -> Result<Option<ReadingAggregate>> {
        let (where_clause, params) = query.build_where();
        let sql = format!(
            "SELECT COUNT(measure_value), MIN(measure_value), MAX(measure_value),
                    AVG(measure_value), AVG(measure_value * measure_value)
             FROM daily_readings {}",
            where_clause
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        debug!("Executing aggregate: {}", sql);

        let aggregate = self.conn.query_row(&sql, params_ref.as_slice(), |row| {
            let count: i64 = row.get(0)?;
            if count == 0 {
                return Ok(None);
            }
            Ok(Some(ReadingAggregate {
                count: count as u64,
                min: row.get(1)?,
                max: row.get(2)?,
                avg: row.get(3)?,
                avg_sq: row.get(4)?,
            }))
        })?;

        Ok(aggregate)
    }

    /// Occurrences of each distinct value, ordered by ascending value.
    pub fn value_frequencies(&self, query: &ReadingQuery) -> Result<Vec<ValueFrequency>> {
        let (where_clause, params) = query.build_where();
        let conjunction = if where_clause.is_empty() { "WHERE" } else { "AND" };
        let sql = format!(
            "SELECT measure_value, COUNT(*) FROM daily_readings {} {} measure_value IS NOT NULL
             GROUP BY measure_value ORDER BY measure_value ASC",
            where_clause, conjunction
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let frequencies = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(ValueFrequency {
                    value: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(frequencies)
    }

    /// All values matching the query, sorted ascending.
    pub fn reading_values(&self, query: &ReadingQuery) -> Result<Vec<f64>> {
        let (where_clause, params) = query.build_where();
        let conjunction = if where_clause.is_empty() { "WHERE" } else { "AND" };
        let sql = format!(
            "SELECT measure_value FROM daily_readings {} {} measure_value IS NOT NULL
             ORDER BY measure_value ASC",
            where_clause, conjunction
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map(params_ref.as_slice(), |row| row.get(0))?
            .collect::<std::result::Result<Vec<f64>, _>>()?;

        Ok(values)
    }

    /// Delete raw readings matching the query. Returns the number of rows removed.
    pub fn delete_readings(&self, query: &ReadingQuery) -> Result<usize> {
        let (where_clause, params) = query.build_where();
        let sql = format!("DELETE FROM daily_readings {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let deleted = self.conn.execute(&sql, params_ref.as_slice())?;
        debug!("Deleted {} raw readings", deleted);
        Ok(deleted)
    }
}

// Historical store operations
impl Store {
    /// Insert or replace the value of a historical record.
    pub fn upsert_record(&self, record: &HistoricalRecord) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        self.conn.execute(
            "INSERT INTO history_records (timestamp, device_id, module_id, module_type,
             measure_type, measure_set, measure_value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(timestamp, device_id, module_id, measure_type, measure_set)
             DO UPDATE SET
                module_type = ?4,
                measure_value = ?7,
                updated_at = ?8",
            rusqlite::params![
                day_key(record.date),
                record.station_id,
                record.module_id,
                record.module_type,
                record.measure_type,
                record.measure_set.as_str(),
                record.value,
                now,
            ],
        )?;

        Ok(())
    }

    /// Query historical records with filters.
    pub fn query_records(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>> {
        let (where_clause, params) = query.build_where();
        let sql = format!(
            "SELECT id, timestamp, device_id, module_id, module_type, measure_type,
             measure_set, measure_value, updated_at
             FROM history_records {}
             ORDER BY timestamp, device_id, module_id, measure_type, measure_set",
            where_clause
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    record: HistoricalRecord {
                        date: day_from_row(row, 1)?,
                        station_id: row.get(2)?,
                        module_id: row.get(3)?,
                        module_type: row.get(4)?,
                        measure_type: row.get(5)?,
                        measure_set: measure_set_from_row(row, 6)?,
                        value: row.get(7)?,
                    },
                    updated_at: timestamp_from_row(row, 8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count historical records, optionally for one station.
    pub fn count_records(&self, device_id: Option<&str>) -> Result<u64> {
        let count: i64 = match device_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM history_records WHERE device_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM history_records", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }
}
