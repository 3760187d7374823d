//! Query builders for raw readings and historical records.
//!
//! Both [`ReadingQuery`] and [`RecordQuery`] follow the builder pattern. The
//! same [`ReadingQuery`] drives selects, counts, aggregates and deletes on the
//! daily store, so a rollup filters and sweeps with identical predicates.
//!
//! # Example
//!
//! ```
//! use wxhist_store::{ReadingQuery, RecordQuery, Store};
//! use time::macros::{date, datetime};
//!
//! let store = Store::open_in_memory()?;
//!
//! let query = ReadingQuery::new()
//!     .device("70:ee:50:00:00:01")
//!     .measure("temperature")
//!     .since(datetime!(2024-06-01 00:00 UTC))
//!     .until(datetime!(2024-06-01 12:00 UTC));
//! let readings = store.query_readings(&query)?;
//!
//! let records = store.query_records(
//!     &RecordQuery::new().device("70:ee:50:00:00:01").from(date!(2024 - 06 - 01)),
//! )?;
//! # Ok::<(), wxhist_store::Error>(())
//! ```

use time::{Date, OffsetDateTime};

use wxhist_types::{MeasureSet, SeriesKey};

/// Fluent query builder for the daily store.
///
/// By default, [`Store::query_readings`](crate::Store::query_readings) returns
/// results ordered by `timestamp` descending (newest first). Ordering, limit
/// and offset are ignored by counts, aggregates and deletes.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by station (device) ID.
    pub device_id: Option<String>,
    /// Filter by module ID.
    pub module_id: Option<String>,
    /// Filter by measurement kind.
    pub measure_type: Option<String>,
    /// Filter readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Filter readings at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
    /// Series rows left out of the query.
    pub excluded: Vec<Exclusion>,
}

/// The rows of one series at or after `since`, left out of a [`ReadingQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub module_id: String,
    pub measure_type: String,
    pub since: OffsetDateTime,
}

impl Exclusion {
    /// Whether the exclusion covers a row of this module, kind and time.
    pub fn covers(&self, module_id: &str, measure_type: &str, timestamp: OffsetDateTime) -> bool {
        self.module_id == module_id && self.measure_type == measure_type && timestamp >= self.since
    }
}

impl ReadingQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No filter (all stations, modules and measurements)
    /// - No time range filter
    /// - No limit
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Query matching exactly one series.
    pub fn series(series: &SeriesKey) -> Self {
        Self::new()
            .device(&series.station_id)
            .module(&series.module_id)
            .measure(&series.measure_type)
    }

    /// Filter by station (device) ID.
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// Filter by module ID.
    pub fn module(mut self, module_id: &str) -> Self {
        self.module_id = Some(module_id.to_string());
        self
    }

    /// Filter by measurement kind.
    pub fn measure(mut self, measure_type: &str) -> Self {
        self.measure_type = Some(measure_type.to_string());
        self
    }

    /// Filter to readings taken at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings taken at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Leave out the rows of `series` taken at or after `since` (matched on
    /// module and measurement).
    pub fn exclude(mut self, series: &SeriesKey, since: OffsetDateTime) -> Self {
        self.excluded.push(Exclusion {
            module_id: series.module_id.clone(),
            measure_type: series.measure_type.clone(),
            since,
        });
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results by oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(ref module_id) = self.module_id {
            conditions.push("module_id = ?");
            params.push(Box::new(module_id.clone()));
        }

        if let Some(ref measure_type) = self.measure_type {
            conditions.push("measure_type = ?");
            params.push(Box::new(measure_type.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since.unix_timestamp()));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until.unix_timestamp()));
        }

        for exclusion in &self.excluded {
            conditions.push("NOT (module_id = ? AND measure_type = ? AND timestamp >= ?)");
            params.push(Box::new(exclusion.module_id.clone()));
            params.push(Box::new(exclusion.measure_type.clone()));
            params.push(Box::new(exclusion.since.unix_timestamp()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SELECT query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, timestamp, device_id, module_id, module_type, measure_type, \
             measure_value FROM daily_readings {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            if self.limit.is_none() {
                // SQLite requires a LIMIT before OFFSET
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

/// Text form of a day in the historical store (`YYYY-MM-DD`).
pub(crate) fn day_key(day: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        day.year(),
        u8::from(day.month()),
        day.day()
    )
}

/// Fluent query builder for the historical store.
///
/// Results are ordered by date, then module, measurement and measure set.
#[derive(Debug, Default, Clone)]
pub struct RecordQuery {
    /// Filter by station (device) ID.
    pub device_id: Option<String>,
    /// Filter by module ID.
    pub module_id: Option<String>,
    /// Filter by measurement kind.
    pub measure_type: Option<String>,
    /// Filter by measure set.
    pub measure_set: Option<MeasureSet>,
    /// First day included.
    pub from: Option<Date>,
    /// Last day included.
    pub to: Option<Date>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    pub fn module(mut self, module_id: &str) -> Self {
        self.module_id = Some(module_id.to_string());
        self
    }

    pub fn measure(mut self, measure_type: &str) -> Self {
        self.measure_type = Some(measure_type.to_string());
        self
    }

    pub fn measure_set(mut self, measure_set: MeasureSet) -> Self {
        self.measure_set = Some(measure_set);
        self
    }

    /// Include records on or after `day`.
    pub fn from(mut self, day: Date) -> Self {
        self.from = Some(day);
        self
    }

    /// Include records on or before `day`.
    pub fn to(mut self, day: Date) -> Self {
        self.to = Some(day);
        self
    }

    /// Restrict to a single day.
    pub fn day(self, day: Date) -> Self {
        self.from(day).to(day)
    }

    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(ref module_id) = self.module_id {
            conditions.push("module_id = ?");
            params.push(Box::new(module_id.clone()));
        }

        if let Some(ref measure_type) = self.measure_type {
            conditions.push("measure_type = ?");
            params.push(Box::new(measure_type.clone()));
        }

        if let Some(measure_set) = self.measure_set {
            conditions.push("measure_set = ?");
            params.push(Box::new(measure_set.as_str()));
        }

        if let Some(from) = self.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(day_key(from)));
        }

        if let Some(to) = self.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(day_key(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    // ==================== ReadingQuery Tests ====================

    #[test]
    fn test_reading_query_new_defaults() {
        let query = ReadingQuery::new();
        assert!(query.device_id.is_none());
        assert!(query.module_id.is_none());
        assert!(query.measure_type.is_none());
        assert!(query.since.is_none());
        assert!(query.until.is_none());
        assert!(query.limit.is_none());
        assert!(query.offset.is_none());
        assert!(query.newest_first);
    }

    #[test]
    fn test_reading_query_series() {
        let series = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let query = ReadingQuery::series(&series);
        assert_eq!(query.device_id.as_deref(), Some("st"));
        assert_eq!(query.module_id.as_deref(), Some("m1"));
        assert_eq!(query.measure_type.as_deref(), Some("temperature"));

        let (where_clause, params) = query.build_where();
        assert_eq!(
            where_clause,
            "WHERE device_id = ? AND module_id = ? AND measure_type = ?"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_reading_query_exclude() {
        let temp = SeriesKey::new("st", "m1", "NAModule1", "temperature");
        let hum = SeriesKey::new("st", "m1", "NAModule1", "humidity");
        let since = datetime!(2024-06-01 00:00 UTC);
        let query = ReadingQuery::new()
            .device("st")
            .exclude(&temp, since)
            .exclude(&hum, since);

        let (where_clause, params) = query.build_where();
        assert_eq!(
            where_clause,
            "WHERE device_id = ? \
             AND NOT (module_id = ? AND measure_type = ? AND timestamp >= ?) \
             AND NOT (module_id = ? AND measure_type = ? AND timestamp >= ?)"
        );
        assert_eq!(params.len(), 7);
        assert!(query.excluded[0].covers("m1", "temperature", since));
        assert!(!query.excluded[0].covers("m1", "temperature", datetime!(2024-05-31 23:00 UTC)));
        assert!(!query.excluded[0].covers("m1", "humidity", since));
    }

    #[test]
    fn test_reading_query_build_where_empty() {
        let (where_clause, params) = ReadingQuery::new().build_where();
        assert_eq!(where_clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_reading_query_build_where_time_range() {
        let query = ReadingQuery::new()
            .since(datetime!(2024-01-01 00:00:00 UTC))
            .until(datetime!(2024-01-01 12:00:00 UTC));
        let (where_clause, params) = query.build_where();

        assert_eq!(where_clause, "WHERE timestamp >= ? AND timestamp <= ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_reading_query_build_sql() {
        let sql = ReadingQuery::new().build_sql();
        assert!(sql.contains("FROM daily_readings"));
        assert!(sql.contains("ORDER BY timestamp DESC"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("LIMIT"));

        let sql = ReadingQuery::new()
            .device("st")
            .limit(10)
            .offset(5)
            .oldest_first()
            .build_sql();
        assert!(sql.contains("WHERE device_id = ?"));
        assert!(sql.contains("ORDER BY timestamp ASC"));
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("OFFSET 5"));
    }

    #[test]
    fn test_reading_query_offset_without_limit() {
        let sql = ReadingQuery::new().offset(20).build_sql();
        assert!(sql.contains("LIMIT -1 OFFSET 20"));
    }

    // ==================== RecordQuery Tests ====================

    #[test]
    fn test_record_query_day() {
        let query = RecordQuery::new().day(date!(2024 - 03 - 15));
        assert_eq!(query.from, Some(date!(2024 - 03 - 15)));
        assert_eq!(query.to, Some(date!(2024 - 03 - 15)));
    }

    #[test]
    fn test_record_query_build_where_all_filters() {
        let query = RecordQuery::new()
            .device("st")
            .module("m1")
            .measure("temperature")
            .measure_set(MeasureSet::Max)
            .from(date!(2024 - 01 - 01))
            .to(date!(2024 - 01 - 31));
        let (where_clause, params) = query.build_where();

        assert!(where_clause.contains("measure_set = ?"));
        assert!(where_clause.contains("timestamp >= ?"));
        assert!(where_clause.contains("timestamp <= ?"));
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn test_day_key_sorts_lexically() {
        assert_eq!(day_key(date!(2024 - 03 - 05)), "2024-03-05");
        assert!(day_key(date!(2024 - 03 - 05)) < day_key(date!(2024 - 11 - 01)));
    }

    #[test]
    fn test_query_debug() {
        let debug_str = format!("{:?}", ReadingQuery::new().device("test"));
        assert!(debug_str.contains("ReadingQuery"));
        assert!(debug_str.contains("test"));
    }
}
