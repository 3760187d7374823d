//! SQLite persistence for weather station readings and daily history.
//!
//! Two tables back the rollup:
//!
//! - `daily_readings`: high-frequency raw observations landed by ingestion.
//!   The rollup only reads and deletes rows here.
//! - `history_records`: one value per `(day, station, module, measurement,
//!   measure set)`, written with upsert semantics.
//!
//! # Example
//!
//! ```no_run
//! use wxhist_store::{ReadingQuery, Store};
//!
//! let store = Store::open_default()?;
//!
//! let query = ReadingQuery::new().device("70:ee:50:00:00:01").limit(10);
//! let readings = store.query_readings(&query)?;
//! # Ok::<(), wxhist_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{ReadingAggregate, StoredReading, StoredRecord, ValueFrequency};
pub use queries::{Exclusion, ReadingQuery, RecordQuery};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/wxhist/data.db`
/// - macOS: `~/Library/Application Support/wxhist/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\wxhist\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("wxhist")
        .join("data.db")
}
