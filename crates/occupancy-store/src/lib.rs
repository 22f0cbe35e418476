//! SQLite persistence for live people-counting.
//!
//! This crate owns the two tables the occupancy system needs:
//!
//! - `live`: the singleton [`LiveState`](occupancy_types::LiveState) row,
//!   mutated only inside transactions that run the daily reset check first
//! - `counts`: the append-only history of counter snapshots, written through
//!   a duplicate-suppressing cache
//!
//! On top of those it provides the hourly/daily/monthly aggregation queries
//! and the operator correction tools (outlier repair, forced reset, CSV
//! import).
//!
//! # Example
//!
//! ```
//! use occupancy_store::Store;
//! use occupancy_types::{NormalizedEvent, LocalClock};
//! use time::macros::datetime;
//!
//! let mut store = Store::open_in_memory()?.with_clock(LocalClock::utc());
//! let now = datetime!(2026-02-10 08:10:00 UTC);
//!
//! let outcome = store.ingest(&NormalizedEvent::Delta { in_delta: 5, out_delta: 2 }, now)?;
//! assert_eq!(outcome.state.occupancy, 3);
//! assert!(outcome.recorded);
//!
//! let hours = store.hourly_stats(now.date())?;
//! assert_eq!(hours[0].hour, 8);
//! # Ok::<(), occupancy_store::Error>(())
//! ```

mod aggregate;
mod error;
mod history;
mod import;
mod models;
mod queries;
mod repair;
mod schema;
mod store;

pub use error::{Error, Result};
pub use history::DedupCache;
pub use import::parse_export_timestamp;
pub use models::{
    DaySummary, DayTotal, ForcedResetReport, HistoryRecord, ImportReport, IngestOutcome,
    NewRecord, OutlierReport, ResetReport,
};
pub use queries::RecordQuery;
pub use repair::{DEFAULT_OUTLIER_THRESHOLD, OutlierRepair};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/occupancy/counts.db`
/// - macOS: `~/Library/Application Support/occupancy/counts.db`
/// - Windows: `C:\Users\<user>\AppData\Local\occupancy\counts.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("occupancy")
        .join("counts.db")
}
