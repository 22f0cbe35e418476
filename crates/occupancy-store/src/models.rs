//! Data models for stored data and operation reports.

use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

use occupancy_types::formats;
use occupancy_types::{LiveState, derive_occupancy};

/// A history snapshot stored in the `counts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Database row ID.
    pub id: i64,
    /// Sensor-local wall time of the snapshot.
    #[serde(with = "formats::wall_clock")]
    pub timestamp: PrimitiveDateTime,
    /// Entries since the last reset.
    pub count_in: u64,
    /// Exits since the last reset.
    pub count_out: u64,
    /// Occupancy at the time of the snapshot.
    pub occupancy: u64,
}

/// A history snapshot that has not been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRecord {
    /// Sensor-local wall time.
    pub timestamp: PrimitiveDateTime,
    /// Entries since the last reset.
    pub count_in: u64,
    /// Exits since the last reset.
    pub count_out: u64,
    /// Occupancy; derived from the counters by [`NewRecord::new`].
    pub occupancy: u64,
}

impl NewRecord {
    /// Create a record with occupancy derived from the counters.
    pub fn new(timestamp: PrimitiveDateTime, count_in: u64, count_out: u64) -> Self {
        Self {
            timestamp,
            count_in,
            count_out,
            occupancy: derive_occupancy(count_in, count_out),
        }
    }
}

/// Live state before and after a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    /// State prior to the rebase.
    pub before: LiveState,
    /// State after the rebase.
    pub after: LiveState,
}

/// Result of [`Store::ingest`](crate::Store::ingest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Live state after the write.
    pub state: LiveState,
    /// Present if a daily reset ran before the event was applied.
    pub reset: Option<ResetReport>,
    /// Whether a history snapshot was appended.
    pub recorded: bool,
    /// An absolute reading was below the base offsets and the base was re-anchored.
    pub regressed: bool,
}

/// Row count and maxima for one calendar day of history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// Local calendar date.
    #[serde(with = "formats::iso_date")]
    pub date: Date,
    /// Number of history rows.
    pub rows: u64,
    /// Highest entry counter, 0 if there are no rows.
    pub max_in: u64,
    /// Highest exit counter, 0 if there are no rows.
    pub max_out: u64,
}

/// Audit trail of an outlier repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlierReport {
    /// Threshold that was applied.
    pub threshold: u64,
    /// Per-day summaries before deletion.
    pub before: Vec<DaySummary>,
    /// Number of rows deleted.
    pub deleted: usize,
    /// Per-day summaries after deletion.
    pub after: Vec<DaySummary>,
}

/// Audit trail of a forced reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForcedResetReport {
    /// Live state before the reset.
    pub before: LiveState,
    /// Live state after the reset.
    pub after: LiveState,
    /// Today's history before it was purged, if a purge was requested.
    pub purged: Option<DaySummary>,
}

/// End-of-day cumulative totals produced by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    /// Local calendar date.
    #[serde(with = "formats::iso_date")]
    pub date: Date,
    /// Cumulative entries at the last imported hour.
    pub total_in: u64,
    /// Cumulative exits at the last imported hour.
    pub total_out: u64,
}

impl DayTotal {
    /// Occupancy at end of day, clamped at zero.
    pub fn occupancy(&self) -> u64 {
        derive_occupancy(self.total_in, self.total_out)
    }
}

/// Result of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows with non-zero counts that were read.
    pub rows_read: usize,
    /// Distinct days found in the file.
    pub days: usize,
    /// Hourly snapshots written.
    pub inserted: usize,
    /// Hours skipped because history already covered them.
    pub skipped: usize,
    /// Per-row problems, as `line N: message`.
    pub errors: Vec<String>,
    /// End-of-day totals per imported day.
    pub day_totals: Vec<DayTotal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_new_record_derives_occupancy() {
        let record = NewRecord::new(datetime!(2026-02-10 08:30:00), 4, 9);
        assert_eq!(record.occupancy, 0);

        let record = NewRecord::new(datetime!(2026-02-10 08:30:00), 9, 4);
        assert_eq!(record.occupancy, 5);
    }

    #[test]
    fn test_history_record_serialization() {
        let record = HistoryRecord {
            id: 7,
            timestamp: datetime!(2026-02-10 08:45:00),
            count_in: 9,
            count_out: 3,
            occupancy: 6,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2026-02-10 08:45:00");

        let back: HistoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_day_total_occupancy() {
        let total = DayTotal {
            date: date!(2026 - 01 - 31),
            total_in: 412,
            total_out: 415,
        };
        assert_eq!(total.occupancy(), 0);
    }
}
