//! History log: duplicate-suppressed appends and range queries.

use rusqlite::{Connection, OptionalExtension};
use time::PrimitiveDateTime;
use tracing::debug;

use occupancy_types::formats::{format_wall_clock, parse_wall_clock};

use crate::error::{Error, Result};
use crate::models::{HistoryRecord, NewRecord};
use crate::queries::RecordQuery;
use crate::store::Store;

/// Last `(count_in, count_out)` pair written to history.
///
/// An empty cache is the sentinel that forces the next append through. It
/// starts empty and is cleared by every reset, so the first snapshot of a
/// new period (typically `0/0`) is always recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupCache {
    last: Option<(u64, u64)>,
}

impl DedupCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `(count_in, count_out)` equals the last written pair.
    pub fn is_duplicate(&self, count_in: u64, count_out: u64) -> bool {
        self.last == Some((count_in, count_out))
    }

    /// Remember a written pair.
    pub fn remember(&mut self, count_in: u64, count_out: u64) {
        self.last = Some((count_in, count_out));
    }

    /// Forget the last pair.
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// The last written pair, if any.
    pub fn last(&self) -> Option<(u64, u64)> {
        self.last
    }
}

fn insert(conn: &Connection, record: &NewRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO counts (timestamp, count_in, count_out, occupancy) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            format_wall_clock(record.timestamp),
            record.count_in,
            record.count_out,
            record.occupancy,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, u64, u64, u64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_record(
    (id, timestamp, count_in, count_out, occupancy): (i64, String, u64, u64, u64),
) -> Result<HistoryRecord> {
    let timestamp = parse_wall_clock(&timestamp)
        .map_err(|e| Error::InvalidTimestamp(format!("counts.timestamp {timestamp:?}: {e}")))?;
    Ok(HistoryRecord {
        id,
        timestamp,
        count_in,
        count_out,
        occupancy,
    })
}

// History operations
impl Store {
    /// Append a snapshot unless `(count_in, count_out)` equals the last one written.
    ///
    /// Returns whether a row was written.
    pub fn append_if_changed(
        &mut self,
        count_in: u64,
        count_out: u64,
        occupancy: u64,
        at: PrimitiveDateTime,
    ) -> Result<bool> {
        if self.dedup.is_duplicate(count_in, count_out) {
            debug!("Skipping unchanged snapshot {}/{}", count_in, count_out);
            return Ok(false);
        }

        insert(
            &self.conn,
            &NewRecord {
                timestamp: at,
                count_in,
                count_out,
                occupancy,
            },
        )?;
        self.dedup.remember(count_in, count_out);
        debug!(
            "Recorded snapshot {} in={} out={} occupancy={}",
            format_wall_clock(at),
            count_in,
            count_out,
            occupancy
        );
        Ok(true)
    }

    /// Insert a snapshot without consulting the dedup cache.
    pub fn insert_record(&mut self, record: &NewRecord) -> Result<i64> {
        insert(&self.conn, record)
    }

    /// Records in `[start, end)`, oldest first.
    pub fn records_between(
        &self,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<HistoryRecord>> {
        self.query_records(&RecordQuery::new().since(start).until(end))
    }

    /// Query records with filters.
    pub fn query_records(&self, query: &RecordQuery) -> Result<Vec<HistoryRecord>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_record).collect()
    }

    /// The most recent record.
    pub fn latest_record(&self) -> Result<Option<HistoryRecord>> {
        self.conn
            .query_row(
                "SELECT id, timestamp, count_in, count_out, occupancy
                 FROM counts ORDER BY timestamp DESC, id DESC LIMIT 1",
                [],
                row_to_record,
            )
            .optional()?
            .map(into_record)
            .transpose()
    }

    /// Total number of records.
    pub fn count_records(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM counts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete all records in `[start, end)`.
    pub fn delete_range(&mut self, start: PrimitiveDateTime, end: PrimitiveDateTime) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM counts WHERE timestamp >= ?1 AND timestamp < ?2",
            [format_wall_clock(start), format_wall_clock(end)],
        )?;
        debug!(
            "Deleted {} records in [{}, {})",
            deleted,
            format_wall_clock(start),
            format_wall_clock(end)
        );
        Ok(deleted)
    }

    /// Insert records whose hour has no history yet.
    ///
    /// A record is skipped when any row already exists in the same local
    /// hour. Runs in one transaction; returns `(inserted, skipped)`.
    pub fn bulk_insert_if_absent(&mut self, records: &[NewRecord]) -> Result<(usize, usize)> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        let mut skipped = 0;

        for record in records {
            let hour_start = record
                .timestamp
                .replace_minute(0)
                .and_then(|ts| ts.replace_second(0))
                .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
            let hour_end = hour_start + time::Duration::HOUR;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM counts WHERE timestamp >= ?1 AND timestamp < ?2)",
                [format_wall_clock(hour_start), format_wall_clock(hour_end)],
                |row| row.get(0),
            )?;
            if exists {
                skipped += 1;
                continue;
            }

            insert(&tx, record)?;
            inserted += 1;
        }

        tx.commit()?;
        Ok((inserted, skipped))
    }
}
