//! Correction tools: outlier repair and forced reset.
//!
//! Both are operator-invoked and idempotent. They report the affected data
//! before and after the change so the operator can verify the result.

use rusqlite::{Connection, TransactionBehavior};
use time::{Date, OffsetDateTime};
use tracing::info;

use occupancy_types::StatsWindow;
use occupancy_types::formats::{format_date, format_wall_clock};

use crate::error::Result;
use crate::models::{DaySummary, ForcedResetReport, OutlierReport};
use crate::store::{Store, read_live, write_live};

/// Default threshold above which a counter is considered an outlier.
pub const DEFAULT_OUTLIER_THRESHOLD: u64 = 800;

/// Delete history rows whose counters exceed a threshold on given days.
///
/// Outliers typically come from an absolute sensor total stored as if it
/// were a per-day value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlierRepair {
    /// Local calendar days to repair.
    pub dates: Vec<Date>,
    /// Rows with `count_in` or `count_out` above this are deleted.
    pub threshold: u64,
}

impl OutlierRepair {
    /// Repair `dates` with the default threshold.
    pub fn new(dates: impl IntoIterator<Item = Date>) -> Self {
        let mut dates: Vec<Date> = dates.into_iter().collect();
        dates.sort();
        dates.dedup();
        Self {
            dates,
            threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }

    /// Override the threshold.
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }
}

fn summarize(conn: &Connection, date: Date) -> Result<DaySummary> {
    let window = StatsWindow::day(date)?;
    let (rows, max_in, max_out): (i64, u64, u64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(MAX(count_in), 0), COALESCE(MAX(count_out), 0)
         FROM counts WHERE timestamp >= ?1 AND timestamp < ?2",
        [format_wall_clock(window.start), format_wall_clock(window.end)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(DaySummary {
        date,
        rows: rows as u64,
        max_in,
        max_out,
    })
}

impl Store {
    /// Row count and maxima of one day's history.
    pub fn day_summary(&self, date: Date) -> Result<DaySummary> {
        summarize(&self.conn, date)
    }

    /// Delete outlier rows on the configured days.
    pub fn repair_outliers(&mut self, repair: &OutlierRepair) -> Result<OutlierReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let before = repair
            .dates
            .iter()
            .map(|&date| summarize(&tx, date))
            .collect::<Result<Vec<_>>>()?;

        let mut deleted = 0;
        for &date in &repair.dates {
            let window = StatsWindow::day(date)?;
            deleted += tx.execute(
                "DELETE FROM counts
                 WHERE timestamp >= ?1 AND timestamp < ?2
                   AND (count_in > ?3 OR count_out > ?3)",
                rusqlite::params![
                    format_wall_clock(window.start),
                    format_wall_clock(window.end),
                    repair.threshold,
                ],
            )?;
        }

        let after = repair
            .dates
            .iter()
            .map(|&date| summarize(&tx, date))
            .collect::<Result<Vec<_>>>()?;

        tx.commit()?;

        info!(
            "Outlier repair removed {} rows above {} on {} day(s)",
            deleted,
            repair.threshold,
            repair.dates.len()
        );

        Ok(OutlierReport {
            threshold: repair.threshold,
            before,
            deleted,
            after,
        })
    }

    /// Rebase the live counters now, regardless of the last reset date.
    ///
    /// With `purge_today`, today's history rows are deleted in the same
    /// transaction. The dedup cache is cleared so the next snapshot is
    /// always recorded.
    pub fn force_reset(
        &mut self,
        now: OffsetDateTime,
        purge_today: bool,
    ) -> Result<ForcedResetReport> {
        let today = self.clock.today(now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let before = read_live(&tx)?;

        let purged = if purge_today {
            let summary = summarize(&tx, today)?;
            let window = StatsWindow::day(today)?;
            tx.execute(
                "DELETE FROM counts WHERE timestamp >= ?1 AND timestamp < ?2",
                [format_wall_clock(window.start), format_wall_clock(window.end)],
            )?;
            Some(summary)
        } else {
            None
        };

        let mut after = before.clone();
        after.rebase(today);
        write_live(&tx, &after)?;
        tx.commit()?;

        self.dedup.clear();
        info!(
            "Forced reset on {}: base now {}/{}{}",
            format_date(today),
            after.base_in,
            after.base_out,
            purged
                .map(|s| format!(", purged {} history rows", s.rows))
                .unwrap_or_default()
        );

        Ok(ForcedResetReport {
            before,
            after,
            purged,
        })
    }
}
