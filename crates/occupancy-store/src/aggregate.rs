//! Aggregation engine: hourly, daily and monthly rollups.
//!
//! Every query groups the `counts` table directly inside a half-open window
//! and takes the maximum of each column. Buckets without records are not
//! returned.

use time::Date;

use occupancy_types::formats::{format_wall_clock, parse_date};
use occupancy_types::{DailyBucket, HourlyBucket, StatsWindow};

use crate::error::{Error, Result};
use crate::store::Store;

impl Store {
    /// Per-hour maxima for one local calendar day.
    pub fn hourly_stats(&self, date: Date) -> Result<Vec<HourlyBucket>> {
        let window = StatsWindow::day(date)?;
        self.hourly_buckets(&window)
    }

    /// Per-day maxima for `days` consecutive days starting at `start`.
    pub fn daily_stats(&self, start: Date, days: u16) -> Result<Vec<DailyBucket>> {
        let window = StatsWindow::days(start, days)?;
        self.daily_buckets(&window)
    }

    /// Per-day maxima for a calendar month.
    ///
    /// Months outside 1..=12 are [`Error::InvalidRange`].
    pub fn monthly_stats(&self, year: i32, month: u8) -> Result<Vec<DailyBucket>> {
        let window = StatsWindow::month(year, month)?;
        self.daily_buckets(&window)
    }

    /// Per-hour maxima within an arbitrary window.
    pub fn hourly_buckets(&self, window: &StatsWindow) -> Result<Vec<HourlyBucket>> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(strftime('%H', timestamp) AS INTEGER) AS hour,
                    MAX(count_in), MAX(count_out), MAX(occupancy)
             FROM counts
             WHERE timestamp >= ?1 AND timestamp < ?2
             GROUP BY hour
             ORDER BY hour",
        )?;

        let buckets = stmt
            .query_map(window_params(window), |row| {
                Ok(HourlyBucket {
                    hour: row.get(0)?,
                    total_in: row.get(1)?,
                    total_out: row.get(2)?,
                    max_occupancy: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(buckets)
    }

    /// Per-day maxima within an arbitrary window.
    pub fn daily_buckets(&self, window: &StatsWindow) -> Result<Vec<DailyBucket>> {
        let mut stmt = self.conn.prepare(
            "SELECT date(timestamp) AS day,
                    MAX(count_in), MAX(count_out), MAX(occupancy)
             FROM counts
             WHERE timestamp >= ?1 AND timestamp < ?2
             GROUP BY day
             ORDER BY day",
        )?;

        let rows = stmt
            .query_map(window_params(window), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(day, total_in, total_out, max_occupancy)| {
                let date = parse_date(&day)
                    .map_err(|e| Error::InvalidTimestamp(format!("{day:?}: {e}")))?;
                Ok(DailyBucket {
                    date,
                    total_in,
                    total_out,
                    max_occupancy,
                })
            })
            .collect()
    }
}

fn window_params(window: &StatsWindow) -> [String; 2] {
    [format_wall_clock(window.start), format_wall_clock(window.end)]
}
