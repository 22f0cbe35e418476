//! Aggregation buckets and calendar windows.
//!
//! History records hold cumulative-since-reset snapshots, so a bucket's
//! totals are the *maximum* counter seen in the bucket (its end-of-period
//! value), never a sum.

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::error::CalendarError;
use crate::formats;

/// Per-hour rollup for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Highest cumulative entry counter in the hour.
    pub total_in: u64,
    /// Highest cumulative exit counter in the hour.
    pub total_out: u64,
    /// Peak occupancy in the hour.
    pub max_occupancy: u64,
}

/// Per-day rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    /// Local calendar date.
    #[serde(with = "formats::iso_date")]
    pub date: Date,
    /// Highest cumulative entry counter on the day.
    pub total_in: u64,
    /// Highest cumulative exit counter on the day.
    pub total_out: u64,
    /// Peak occupancy on the day.
    pub max_occupancy: u64,
}

/// Half-open local wall-time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    /// Inclusive start.
    pub start: PrimitiveDateTime,
    /// Exclusive end.
    pub end: PrimitiveDateTime,
}

impl StatsWindow {
    /// Window covering whole days `[start, end)`.
    pub fn dates(start: Date, end: Date) -> Self {
        Self {
            start: PrimitiveDateTime::new(start, Time::MIDNIGHT),
            end: PrimitiveDateTime::new(end, Time::MIDNIGHT),
        }
    }

    /// One calendar day.
    pub fn day(date: Date) -> Result<Self, CalendarError> {
        Self::days(date, 1)
    }

    /// `days` consecutive calendar days starting at `start`.
    pub fn days(start: Date, days: u16) -> Result<Self, CalendarError> {
        let end = start
            .checked_add(Duration::days(i64::from(days)))
            .ok_or_else(|| CalendarError::OutOfRange(format!("{} + {} days", start, days)))?;
        Ok(Self::dates(start, end))
    }

    /// A full calendar month.
    ///
    /// December ends at the first of January of the following year.
    pub fn month(year: i32, month: u8) -> Result<Self, CalendarError> {
        let month_enum = Month::try_from(month).map_err(|_| CalendarError::InvalidMonth(month))?;
        let start = Date::from_calendar_date(year, month_enum, 1)
            .map_err(|e| CalendarError::OutOfRange(e.to_string()))?;
        let (next_year, next_month) = if month_enum == Month::December {
            (year + 1, Month::January)
        } else {
            (year, month_enum.next())
        };
        let end = Date::from_calendar_date(next_year, next_month, 1)
            .map_err(|e| CalendarError::OutOfRange(e.to_string()))?;
        Ok(Self::dates(start, end))
    }
}
