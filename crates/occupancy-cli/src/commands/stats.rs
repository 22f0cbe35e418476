//! Stats command implementation.

use anyhow::{Context, Result};
use occupancy_store::Store;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use occupancy_types::formats::{format_date, iso_date};
use occupancy_types::{DailyBucket, HourlyBucket};

use crate::cli::{OutputFormat, StatsPeriod};
use crate::format::{FormatOptions, format_daily_text, format_hourly_text};

#[derive(Serialize)]
struct DayStats {
    #[serde(with = "iso_date")]
    date: time::Date,
    hours: Vec<HourlyBucket>,
}

#[derive(Serialize)]
struct WeekStats {
    #[serde(with = "iso_date")]
    start_date: time::Date,
    #[serde(with = "iso_date")]
    end_date: time::Date,
    days: Vec<DailyBucket>,
}

#[derive(Serialize)]
struct MonthStats {
    year: i32,
    month: u8,
    days: Vec<DailyBucket>,
}

pub fn cmd_stats(
    store: &Store,
    period: StatsPeriod,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let today = store.clock().today(OffsetDateTime::now_utc());

    match period {
        StatsPeriod::Today => {
            let stats = DayStats {
                date: today,
                hours: store.hourly_stats(today)?,
            };
            super::emit(format, &stats, || {
                format_hourly_text(stats.date, &stats.hours, opts)
            })
        }
        StatsPeriod::Week => {
            let start = today
                .checked_sub(Duration::days(6))
                .context("No week window before today")?;
            let stats = WeekStats {
                start_date: start,
                end_date: today,
                days: store.daily_stats(start, 7)?,
            };
            super::emit(format, &stats, || {
                format_daily_text(
                    &format!(
                        "Daily maxima {} to {}",
                        format_date(stats.start_date),
                        format_date(stats.end_date)
                    ),
                    &stats.days,
                    opts,
                )
            })
        }
        StatsPeriod::Month { year, month } => {
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(u8::from(today.month()));
            let stats = MonthStats {
                year,
                month,
                days: store.monthly_stats(year, month)?,
            };
            super::emit(format, &stats, || {
                format_daily_text(
                    &format!("Daily maxima for {}-{:02}", stats.year, stats.month),
                    &stats.days,
                    opts,
                )
            })
        }
    }
}
