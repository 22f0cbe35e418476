//! Bulk import of per-minute sensor exports.
//!
//! The sensor's CSV export has one row per minute:
//!
//! ```text
//! from-time,to-time,Forward counter,Backward counter
//! 31/01/2026 - 19:28,31/01/2026 - 19:29,2,0
//! ```
//!
//! Minutes are summed per local hour and written as one cumulative-since-
//! midnight snapshot per hour at `HH:30:00`, which is the same shape the
//! live pipeline produces. Hours that already have history are left alone,
//! so re-importing a file is harmless.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{DayTotal, ImportReport, NewRecord};
use crate::store::Store;

const EXPORT_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] - [hour]:[minute]");

const FROM_COLUMN: &str = "from-time";
const FORWARD_COLUMN: &str = "forward counter";
const BACKWARD_COLUMN: &str = "backward counter";

/// Parse an export timestamp such as `31/01/2026 - 19:28`.
pub fn parse_export_timestamp(s: &str) -> std::result::Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(s.trim(), EXPORT_TIMESTAMP)
}

/// Column positions of the fields the import needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    from: usize,
    forward: usize,
    backward: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let position = |name: &str| {
            headers.iter().position(|h| {
                h.trim_start_matches('\u{feff}')
                    .trim()
                    .eq_ignore_ascii_case(name)
            })
        };

        match (
            position(FROM_COLUMN),
            position(FORWARD_COLUMN),
            position(BACKWARD_COLUMN),
        ) {
            (Some(from), Some(forward), Some(backward)) => Self {
                from,
                forward,
                backward,
            },
            _ => {
                warn!(
                    "CSV headers {:?} not recognized, assuming export column order",
                    headers
                );
                Self {
                    from: 0,
                    forward: 2,
                    backward: 3,
                }
            }
        }
    }
}

fn counter(record: &csv::StringRecord, index: usize, name: &str) -> std::result::Result<u64, String> {
    match record.get(index).map(str::trim) {
        None | Some("") => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|e| format!("{name} {value:?}: {e}")),
    }
}

/// Hourly per-minute sums keyed by date and hour.
type HourlySums = BTreeMap<Date, BTreeMap<u8, (u64, u64)>>;

fn read_hourly_sums<R: Read>(reader: R, report: &mut ImportReport) -> Result<HourlySums> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::from_headers(reader.headers()?);
    debug!("CSV columns: {:?}", columns);

    let mut sums = HourlySums::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                report.errors.push(format!("line {line}: {e}"));
                continue;
            }
        };

        let counts = counter(&record, columns.forward, "forward counter").and_then(|fw| {
            counter(&record, columns.backward, "backward counter").map(|bw| (fw, bw))
        });
        let (forward, backward) = match counts {
            Ok(counts) => counts,
            Err(e) => {
                report.errors.push(format!("line {line}: {e}"));
                continue;
            }
        };
        if forward == 0 && backward == 0 {
            continue;
        }

        let from = record.get(columns.from).unwrap_or_default();
        if from.is_empty() {
            continue;
        }
        let start = match parse_export_timestamp(from) {
            Ok(ts) => ts,
            Err(e) => {
                report.errors.push(format!("line {line}: from-time {from:?}: {e}"));
                continue;
            }
        };

        let hour = sums
            .entry(start.date())
            .or_default()
            .entry(start.hour())
            .or_insert((0, 0));
        hour.0 += forward;
        hour.1 += backward;
        report.rows_read += 1;
    }

    Ok(sums)
}

/// Turn hourly sums into per-day cumulative snapshots at half past each hour.
fn cumulative_snapshots(sums: &HourlySums) -> Result<(Vec<NewRecord>, Vec<DayTotal>)> {
    let mut records = Vec::new();
    let mut totals = Vec::with_capacity(sums.len());

    for (&date, hours) in sums {
        let mut total_in = 0u64;
        let mut total_out = 0u64;

        for (&hour, &(forward, backward)) in hours {
            total_in += forward;
            total_out += backward;
            let time = Time::from_hms(hour, 30, 0)
                .map_err(|e| Error::InvalidTimestamp(e.to_string()))?;
            records.push(NewRecord::new(
                PrimitiveDateTime::new(date, time),
                total_in,
                total_out,
            ));
        }

        totals.push(DayTotal {
            date,
            total_in,
            total_out,
        });
    }

    Ok((records, totals))
}

impl Store {
    /// Import a per-minute CSV export.
    ///
    /// Malformed rows are collected in [`ImportReport::errors`] and skipped;
    /// only storage and unreadable-file errors fail the import.
    pub fn import_csv<R: Read>(&mut self, reader: R) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        let sums = read_hourly_sums(reader, &mut report)?;
        let (records, totals) = cumulative_snapshots(&sums)?;

        let (inserted, skipped) = self.bulk_insert_if_absent(&records)?;
        report.days = totals.len();
        report.inserted = inserted;
        report.skipped = skipped;
        report.day_totals = totals;

        info!(
            "CSV import: {} rows over {} days, {} hours inserted, {} skipped, {} errors",
            report.rows_read,
            report.days,
            report.inserted,
            report.skipped,
            report.errors.len()
        );

        Ok(report)
    }

    /// Import a per-minute CSV export from a file.
    pub fn import_csv_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ImportReport> {
        let file = std::fs::File::open(path.as_ref())?;
        self.import_csv(std::io::BufReader::new(file))
    }
}
