//! Output formatting for live state, statistics and correction reports.

use serde::Serialize;
use tabled::{Table, Tabled};
use time::Date;
use time::format_description::well_known::Rfc3339;

use occupancy_store::{DaySummary, ForcedResetReport, HistoryRecord, ImportReport, OutlierReport};
use occupancy_types::formats::{format_date, format_wall_clock};
use occupancy_types::{DailyBucket, HourlyBucket, LiveState};

use crate::cli::StyleMode;
use crate::style;

/// Options for text output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub no_color: bool,
    pub style: StyleMode,
}

impl FormatOptions {
    pub fn new(no_color: bool, style: StyleMode) -> Self {
        Self { no_color, style }
    }

    fn table<T: Tabled>(&self, rows: impl IntoIterator<Item = T>) -> String {
        let mut table = Table::new(rows);
        style::apply_table_style(&mut table, self.style);
        format!("{}\n", table)
    }
}

/// Pretty-printed JSON followed by a newline.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value).map(|s| s + "\n")
}

/// Live counters.
#[must_use]
pub fn format_live_text(state: &LiveState, zone: &str, opts: &FormatOptions) -> String {
    let last_update = state
        .last_update
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "never".to_string());
    let reset_date = state
        .last_reset_date
        .map(format_date)
        .unwrap_or_else(|| "never".to_string());

    let mut out = style::format_title("Live occupancy", opts.no_color);
    out.push('\n');
    out.push_str(&format!(
        "Occupancy:  {}\n",
        style::format_occupancy(state.occupancy, opts.no_color)
    ));
    out.push_str(&format!("In:         {}\n", state.count_in));
    out.push_str(&format!("Out:        {}\n", state.count_out));
    out.push_str(&format!(
        "Lifetime:   {} in / {} out\n",
        state.lifetime_in(),
        state.lifetime_out()
    ));
    out.push_str(&format!("Updated:    {}\n", last_update));
    out.push_str(&format!("Reset date: {} ({})\n", reset_date, zone));
    out
}

#[derive(Tabled)]
struct HourRow {
    #[tabled(rename = "Hour")]
    hour: String,
    #[tabled(rename = "In")]
    total_in: u64,
    #[tabled(rename = "Out")]
    total_out: u64,
    #[tabled(rename = "Peak")]
    max_occupancy: u64,
}

/// Hourly buckets for one day.
#[must_use]
pub fn format_hourly_text(date: Date, hours: &[HourlyBucket], opts: &FormatOptions) -> String {
    let mut out = style::format_title(&format!("Hourly maxima for {}", format_date(date)), opts.no_color);
    out.push('\n');
    if hours.is_empty() {
        out.push_str("No records.\n");
        return out;
    }
    out.push_str(&opts.table(hours.iter().map(|h| HourRow {
        hour: format!("{:02}:00", h.hour),
        total_in: h.total_in,
        total_out: h.total_out,
        max_occupancy: h.max_occupancy,
    })));
    out
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "In")]
    total_in: u64,
    #[tabled(rename = "Out")]
    total_out: u64,
    #[tabled(rename = "Peak")]
    max_occupancy: u64,
}

/// Daily buckets under a title.
#[must_use]
pub fn format_daily_text(title: &str, days: &[DailyBucket], opts: &FormatOptions) -> String {
    let mut out = style::format_title(title, opts.no_color);
    out.push('\n');
    if days.is_empty() {
        out.push_str("No records.\n");
        return out;
    }
    out.push_str(&opts.table(days.iter().map(|d| DayRow {
        date: format_date(d.date),
        total_in: d.total_in,
        total_out: d.total_out,
        max_occupancy: d.max_occupancy,
    })));
    out
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "In")]
    count_in: u64,
    #[tabled(rename = "Out")]
    count_out: u64,
    #[tabled(rename = "Occupancy")]
    occupancy: u64,
}

/// History records.
#[must_use]
pub fn format_records_text(records: &[HistoryRecord], opts: &FormatOptions) -> String {
    if records.is_empty() {
        return "No records.\n".to_string();
    }
    let mut out = opts.table(records.iter().map(|r| RecordRow {
        id: r.id,
        timestamp: format_wall_clock(r.timestamp),
        count_in: r.count_in,
        count_out: r.count_out,
        occupancy: r.occupancy,
    }));
    out.push_str(&format!("{} record(s)\n", records.len()));
    out
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Rows")]
    rows: u64,
    #[tabled(rename = "Max in")]
    max_in: u64,
    #[tabled(rename = "Max out")]
    max_out: u64,
}

fn summary_table(summaries: &[DaySummary], opts: &FormatOptions) -> String {
    opts.table(summaries.iter().map(|s| SummaryRow {
        date: format_date(s.date),
        rows: s.rows,
        max_in: s.max_in,
        max_out: s.max_out,
    }))
}

/// Outlier repair with before/after summaries.
#[must_use]
pub fn format_outlier_report(report: &OutlierReport, opts: &FormatOptions) -> String {
    let mut out = style::format_title(
        &format!("Outlier repair (threshold {})", report.threshold),
        opts.no_color,
    );
    out.push_str("\n\nBefore:\n");
    out.push_str(&summary_table(&report.before, opts));
    out.push_str("\nAfter:\n");
    out.push_str(&summary_table(&report.after, opts));
    out.push('\n');

    let message = format!("Deleted {} row(s)", report.deleted);
    if report.deleted == 0 {
        out.push_str(&style::format_info(&message, opts.no_color));
    } else {
        out.push_str(&style::format_success(&message, opts.no_color));
    }
    out.push('\n');
    out
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "")]
    label: &'static str,
    #[tabled(rename = "In")]
    count_in: u64,
    #[tabled(rename = "Out")]
    count_out: u64,
    #[tabled(rename = "Occupancy")]
    occupancy: u64,
    #[tabled(rename = "Base in")]
    base_in: u64,
    #[tabled(rename = "Base out")]
    base_out: u64,
    #[tabled(rename = "Reset date")]
    reset_date: String,
}

impl StateRow {
    fn new(label: &'static str, state: &LiveState) -> Self {
        Self {
            label,
            count_in: state.count_in,
            count_out: state.count_out,
            occupancy: state.occupancy,
            base_in: state.base_in,
            base_out: state.base_out,
            reset_date: state
                .last_reset_date
                .map(format_date)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Forced reset with the live state before and after.
#[must_use]
pub fn format_reset_report(report: &ForcedResetReport, opts: &FormatOptions) -> String {
    let mut out = style::format_title("Forced reset", opts.no_color);
    out.push('\n');
    out.push_str(&opts.table([
        StateRow::new("Before", &report.before),
        StateRow::new("After", &report.after),
    ]));
    if let Some(purged) = &report.purged {
        out.push_str(&style::format_info(
            &format!(
                "Purged {} history row(s) for {}",
                purged.rows,
                format_date(purged.date)
            ),
            opts.no_color,
        ));
        out.push('\n');
    }
    out.push_str(&style::format_success("Live counters reset", opts.no_color));
    out.push('\n');
    out
}

#[derive(Tabled)]
struct TotalRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "In")]
    total_in: u64,
    #[tabled(rename = "Out")]
    total_out: u64,
    #[tabled(rename = "Net")]
    occupancy: u64,
}

/// CSV import result.
#[must_use]
pub fn format_import_report(report: &ImportReport, opts: &FormatOptions) -> String {
    let mut out = style::format_title("CSV import", opts.no_color);
    out.push('\n');
    if !report.day_totals.is_empty() {
        out.push_str(&opts.table(report.day_totals.iter().map(|t| TotalRow {
            date: format_date(t.date),
            total_in: t.total_in,
            total_out: t.total_out,
            occupancy: t.occupancy(),
        })));
    }
    out.push_str(&format!(
        "Rows read: {}, days: {}, hours inserted: {}, hours skipped: {}\n",
        report.rows_read, report.days, report.inserted, report.skipped
    ));
    for error in &report.errors {
        out.push_str(&style::format_warning(error, opts.no_color));
        out.push('\n');
    }
    if report.errors.is_empty() {
        out.push_str(&style::format_success("Import complete", opts.no_color));
    } else {
        out.push_str(&style::format_warning(
            &format!("Import complete with {} bad row(s)", report.errors.len()),
            opts.no_color,
        ));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use occupancy_store::DayTotal;
    use time::macros::{date, datetime};

    fn plain() -> FormatOptions {
        FormatOptions::new(true, StyleMode::Plain)
    }

    #[test]
    fn test_live_text() {
        let mut state = LiveState::new(date!(2026 - 02 - 10));
        state.apply_delta(12, 5, datetime!(2026-02-10 08:00:00 UTC));
        state.base_in = 100;

        let text = format_live_text(&state, "Europe/Berlin", &plain());
        assert!(text.contains("Occupancy:  7"));
        assert!(text.contains("Lifetime:   112 in / 5 out"));
        assert!(text.contains("2026-02-10T08:00:00Z"));
        assert!(text.contains("2026-02-10 (Europe/Berlin)"));
    }

    #[test]
    fn test_hourly_text() {
        let hours = [HourlyBucket {
            hour: 8,
            total_in: 9,
            total_out: 3,
            max_occupancy: 6,
        }];
        let text = format_hourly_text(date!(2026 - 02 - 10), &hours, &plain());
        assert!(text.contains("Hourly maxima for 2026-02-10"));
        assert!(text.contains("08:00"));

        let empty = format_hourly_text(date!(2026 - 02 - 10), &[], &plain());
        assert!(empty.contains("No records."));
    }

    #[test]
    fn test_records_text() {
        let records = [HistoryRecord {
            id: 1,
            timestamp: datetime!(2026-02-10 08:10:00),
            count_in: 5,
            count_out: 2,
            occupancy: 3,
        }];
        let text = format_records_text(&records, &plain());
        assert!(text.contains("2026-02-10 08:10:00"));
        assert!(text.ends_with("1 record(s)\n"));
    }

    #[test]
    fn test_outlier_report_text() {
        let summary = |rows, max_in| DaySummary {
            date: date!(2026 - 02 - 07),
            rows,
            max_in,
            max_out: 100,
        };
        let report = OutlierReport {
            threshold: 800,
            before: vec![summary(3, 900)],
            deleted: 1,
            after: vec![summary(2, 200)],
        };
        let text = format_outlier_report(&report, &plain());
        assert!(text.contains("threshold 800"));
        assert!(text.contains("Before:"));
        assert!(text.contains("900"));
        assert!(text.contains("[OK] Deleted 1 row(s)"));
    }

    #[test]
    fn test_import_report_text() {
        let report = ImportReport {
            rows_read: 4,
            days: 1,
            inserted: 2,
            skipped: 0,
            errors: vec!["line 3: bad".to_string()],
            day_totals: vec![DayTotal {
                date: date!(2026 - 01 - 31),
                total_in: 3,
                total_out: 3,
            }],
        };
        let text = format_import_report(&report, &plain());
        assert!(text.contains("2026-01-31"));
        assert!(text.contains("[!!] line 3: bad"));
        assert!(text.contains("with 1 bad row(s)"));
    }

    #[test]
    fn test_json_output() {
        let state = LiveState::new(date!(2026 - 02 - 10));
        let json = format_json(&state).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["last_reset_date"], "2026-02-10");
    }
}
