//! Outlier repair command implementation.

use anyhow::Result;
use occupancy_store::{OutlierRepair, Store};
use time::Date;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_outlier_report};

pub fn cmd_fix_outliers(
    store: &mut Store,
    dates: Vec<Date>,
    threshold: u64,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let repair = OutlierRepair::new(dates).threshold(threshold);
    let report = store.repair_outliers(&repair)?;

    super::emit(format, &report, || format_outlier_report(&report, opts))
}
