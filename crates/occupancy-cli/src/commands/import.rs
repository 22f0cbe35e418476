//! Import command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use occupancy_store::Store;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_import_report};

pub fn cmd_import(
    store: &mut Store,
    file: &Path,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let report = store
        .import_csv_file(file)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    super::emit(format, &report, || format_import_report(&report, opts))
}
