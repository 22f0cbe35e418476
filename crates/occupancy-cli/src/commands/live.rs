//! Live command implementation.

use anyhow::Result;
use occupancy_store::Store;
use time::OffsetDateTime;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_live_text};

/// Show the live counters, running the daily reset first if one is due.
pub fn cmd_live(store: &mut Store, format: OutputFormat, opts: &FormatOptions) -> Result<()> {
    let state = store.init_live(OffsetDateTime::now_utc())?;
    let zone = store.clock().name();

    super::emit(format, &state, || format_live_text(&state, zone, opts))
}
