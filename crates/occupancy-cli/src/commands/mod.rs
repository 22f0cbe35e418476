//! Command implementations for the CLI.

mod import;
mod live;
mod records;
mod repair;
mod reset;
mod stats;

pub use import::cmd_import;
pub use live::cmd_live;
pub use records::{RecordsArgs, cmd_records};
pub use repair::cmd_fix_outliers;
pub use reset::cmd_reset;
pub use stats::cmd_stats;

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::format::format_json;

/// Print `value` as JSON, or the text rendering produced by `text`.
fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<()> {
    let out = match format {
        OutputFormat::Json => format_json(value)?,
        OutputFormat::Text => text(),
    };
    print!("{}", out);
    Ok(())
}
