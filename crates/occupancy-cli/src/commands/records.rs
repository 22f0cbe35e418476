//! Records command implementation.

use anyhow::Result;
use occupancy_store::{RecordQuery, Store};
use time::PrimitiveDateTime;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_records_text};

/// Arguments for the records command.
pub struct RecordsArgs {
    pub since: Option<PrimitiveDateTime>,
    pub until: Option<PrimitiveDateTime>,
    pub limit: u32,
    pub newest_first: bool,
}

impl RecordsArgs {
    fn query(&self) -> RecordQuery {
        let mut query = RecordQuery::new();
        if let Some(since) = self.since {
            query = query.since(since);
        }
        if let Some(until) = self.until {
            query = query.until(until);
        }
        if self.limit > 0 {
            query = query.limit(self.limit);
        }
        if self.newest_first {
            query = query.newest_first();
        }
        query
    }
}

pub fn cmd_records(
    store: &Store,
    args: RecordsArgs,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    let records = store.query_records(&args.query())?;

    super::emit(format, &records, || format_records_text(&records, opts))
}
