//! Forced reset command implementation.

use std::io::{self, IsTerminal};

use anyhow::Result;
use dialoguer::{Confirm, theme::ColorfulTheme};
use occupancy_store::Store;
use time::OffsetDateTime;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_reset_report};
use crate::style;

pub fn cmd_reset(
    store: &mut Store,
    purge_today: bool,
    yes: bool,
    format: OutputFormat,
    opts: &FormatOptions,
) -> Result<()> {
    if !yes && !confirm(store, purge_today)? {
        eprintln!(
            "{}",
            style::format_info("Reset cancelled, nothing changed", opts.no_color)
        );
        return Ok(());
    }

    let report = store.force_reset(OffsetDateTime::now_utc(), purge_today)?;

    super::emit(format, &report, || format_reset_report(&report, opts))
}

/// Ask before resetting. Without a terminal the answer is no.
fn confirm(store: &Store, purge_today: bool) -> Result<bool> {
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
        eprintln!("Refusing to reset without confirmation. Pass --yes to skip the prompt.");
        return Ok(false);
    }

    let live = store.live()?;
    let mut prompt = format!(
        "Reset live counters (in {}, out {}, occupancy {}) to zero?",
        live.count_in, live.count_out, live.occupancy
    );
    if purge_today {
        prompt.push_str(" Today's history will be deleted.");
    }

    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
