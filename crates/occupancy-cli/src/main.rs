//! Operator command line for the live people counter.
//!
//! Works directly on the service database, so it can be used while the
//! service is stopped or alongside it (SQLite WAL allows one writer plus
//! readers).

mod cli;
mod commands;
mod format;
mod style;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use occupancy_service::Config;
use occupancy_store::Store;

use crate::cli::{Cli, Commands};
use crate::commands::RecordsArgs;
use crate::format::FormatOptions;

fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;
    let db_path: PathBuf = cli
        .database
        .clone()
        .unwrap_or_else(|| config.storage.path.clone());
    let clock = config
        .clock
        .local_clock()
        .context("Invalid [clock] timezone in configuration")?;

    tracing::debug!("Using database {} ({})", db_path.display(), clock);

    let mut store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?
        .with_clock(clock);

    let opts = FormatOptions::new(cli.no_color, cli.style);
    let format = cli.format;

    match cli.command {
        Commands::Import { file } => commands::cmd_import(&mut store, &file, format, &opts),
        Commands::FixOutliers { dates, threshold } => {
            let threshold = threshold.unwrap_or(config.repair.outlier_threshold);
            commands::cmd_fix_outliers(&mut store, dates, threshold, format, &opts)
        }
        Commands::Reset { purge_today, yes } => {
            commands::cmd_reset(&mut store, purge_today, yes, format, &opts)
        }
        Commands::Live => commands::cmd_live(&mut store, format, &opts),
        Commands::Stats { period } => commands::cmd_stats(&store, period, format, &opts),
        Commands::Records {
            since,
            until,
            limit,
            newest_first,
        } => commands::cmd_records(
            &store,
            RecordsArgs {
                since,
                until,
                limit,
                newest_first,
            },
            format,
            &opts,
        ),
    }
}
