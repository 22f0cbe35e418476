//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use time::{Date, PrimitiveDateTime, Time};

use occupancy_types::formats::{parse_date, parse_wall_clock};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Visual styling mode for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StyleMode {
    /// Rounded tables and colors (default)
    #[default]
    Rich,
    /// Plain text with no decorations (for scripting)
    Plain,
}

#[derive(Parser)]
#[command(name = "occupancy")]
#[command(author, version, about = "Operator tools for the live people counter", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Visual styling mode (rich, plain)
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "rich",
        env = "OCCUPANCY_STYLE"
    )]
    pub style: StyleMode,

    /// Path to the service configuration file
    #[arg(short, long, global = true, env = "OCCUPANCY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(short, long, global = true, env = "OCCUPANCY_DB")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a per-minute CSV export from the sensor
    Import {
        /// CSV file (from-time,to-time,Forward counter,Backward counter)
        file: PathBuf,
    },

    /// Delete history rows with implausible counters on given days
    FixOutliers {
        /// Day to repair (YYYY-MM-DD); repeat or comma-separate for several
        #[arg(
            long = "date",
            required = true,
            value_delimiter = ',',
            value_parser = parse_date_arg
        )]
        dates: Vec<Date>,

        /// Rows with a counter above this are deleted (default from config)
        #[arg(short, long)]
        threshold: Option<u64>,
    },

    /// Reset the live counters now
    Reset {
        /// Also delete today's history rows
        #[arg(long)]
        purge_today: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the live counters
    Live,

    /// Show aggregated statistics
    Stats {
        #[command(subcommand)]
        period: StatsPeriod,
    },

    /// List history records
    Records {
        /// Records at or after this local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS")
        #[arg(long, value_parser = parse_wall_clock_arg)]
        since: Option<PrimitiveDateTime>,

        /// Records before this local time (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS")
        #[arg(long, value_parser = parse_wall_clock_arg)]
        until: Option<PrimitiveDateTime>,

        /// Maximum number of records (0 for all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: u32,

        /// Newest records first
        #[arg(long)]
        newest_first: bool,
    },
}

/// Statistics periods
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum StatsPeriod {
    /// Hourly maxima for today
    Today,
    /// Daily maxima for the last seven days
    Week,
    /// Daily maxima for a month (current month if omitted)
    Month {
        /// Year, e.g. 2026
        #[arg(requires = "month")]
        year: Option<i32>,
        /// Month, 1-12
        #[arg(value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,
    },
}

/// Parse a calendar date argument.
fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s.trim()).map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

/// Parse a local wall time, accepting a bare date as midnight.
fn parse_wall_clock_arg(s: &str) -> Result<PrimitiveDateTime, String> {
    let s = s.trim();
    if let Ok(ts) = parse_wall_clock(s) {
        return Ok(ts);
    }
    parse_date(s)
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT))
        .map_err(|_| {
            format!(
                "Invalid time '{}'. Use YYYY-MM-DD or \"YYYY-MM-DD HH:MM:SS\"",
                s
            )
        })
}
