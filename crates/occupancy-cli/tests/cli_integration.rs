//! CLI Integration Tests
//!
//! These tests run the `occupancy` binary against a throwaway database.
//!
//! ```
//! cargo test --package occupancy-cli --test cli_integration
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const EXPORT: &str = "from-time,to-time,Forward counter,Backward counter
31/01/2026 - 19:28,31/01/2026 - 19:29,2,0
31/01/2026 - 19:29,31/01/2026 - 19:30,1,1
31/01/2026 - 20:01,31/01/2026 - 20:02,0,2
01/02/2026 - 08:15,01/02/2026 - 08:16,4,0
";

/// A temp directory holding a config file and a database path.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("server.toml"),
            "[clock]\ntimezone = \"UTC\"\n\n[repair]\noutlier_threshold = 800\n",
        )
        .unwrap();
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("server.toml")
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("data").join("occupancy.db")
    }

    fn write_export(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("export.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Run the binary with this workspace's config and database.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_occupancy"))
            .arg("--config")
            .arg(self.config())
            .arg("--database")
            .arg(self.database())
            .arg("--no-color")
            .args(args)
            .env_remove("OCCUPANCY_STYLE")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run occupancy binary")
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--format", "json"];
        full.extend_from_slice(args);
        let output = self.run(&full);
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "invalid JSON from {:?}: {}\n{}",
                args,
                e,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn plain(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_occupancy"))
        .args(args)
        .output()
        .expect("Failed to run occupancy binary")
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let output = plain(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["import", "fix-outliers", "reset", "live", "stats", "records"] {
        assert!(text.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_version() {
    let output = plain(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("occupancy"));
}

#[test]
fn test_unknown_command_is_a_usage_error() {
    let output = plain(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_fix_outliers_requires_date() {
    let output = plain(&["fix-outliers"]);
    assert_eq!(output.status.code(), Some(2));
}

// =============================================================================
// Commands against a temp database
// =============================================================================

#[test]
fn test_live_on_fresh_database() {
    let ws = Workspace::new();
    let live = ws.run_json(&["live"]);

    assert_eq!(live["count_in"], 0);
    assert_eq!(live["count_out"], 0);
    assert_eq!(live["occupancy"], 0);
    assert!(live["last_reset_date"].is_string());
    assert!(Path::new(&ws.database()).exists());
}

#[test]
fn test_live_text_output() {
    let ws = Workspace::new();
    let output = ws.run(&["live"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Occupancy"));
}

#[test]
fn test_import_then_records() {
    let ws = Workspace::new();
    let csv = ws.write_export(EXPORT);

    let report = ws.run_json(&["import", csv.to_str().unwrap()]);
    assert_eq!(report["rows_read"], 4);
    assert_eq!(report["days"], 2);
    assert_eq!(report["inserted"], 3);
    assert_eq!(report["skipped"], 0);

    let records = ws.run_json(&["records", "--since", "2026-01-31", "--until", "2026-02-01"]);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["timestamp"], "2026-01-31 19:30:00");
    assert_eq!(records[0]["count_in"], 3);
    assert_eq!(records[0]["count_out"], 1);
    assert_eq!(records[1]["occupancy"], 0);

    // Importing the same file again changes nothing.
    let again = ws.run_json(&["import", csv.to_str().unwrap()]);
    assert_eq!(again["inserted"], 0);
    assert_eq!(again["skipped"], 3);
}

#[test]
fn test_records_limit_and_order() {
    let ws = Workspace::new();
    let csv = ws.write_export(EXPORT);
    ws.run_json(&["import", csv.to_str().unwrap()]);

    let records = ws.run_json(&["records", "--newest-first", "-n", "1"]);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["timestamp"], "2026-02-01 08:30:00");
}

#[test]
fn test_import_missing_file_fails() {
    let ws = Workspace::new();
    let output = ws.run(&["import", "/nonexistent/export.csv"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to import"));
}

#[test]
fn test_fix_outliers_deletes_rows_above_threshold() {
    let ws = Workspace::new();
    let csv = ws.write_export(
        "from-time,to-time,Forward counter,Backward counter
07/02/2026 - 10:00,07/02/2026 - 10:01,5,1
07/02/2026 - 11:00,07/02/2026 - 11:01,900,0
",
    );
    ws.run_json(&["import", csv.to_str().unwrap()]);

    let report = ws.run_json(&["fix-outliers", "--date", "2026-02-07", "--threshold", "100"]);
    assert_eq!(report["threshold"], 100);
    assert_eq!(report["deleted"], 1);
    assert_eq!(report["before"][0]["rows"], 2);
    assert_eq!(report["after"][0]["rows"], 1);
    assert_eq!(report["after"][0]["max_in"], 5);
}

#[test]
fn test_fix_outliers_uses_config_threshold() {
    let ws = Workspace::new();
    let report = ws.run_json(&["fix-outliers", "--date", "2026-02-07"]);
    assert_eq!(report["threshold"], 800);
    assert_eq!(report["deleted"], 0);
}

#[test]
fn test_reset_with_yes() {
    let ws = Workspace::new();
    let report = ws.run_json(&["reset", "--yes"]);
    assert_eq!(report["after"]["count_in"], 0);
    assert_eq!(report["after"]["occupancy"], 0);
    assert!(report["purged"].is_null());
}

#[test]
fn test_reset_without_terminal_does_nothing() {
    let ws = Workspace::new();
    let output = ws.run(&["reset"]);
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--yes"));
}

#[test]
fn test_stats_month_json() {
    let ws = Workspace::new();
    let csv = ws.write_export(EXPORT);
    ws.run_json(&["import", csv.to_str().unwrap()]);

    let stats = ws.run_json(&["stats", "month", "2026", "1"]);
    assert_eq!(stats["year"], 2026);
    assert_eq!(stats["month"], 1);
    let days = stats["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], "2026-01-31");
    assert_eq!(days[0]["total_in"], 3);
    assert_eq!(days[0]["total_out"], 3);
}

#[test]
fn test_stats_today_and_week_on_empty_database() {
    let ws = Workspace::new();
    let today = ws.run_json(&["stats", "today"]);
    assert!(today["hours"].is_array());

    let week = ws.run_json(&["stats", "week"]);
    assert!(week["days"].is_array());
    assert!(week["start_date"].is_string());
}
