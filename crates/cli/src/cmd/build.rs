//! Implementation of the `xcforge build` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use xcforge_lib::config::Config;
use xcforge_lib::execute::ExecutionReport;
use xcforge_lib::pipeline::{BuildOptions, run_build};

use crate::output::{
  OutputFormat, format_duration, print_captured, print_error, print_info, print_json, print_stat, print_success, print_warning,
};

#[derive(Serialize)]
struct BuildJson<'a> {
  success: bool,
  root: &'a Path,
  bundle: Option<&'a PathBuf>,
  log_file: &'a Path,
  duration_ms: u128,
  report: &'a ExecutionReport,
}

/// Execute the build command.
///
/// Runs every stale task and prints a summary. Exits non-zero when any task
/// failed or was blocked.
pub fn cmd_build(config: &Config, root: &Path, jobs: Option<usize>, force: bool, output: OutputFormat) -> Result<()> {
  let options = BuildOptions { jobs, force };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(run_build(config, root, &options)).context("Build failed to start")?;
  let report = &outcome.report;

  if output.is_json() {
    print_json(&BuildJson {
      success: report.is_success(),
      root: &outcome.root,
      bundle: outcome.bundle.as_ref(),
      log_file: &outcome.log_file,
      duration_ms: outcome.duration.as_millis(),
      report,
    })?;
  } else {
    for failure in &report.failed {
      print_error(&format!("{}: {}", failure.task, failure.error));
      print_captured(&failure.output);
    }
    for blocked in &report.blocked {
      print_warning(&format!("{} blocked by failed {}", blocked.task, blocked.cause));
    }

    println!();
    if !report.is_success() {
      print_error("Build failed");
    } else if report.executed.is_empty() {
      print_info("Everything up to date");
    } else {
      print_success("Build complete!");
    }
    print_stat("Executed", &report.executed.len().to_string());
    print_stat("Up to date", &report.up_to_date.len().to_string());
    if !report.is_success() {
      print_stat("Failed", &report.failed.len().to_string());
      print_stat("Blocked", &report.blocked.len().to_string());
    }
    if let Some(bundle) = &outcome.bundle {
      print_stat("Bundle", &bundle.display().to_string());
    }
    print_stat("Log", &outcome.log_file.display().to_string());
    print_stat("Duration", &format_duration(outcome.duration));
  }

  if !report.is_success() {
    bail!(
      "{} task(s) failed, {} blocked; see {}",
      report.failed.len(),
      report.blocked.len(),
      outcome.log_file.display()
    );
  }

  Ok(())
}
