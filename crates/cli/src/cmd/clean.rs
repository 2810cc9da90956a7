//! Implementation of the `xcforge clean` and `xcforge clean-deps` commands.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use xcforge_lib::clean::{CleanReport, CleanScope};
use xcforge_lib::config::Config;
use xcforge_lib::pipeline::run_clean;
use xcforge_lib::platform::PlatformId;

use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_clean(config: &Config, root: &Path, platform: Option<&str>, dry_run: bool, output: OutputFormat) -> Result<()> {
  let scope = match platform {
    Some(name) => CleanScope::Platform(name.parse::<PlatformId>()?),
    None => CleanScope::All,
  };
  run(config, root, scope, dry_run, output)
}

pub fn cmd_clean_deps(config: &Config, root: &Path, dry_run: bool, output: OutputFormat) -> Result<()> {
  run(config, root, CleanScope::Deps, dry_run, output)
}

fn run(config: &Config, root: &Path, scope: CleanScope, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let report = run_clean(config, root, scope, dry_run).context("Clean failed")?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, dry_run);
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}

fn print_report(report: &CleanReport, dry_run: bool) {
  for path in &report.removed {
    println!("  {}", path.display());
  }
  println!();
  if dry_run {
    print_info("Dry run - no changes made");
  } else if report.removed.is_empty() {
    print_info("Nothing to clean");
  } else {
    print_success("Clean complete!");
  }
  print_stat("Paths removed", &report.removed.len().to_string());
  print_stat("Space freed", &format_bytes(report.bytes_freed));
}
