//! Implementation of the `xcforge plan` command.

use std::path::Path;

use anyhow::Result;

use xcforge_lib::config::Config;
use xcforge_lib::pipeline::plan;

use crate::output::{OutputFormat, print_info, print_json, print_task};

/// Show the tasks a build would run, grouped by wave.
pub fn cmd_plan(config: &Config, root: &Path, force: bool, output: OutputFormat) -> Result<()> {
  let entries = plan(config, root, force)?;

  if output.is_json() {
    return print_json(&entries);
  }

  let stale = entries.iter().filter(|e| e.reason.is_some()).count();
  if stale == 0 {
    print_info("Everything up to date");
    return Ok(());
  }

  let mut wave = None;
  for entry in &entries {
    let Some(reason) = &entry.reason else {
      continue;
    };
    if wave != Some(entry.wave) {
      wave = Some(entry.wave);
      println!("wave {}", entry.wave);
    }
    print_task(&entry.task.to_string(), &reason.to_string());
  }

  println!();
  print_info(&format!("{stale} of {} tasks would run", entries.len()));

  Ok(())
}
