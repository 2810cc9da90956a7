//! Cmd action implementation.
//!
//! Recipe scripts run through `/bin/sh -c` in the dependency's source tree.
//! The inherited environment is kept because the scripts need the host
//! toolchain (`xcrun`, `make`, `cmake`) from `PATH`.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::SOURCE_DATE_EPOCH;
use crate::execute::types::ExecuteError;

/// Execute a Cmd action.
///
/// Stdout and stderr are appended to `log` whether or not the command
/// succeeds.
pub async fn execute_cmd(script: &str, cwd: &Path, shell: Option<&str>, log: &mut String) -> Result<(), ExecuteError> {
  let summary = summarize(script);
  info!(cmd = %summary, cwd = %cwd.display(), "executing command");

  let (shell_cmd, shell_args) = get_shell(shell);

  let mut command = Command::new(&shell_cmd);
  command
    .args(&shell_args)
    .arg(script)
    .current_dir(cwd)
    .env("LANG", "C")
    .env("LC_ALL", "C")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
    // Makes Apple's ar/libtool write zero member timestamps
    .env("ZERO_AR_DATE", "1");

  debug!(shell = %shell_cmd, "spawning process");

  let output = command.output().await?;

  log.push_str(&format!("$ {summary}\n"));
  log.push_str(&String::from_utf8_lossy(&output.stdout));
  log.push_str(&String::from_utf8_lossy(&output.stderr));

  if !output.status.success() {
    return Err(ExecuteError::CmdFailed {
      cmd: summary,
      code: output.status.code(),
    });
  }

  Ok(())
}

/// Last non-empty line of a script; the prelude lines are identical for
/// every recipe and only add noise to messages.
fn summarize(script: &str) -> String {
  script
    .lines()
    .rev()
    .map(str::trim)
    .find(|line| !line.is_empty())
    .unwrap_or_default()
    .to_string()
}

/// Get the shell command and argument.
///
/// `/bin/sh` is used unless overridden; interactive shells may source profile
/// files that change the environment between runs.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  match override_shell {
    Some(shell) => (shell.to_string(), vec!["-c".to_string()]),
    None => ("/bin/sh".to_string(), vec!["-c".to_string()]),
  }
}
