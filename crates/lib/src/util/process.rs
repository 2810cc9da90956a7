//! Running external tools (archivers, `lipo`, `xcodebuild`).

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::consts::SOURCE_DATE_EPOCH;

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to run {tool}: {source}")]
  Spawn {
    tool: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{tool} exited with code {code:?}: {stderr}")]
  Failed {
    tool: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// Output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Run `program` with `args`, optionally feeding `stdin`.
///
/// Archives get deterministic timestamps through `ZERO_AR_DATE` and
/// `SOURCE_DATE_EPOCH`.
pub async fn run_tool(program: &str, args: &[String], stdin: Option<&str>) -> Result<ToolOutput, ToolError> {
  run(program, args, stdin, None).await
}

/// [`run_tool`] with `cwd` as the working directory.
pub async fn run_tool_in(
  program: &str,
  args: &[String],
  stdin: Option<&str>,
  cwd: &Path,
) -> Result<ToolOutput, ToolError> {
  run(program, args, stdin, Some(cwd)).await
}

async fn run(program: &str, args: &[String], stdin: Option<&str>, cwd: Option<&Path>) -> Result<ToolOutput, ToolError> {
  debug!(tool = %program, args = ?args, cwd = ?cwd, "running tool");

  let spawn_err = |source| ToolError::Spawn {
    tool: program.to_string(),
    source,
  };

  let mut command = Command::new(program);
  if let Some(dir) = cwd {
    command.current_dir(dir);
  }
  let mut child = command
    .args(args)
    .env("ZERO_AR_DATE", "1")
    .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
    .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .map_err(spawn_err)?;

  if let Some(input) = stdin
    && let Some(mut pipe) = child.stdin.take()
  {
    pipe.write_all(input.as_bytes()).await.map_err(spawn_err)?;
    // Closing stdin lets the tool see end of input
    drop(pipe);
  }

  let output = child.wait_with_output().await.map_err(spawn_err)?;
  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

  if !output.status.success() {
    return Err(ToolError::Failed {
      tool: program.to_string(),
      code: output.status.code(),
      stderr: stderr.trim().to_string(),
    });
  }

  Ok(ToolOutput { stdout, stderr })
}
