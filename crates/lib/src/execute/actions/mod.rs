//! Action execution module.
//!
//! This module provides the dispatch logic for running the steps of a task.

pub mod cmd;
pub mod fetch;
pub mod unpack;

use std::path::Path;

use crate::config::Tools;
use crate::execute::types::ExecuteError;
use crate::graph::Action;

pub use cmd::execute_cmd;
pub use fetch::execute_fetch;
pub use unpack::execute_unpack;

/// What actions need beyond their own fields.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
  pub tools: &'a Tools,
  pub shell: Option<&'a str>,
}

/// Execute a single action, appending anything worth keeping to `log`.
pub async fn execute_action(action: &Action, ctx: ActionContext<'_>, log: &mut String) -> Result<(), ExecuteError> {
  let summary = match action {
    Action::Fetch { url, dest, sha256 } => execute_fetch(url, dest, sha256.as_deref()).await?,
    Action::Unpack { archive, dest } => execute_unpack(archive, dest).await?,
    Action::Cmd { script, cwd } => {
      execute_cmd(script, cwd, ctx.shell, log).await?;
      return Ok(());
    }
    Action::Stamp { path } => {
      write_stamp(path).await?;
      return Ok(());
    }
    Action::Link(request) => crate::link::link_platform(request, ctx.tools).await?,
    Action::Merge(request) => crate::fat::merge_fat(request, ctx.tools).await?,
    Action::Package(request) => crate::package::package(request, ctx.tools).await?,
  };

  log.push_str(&summary);
  log.push('\n');
  Ok(())
}

/// Truncating the stamp refreshes its modification time.
async fn write_stamp(path: &Path) -> Result<(), ExecuteError> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(path, b"").await?;
  Ok(())
}
