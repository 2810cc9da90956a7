//! Types for task execution.
//!
//! This module defines the error type, the run report and the configuration
//! for running a task graph.

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::Tools;
use crate::fat::MergeError;
use crate::graph::TaskId;
use crate::link::LinkError;
use crate::package::PackageError;

/// Errors that can occur while running a task.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// HTTP request failed during a fetch.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// Archive could not be extracted.
  #[error("failed to unpack {archive}: {message}")]
  UnpackFailed { archive: PathBuf, message: String },

  /// Command execution failed.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  #[error(transparent)]
  Link(#[from] LinkError),

  #[error(transparent)]
  Merge(#[from] MergeError),

  #[error(transparent)]
  Package(#[from] PackageError),

  /// All actions succeeded but the declared output does not exist.
  #[error("task finished without producing {0}")]
  MissingOutput(PathBuf),

  /// The task panicked or was cancelled.
  #[error("task aborted: {0}")]
  Aborted(String),

  /// I/O error during execution.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// A task that ran and failed.
#[derive(Debug, Serialize)]
pub struct TaskFailure {
  pub task: TaskId,
  #[serde(serialize_with = "serialize_display")]
  pub error: ExecuteError,
  /// Last lines of the task's captured output, ending with the error.
  pub output: String,
}

/// A task that never ran because a prerequisite failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
  pub task: TaskId,
  /// The failed task that blocked it, possibly several edges upstream.
  pub cause: TaskId,
}

/// Outcome of running a task graph.
#[derive(Debug, Default, Serialize)]
pub struct ExecutionReport {
  /// Tasks that ran successfully, in completion order.
  pub executed: Vec<TaskId>,
  /// Tasks skipped because their output was current.
  pub up_to_date: Vec<TaskId>,
  pub failed: Vec<TaskFailure>,
  pub blocked: Vec<BlockedTask>,
}

impl ExecutionReport {
  /// Returns true if no task failed or was blocked.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.blocked.is_empty()
  }

  /// Returns the total number of tasks accounted for.
  pub fn total(&self) -> usize {
    self.executed.len() + self.up_to_date.len() + self.failed.len() + self.blocked.len()
  }
}

/// Configuration for running a task graph.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of tasks running at once. 1 runs tasks sequentially.
  pub jobs: usize,

  /// Treat every task as stale.
  pub force: bool,

  /// External tools used by merge and package tasks.
  pub tools: Tools,

  /// Shell for command actions. Defaults to `/bin/sh`.
  pub shell: Option<String>,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      jobs: 1,
      force: false,
      tools: Tools::default(),
      shell: None,
    }
  }
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(value)
}
