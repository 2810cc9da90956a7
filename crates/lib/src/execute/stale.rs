//! Staleness checks.
//!
//! A task is current when its output exists and is at least as new as every
//! input. Everything is judged from modification times, except that a
//! cached download with a pinned checksum must also match it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Serialize, Serializer};

use crate::graph::{Action, Task, TaskId};
use crate::util::hash::hash_file;

/// Why a task has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
  Forced,
  MissingOutput,
  /// A prerequisite ran during this invocation.
  DependencyExecuted(TaskId),
  MissingInput(PathBuf),
  NewerInput(PathBuf),
  /// A downloaded file no longer matches its pinned SHA-256.
  ChecksumMismatch(PathBuf),
}

impl fmt::Display for StaleReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Forced => write!(f, "forced"),
      Self::MissingOutput => write!(f, "output missing"),
      Self::DependencyExecuted(id) => write!(f, "{id} ran"),
      Self::MissingInput(path) => write!(f, "input missing: {}", path.display()),
      Self::NewerInput(path) => write!(f, "input changed: {}", path.display()),
      Self::ChecksumMismatch(path) => write!(f, "checksum mismatch: {}", path.display()),
    }
  }
}

impl Serialize for StaleReason {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Decide whether `task` must run. Returns `None` when it is up to date.
///
/// `executed_dependency` is a prerequisite that already ran in this
/// invocation, if any.
pub fn check(task: &Task, force: bool, executed_dependency: Option<TaskId>) -> Option<StaleReason> {
  if force {
    return Some(StaleReason::Forced);
  }

  let Some(output_time) = modified(&task.output) else {
    return Some(StaleReason::MissingOutput);
  };

  if let Some(dep) = executed_dependency {
    return Some(StaleReason::DependencyExecuted(dep));
  }

  for action in &task.actions {
    if let Action::Fetch {
      dest,
      sha256: Some(expected),
      ..
    } = action
      && !hash_file(dest).is_ok_and(|hash| hash.matches(expected))
    {
      return Some(StaleReason::ChecksumMismatch(dest.clone()));
    }
  }

  for input in &task.inputs {
    match modified(input) {
      None => return Some(StaleReason::MissingInput(input.clone())),
      Some(time) if time > output_time => return Some(StaleReason::NewerInput(input.clone())),
      Some(_) => {}
    }
  }

  None
}

fn modified(path: &Path) -> Option<SystemTime> {
  path.metadata().and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use crate::deps::Dependency;
  use crate::platform::PlatformId;
  use crate::util::testutil::set_mtime;
  use tempfile::TempDir;

  const ID: TaskId = TaskId::Link(PlatformId::MacOsx);

  fn setup() -> (TempDir, Task) {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("in");
    let output = temp.path().join("out");
    fs::write(&input, "i").unwrap();
    fs::write(&output, "o").unwrap();
    set_mtime(&input, 1_000);
    set_mtime(&output, 2_000);
    let task = Task::new(ID, output).input(input);
    (temp, task)
  }

  #[test]
  fn current_output_is_up_to_date() {
    let (_temp, task) = setup();
    assert_eq!(check(&task, false, None), None);
  }

  #[test]
  fn equal_mtimes_are_up_to_date() {
    let (_temp, task) = setup();
    set_mtime(&task.inputs[0], 2_000);
    assert_eq!(check(&task, false, None), None);
  }

  #[test]
  fn force_wins() {
    let (_temp, task) = setup();
    assert_eq!(check(&task, true, None), Some(StaleReason::Forced));
  }

  #[test]
  fn missing_output_is_stale() {
    let (_temp, task) = setup();
    fs::remove_file(&task.output).unwrap();
    assert_eq!(check(&task, false, None), Some(StaleReason::MissingOutput));
  }

  #[test]
  fn newer_input_is_stale() {
    let (_temp, task) = setup();
    set_mtime(&task.inputs[0], 3_000);
    assert_eq!(
      check(&task, false, None),
      Some(StaleReason::NewerInput(task.inputs[0].clone()))
    );
  }

  #[test]
  fn missing_input_is_stale() {
    let (_temp, task) = setup();
    fs::remove_file(&task.inputs[0]).unwrap();
    assert_eq!(
      check(&task, false, None),
      Some(StaleReason::MissingInput(task.inputs[0].clone()))
    );
  }

  #[test]
  fn executed_dependency_is_stale() {
    let (_temp, task) = setup();
    let dep = TaskId::Install(Dependency::Libgit2, PlatformId::MacOsx);
    assert_eq!(
      check(&task, false, Some(dep)),
      Some(StaleReason::DependencyExecuted(dep))
    );
  }

  fn fetch_task(dest: &Path, sha256: Option<String>) -> Task {
    Task::new(TaskId::Fetch(Dependency::OpenSsl), dest).action(Action::Fetch {
      url: "https://example.invalid/openssl-3.0.13.tar.gz".to_string(),
      dest: dest.to_path_buf(),
      sha256,
    })
  }

  #[test]
  fn cached_download_matching_pin_is_up_to_date() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("openssl-3.0.13.tar.gz");
    fs::write(&dest, b"archive").unwrap();
    let pin = hash_file(&dest).unwrap().to_string();

    assert_eq!(check(&fetch_task(&dest, Some(pin)), false, None), None);
    assert_eq!(check(&fetch_task(&dest, None), false, None), None);
  }

  #[test]
  fn cached_download_not_matching_pin_is_stale() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("openssl-3.0.13.tar.gz");
    fs::write(&dest, b"truncated").unwrap();
    let task = fetch_task(&dest, Some("00".repeat(32)));

    assert_eq!(check(&task, false, None), Some(StaleReason::ChecksumMismatch(dest)));
  }

  #[test]
  fn reasons_display() {
    assert_eq!(StaleReason::MissingOutput.to_string(), "output missing");
    assert_eq!(
      StaleReason::DependencyExecuted(TaskId::Fetch(Dependency::OpenSsl)).to_string(),
      "fetch openssl ran"
    );
  }
}
