//! Incremental task execution.
//!
//! This module runs a [`TaskGraph`]. It handles:
//! - staleness checks, so a repeated run performs no work
//! - running independent tasks concurrently up to a job limit
//! - serializing tasks that share a working directory
//! - blocking the dependents of a failed task while unrelated chains continue
//!
//! Tasks are dispatched as soon as their prerequisites finish rather than in
//! lockstep waves, so a slow chain never holds back an unrelated platform.

pub mod actions;
pub mod log;
pub mod stale;
pub mod types;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::graph::{Task, TaskGraph, TaskId};
use crate::util::fs::remove_path;

use actions::{ActionContext, execute_action};
use log::LogHandle;

pub use log::BuildLog;
pub use stale::StaleReason;
pub use types::{BlockedTask, ExecuteConfig, ExecuteError, ExecutionReport, TaskFailure};

/// Run every stale task of `graph`.
///
/// Tasks whose output is current are recorded as up to date without running.
/// A failed task blocks all of its transitive dependents; every other task
/// still runs.
pub async fn execute_graph(graph: &TaskGraph, config: &ExecuteConfig, log: &BuildLog) -> ExecutionReport {
  info!(tasks = graph.len(), jobs = config.jobs, "starting execution");

  let mut report = ExecutionReport::default();
  let mut remaining: HashMap<TaskId, usize> = graph
    .tasks()
    .map(|t| (t.id, graph.dependencies(&t.id).len()))
    .collect();
  let mut ready: BTreeSet<TaskId> = remaining.iter().filter(|(_, n)| **n == 0).map(|(id, _)| *id).collect();
  let mut executed: HashSet<TaskId> = HashSet::new();
  let mut blocked: HashSet<TaskId> = HashSet::new();

  let semaphore = Arc::new(Semaphore::new(config.jobs.max(1)));
  let mut workdirs: HashMap<PathBuf, Arc<Mutex<()>>> = HashMap::new();
  let mut running = JoinSet::new();
  let mut running_ids = HashMap::new();

  loop {
    // Dispatch everything that is ready; up-to-date tasks complete immediately
    while let Some(id) = ready.pop_first() {
      let Some(task) = graph.task(&id) else {
        continue;
      };

      let ran = graph.dependencies(&id).into_iter().find(|d| executed.contains(d));
      let Some(reason) = stale::check(task, config.force, ran) else {
        debug!(task = %id, "up to date");
        report.up_to_date.push(id);
        release_dependents(graph, id, &mut remaining, &blocked, &mut ready);
        continue;
      };

      debug!(task = %id, reason = %reason, "stale");
      let lock = task
        .workdir
        .as_ref()
        .map(|dir| workdirs.entry(dir.clone()).or_default().clone());
      let handle = running.spawn(run_task(
        task.clone(),
        config.clone(),
        semaphore.clone(),
        lock,
        log.handle(),
      ));
      running_ids.insert(handle.id(), id);
    }

    let Some(joined) = running.join_next_with_id().await else {
      break;
    };

    let (id, (result, output)) = match joined {
      Ok((tokio_id, outcome)) => (running_ids.remove(&tokio_id), outcome),
      Err(e) => (
        running_ids.remove(&e.id()),
        (Err(ExecuteError::Aborted(e.to_string())), String::new()),
      ),
    };
    let Some(id) = id else {
      continue;
    };

    match result {
      Ok(()) => {
        info!(task = %id, "task finished");
        executed.insert(id);
        report.executed.push(id);
        release_dependents(graph, id, &mut remaining, &blocked, &mut ready);
      }
      Err(e) => {
        error!(task = %id, error = %e, "task failed");
        block_dependents(graph, id, &mut blocked, &mut report, &log.handle());
        report.failed.push(TaskFailure {
          task: id,
          error: e,
          output: tail(&output, FAILURE_TAIL_LINES),
        });
      }
    }
  }

  info!(
    executed = report.executed.len(),
    up_to_date = report.up_to_date.len(),
    failed = report.failed.len(),
    blocked = report.blocked.len(),
    "execution complete"
  );

  report
}

/// Mark `id` complete and queue dependents whose prerequisites are all done.
fn release_dependents(
  graph: &TaskGraph,
  id: TaskId,
  remaining: &mut HashMap<TaskId, usize>,
  blocked: &HashSet<TaskId>,
  ready: &mut BTreeSet<TaskId>,
) {
  for dependent in graph.dependents(&id) {
    if let Some(count) = remaining.get_mut(&dependent) {
      *count = count.saturating_sub(1);
      if *count == 0 && !blocked.contains(&dependent) {
        ready.insert(dependent);
      }
    }
  }
}

/// Block every transitive dependent of a failed task.
fn block_dependents(
  graph: &TaskGraph,
  failed: TaskId,
  blocked: &mut HashSet<TaskId>,
  report: &mut ExecutionReport,
  log: &LogHandle,
) {
  let mut stack = graph.dependents(&failed);
  while let Some(id) = stack.pop() {
    if !blocked.insert(id) {
      continue;
    }
    warn!(task = %id, failed = %failed, "blocked by failed task");
    log.append(id, "blocked", format!("not run: {failed} failed\n"));
    report.blocked.push(BlockedTask { task: id, cause: failed });
    stack.extend(graph.dependents(&id));
  }
}

async fn run_task(
  task: Task,
  config: ExecuteConfig,
  semaphore: Arc<Semaphore>,
  workdir: Option<Arc<Mutex<()>>>,
  log: LogHandle,
) -> (Result<(), ExecuteError>, String) {
  let _permit = match semaphore.acquire_owned().await {
    Ok(permit) => permit,
    Err(e) => return (Err(ExecuteError::Aborted(e.to_string())), String::new()),
  };
  let _workdir = match workdir {
    Some(lock) => Some(lock.lock_owned().await),
    None => None,
  };

  info!(task = %task.id, "running task");

  let ctx = ActionContext {
    tools: &config.tools,
    shell: config.shell.as_deref(),
  };
  let mut output = String::new();
  let mut result = Ok(());
  for action in &task.actions {
    if let Err(e) = execute_action(action, ctx, &mut output).await {
      result = Err(e);
      break;
    }
  }

  if result.is_ok() && !task.output.exists() {
    result = Err(ExecuteError::MissingOutput(task.output.clone()));
  }

  match &result {
    Ok(()) => log.append(task.id, "ok", output.clone()),
    Err(e) => {
      // A failed task's output is never trusted, or the next run would see it as current
      if let Err(rm) = remove_path(&task.output) {
        warn!(task = %task.id, path = %task.output.display(), error = %rm, "could not remove failed output");
      }
      output.push_str(&format!("error: {e}\n"));
      log.append(task.id, "FAILED", output.clone());
    }
  }

  (result, output)
}

/// Lines of a failed task's output kept for the terminal summary.
const FAILURE_TAIL_LINES: usize = 20;

/// The last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
  let all: Vec<&str> = text.lines().collect();
  let start = all.len().saturating_sub(lines);
  let mut out = all[start..].join("\n");
  if !out.is_empty() {
    out.push('\n');
  }
  out
}

/// What a run would do, without running anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
  pub task: TaskId,
  /// Parallel wave the task belongs to.
  pub wave: usize,
  /// Why the task would run, or `None` if it is up to date.
  pub reason: Option<StaleReason>,
}

/// Predict which tasks a run would execute.
///
/// A task whose prerequisite would run is reported as stale because of it,
/// mirroring [`execute_graph`].
pub fn plan(graph: &TaskGraph, force: bool) -> Result<Vec<PlanEntry>, crate::graph::GraphError> {
  let mut would_run: HashSet<TaskId> = HashSet::new();
  let mut entries = Vec::new();

  for (wave, ids) in graph.waves()?.into_iter().enumerate() {
    for id in ids {
      let Some(task) = graph.task(&id) else {
        continue;
      };
      let ran = graph.dependencies(&id).into_iter().find(|d| would_run.contains(d));
      let reason = stale::check(task, force, ran);
      if reason.is_some() {
        would_run.insert(id);
      }
      entries.push(PlanEntry { task: id, wave, reason });
    }
  }

  Ok(entries)
}
