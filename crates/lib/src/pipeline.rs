//! Top-level operations behind the CLI commands.
//!
//! Each operation resolves the layout, validates the configuration and takes
//! the build-root lock before touching any artifact.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::build_lock::{BuildLock, BuildLockError};
use crate::clean::{self, CleanError, CleanReport, CleanScope};
use crate::config::{Config, ConfigError};
use crate::execute::log::append_block;
use crate::execute::{self, BuildLog, ExecuteConfig, ExecutionReport, PlanEntry};
use crate::graph::{GraphError, TaskId, build_graph};
use crate::layout::Layout;
use crate::package::write_interface_if_changed;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Lock(#[from] BuildLockError),

  #[error(transparent)]
  Clean(#[from] CleanError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Options for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  /// Concurrency limit from the command line; falls back to the config.
  pub jobs: Option<usize>,
  pub force: bool,
}

#[derive(Debug)]
pub struct BuildOutcome {
  pub report: ExecutionReport,
  pub root: PathBuf,
  /// Set when the bundle is part of the build and exists afterwards.
  pub bundle: Option<PathBuf>,
  pub log_file: PathBuf,
  pub duration: Duration,
}

/// Build every stale artifact under `root`.
///
/// Task failures are reported in the outcome, not as an error; an error means
/// the build could not start.
pub async fn run_build(config: &Config, root: &Path, options: &BuildOptions) -> Result<BuildOutcome, PipelineError> {
  let layout = Layout::new(root, &config.module.name);
  let result = build(config, &layout, options).await;
  if let Err(e) = &result {
    record_failure(&layout, "build", e);
  }
  result
}

async fn build(config: &Config, layout: &Layout, options: &BuildOptions) -> Result<BuildOutcome, PipelineError> {
  let start = Instant::now();
  let root = layout.root();

  // Validate before creating anything on disk
  let graph = build_graph(config, layout)?;
  let packaging = graph.task(&TaskId::Package).is_some();
  config.tools.check(packaging)?;

  let _lock = BuildLock::acquire(layout, "build")?;

  write_interface_if_changed(&layout.interface_file(), &config.module)?;

  let exec_config = ExecuteConfig {
    jobs: config.jobs(options.jobs),
    force: options.force,
    tools: config.tools.clone(),
    shell: None,
  };

  info!(root = %root.display(), tasks = graph.len(), jobs = exec_config.jobs, "starting build");

  let log = BuildLog::open(&layout.log_file()).await?;
  let report = execute::execute_graph(&graph, &exec_config, &log).await;
  log.close().await?;

  let bundle = (packaging && layout.bundle_marker().exists()).then(|| layout.bundle_dir());

  Ok(BuildOutcome {
    report,
    root: root.to_path_buf(),
    bundle,
    log_file: layout.log_file(),
    duration: start.elapsed(),
  })
}

/// Note an error that stopped `command` in the shared log.
///
/// Only an existing root gets a log entry; a build that failed validation
/// leaves no trace on disk.
fn record_failure(layout: &Layout, command: &str, error: &PipelineError) {
  if !layout.root().is_dir() {
    return;
  }
  let path = layout.log_file();
  if let Err(e) = append_block(&path, command, "FAILED", &format!("error: {error}\n")) {
    warn!(path = %path.display(), error = %e, "could not record failure in build log");
  }
}

/// Report what a build would do without running anything or taking the lock.
pub fn plan(config: &Config, root: &Path, force: bool) -> Result<Vec<PlanEntry>, PipelineError> {
  let layout = Layout::new(root, &config.module.name);
  let graph = build_graph(config, &layout)?;
  Ok(execute::plan(&graph, force)?)
}

/// Remove artifacts under the build-root lock.
pub fn run_clean(config: &Config, root: &Path, scope: CleanScope, dry_run: bool) -> Result<CleanReport, PipelineError> {
  let layout = Layout::new(root, &config.module.name);
  if !root.exists() {
    return Ok(clean::clean(&layout, scope, dry_run)?);
  }
  let result = clean_locked(&layout, scope, dry_run);
  if let Err(e) = &result {
    record_failure(&layout, "clean", e);
  }
  result
}

fn clean_locked(layout: &Layout, scope: CleanScope, dry_run: bool) -> Result<CleanReport, PipelineError> {
  let _lock = BuildLock::acquire(layout, "clean")?;
  Ok(clean::clean(layout, scope, dry_run)?)
}
