//! Task graph construction.
//!
//! [`build_graph`] turns the configuration into the complete set of tasks for
//! the configured platforms. Construction is pure: no file is read and no
//! command is run, so the same configuration always yields the same graph.

pub mod dag;
pub mod task;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::deps::recipe::{RecipePaths, raw_build_dir};
use crate::deps::{Dependency, DependencySpec, Recipe};
use crate::fat::MergeRequest;
use crate::layout::Layout;
use crate::link::{InstallFallback, LinkRequest};
use crate::package::{PackageRequest, SliceInput};
use crate::platform::{PlatformId, Slice, UnknownPlatform};

pub use dag::TaskGraph;
pub use task::{Action, Task, TaskId};

#[derive(Debug, Error)]
pub enum GraphError {
  #[error(transparent)]
  UnknownPlatform(#[from] UnknownPlatform),

  #[error("task declared twice: {0}")]
  DuplicateTask(TaskId),

  #[error("{first} and {second} both produce {path}")]
  DuplicateOutput { path: PathBuf, first: TaskId, second: TaskId },

  #[error("dependency cycle detected")]
  CycleDetected,
}

/// Build the task graph for every configured platform.
///
/// Per platform, each dependency gets a configure, compile and install task.
/// A `Link` task follows per platform, a `Merge` task per dual-architecture
/// slice whose platforms are all configured, and a single `Package` task once
/// every platform is configured.
pub fn build_graph(config: &Config, layout: &Layout) -> Result<TaskGraph, GraphError> {
  let platforms = config.platform_ids()?;
  let specs = config.dependency_specs();
  let make_jobs = config.make_jobs();

  let mut tasks = Vec::new();

  for spec in &specs {
    tasks.push(fetch_task(spec, layout));
  }

  for &platform in &platforms {
    for spec in &specs {
      tasks.extend(dependency_tasks(spec, platform, layout, make_jobs));
    }
    tasks.push(link_task(platform, &specs, layout));
  }

  for slice in Slice::ALL {
    if slice.is_fat() && slice.platforms().iter().all(|p| platforms.contains(p)) {
      tasks.push(merge_task(slice, layout));
    }
  }

  if PlatformId::ALL.iter().all(|p| platforms.contains(p)) {
    tasks.push(package_task(layout));
  }

  debug!(tasks = tasks.len(), platforms = platforms.len(), "built task graph");

  TaskGraph::from_tasks(tasks)
}

fn fetch_task(spec: &DependencySpec, layout: &Layout) -> Task {
  let archive = layout.archive(spec);
  Task::new(TaskId::Fetch(spec.dependency), &archive).action(Action::Fetch {
    url: spec.url(),
    dest: archive,
    sha256: spec.sha256.clone(),
  })
}

/// Configure, compile and install tasks of one dependency on one platform.
fn dependency_tasks(spec: &DependencySpec, platform: PlatformId, layout: &Layout, make_jobs: usize) -> [Task; 3] {
  let dep = spec.dependency;
  let source_dir = layout.source_dir(platform, spec);
  let prefix = layout.install_prefix(platform, dep);

  let upstream: BTreeMap<Dependency, PathBuf> = dep
    .upstream()
    .iter()
    .map(|up| (*up, layout.install_prefix(platform, *up)))
    .collect();
  let upstream_stamps: Vec<PathBuf> = dep
    .upstream()
    .iter()
    .map(|up| layout.installed_stamp(platform, *up))
    .collect();

  let recipe = Recipe::for_platform(
    spec,
    platform.platform(),
    &RecipePaths {
      source_dir: &source_dir,
      prefix: &prefix,
      upstream: &upstream,
    },
    make_jobs,
  );

  let configured = layout.configured_stamp(platform, spec);
  let compiled = layout.compiled_stamp(platform, spec);
  let installed = layout.installed_stamp(platform, dep);

  let configure = Task::new(TaskId::Configure(dep, platform), &configured)
    .input(layout.archive(spec))
    .inputs(upstream_stamps.clone())
    .action(Action::Unpack {
      archive: layout.archive(spec),
      dest: source_dir.clone(),
    })
    .action(Action::Cmd {
      script: recipe.configure,
      cwd: source_dir.clone(),
    })
    .action(Action::Stamp { path: configured.clone() })
    .workdir(&source_dir);

  let compile = Task::new(TaskId::Compile(dep, platform), &compiled)
    .input(&configured)
    .inputs(upstream_stamps)
    .action(Action::Cmd {
      script: recipe.compile,
      cwd: source_dir.clone(),
    })
    .action(Action::Stamp { path: compiled.clone() })
    .workdir(&source_dir);

  let install = Task::new(TaskId::Install(dep, platform), &installed)
    .input(&compiled)
    .action(Action::Cmd {
      script: recipe.install,
      cwd: source_dir.clone(),
    })
    .action(Action::Stamp { path: installed })
    .workdir(&source_dir);

  [configure, compile, install]
}

fn link_task(platform: PlatformId, specs: &[DependencySpec], layout: &Layout) -> Task {
  let mut inputs = Vec::new();
  let mut fallback = None;

  for spec in specs {
    let dep = spec.dependency;
    inputs.extend(layout.installed_libs(platform, dep));
    if dep == Dependency::Libgit2 {
      let source_dir = layout.source_dir(platform, spec);
      let prefix = layout.install_prefix(platform, dep);
      fallback = Some(InstallFallback {
        library: prefix.join("lib").join("libgit2.a"),
        search_dir: raw_build_dir(dep, &source_dir),
        include_src: source_dir.join("include"),
        include_dest: prefix.join("include"),
      });
    }
  }

  let output = layout.combined_lib(platform);
  Task::new(TaskId::Link(platform), &output)
    .inputs(Dependency::ALL.iter().map(|dep| layout.installed_stamp(platform, *dep)))
    .action(Action::Link(LinkRequest {
      platform,
      inputs,
      output: output.clone(),
      fallback,
    }))
}

fn merge_task(slice: Slice, layout: &Layout) -> Task {
  let inputs: Vec<_> = slice
    .platforms()
    .iter()
    .map(|p| (p.platform().arch, layout.combined_lib(*p)))
    .collect();
  let output = layout.fat_lib(slice);

  Task::new(TaskId::Merge(slice), &output)
    .inputs(inputs.iter().map(|(_, path)| path.clone()))
    .action(Action::Merge(MergeRequest {
      slice,
      inputs,
      output: output.clone(),
    }))
}

fn package_task(layout: &Layout) -> Task {
  let slices: Vec<SliceInput> = Slice::ALL
    .iter()
    .map(|slice| SliceInput {
      slice: *slice,
      library: layout.slice_lib(*slice),
      headers: layout.slice_headers(*slice),
    })
    .collect();

  Task::new(TaskId::Package, layout.bundle_marker())
    .inputs(slices.iter().map(|s| s.library.clone()))
    .input(layout.interface_file())
    .action(Action::Package(PackageRequest {
      slices,
      interface: layout.interface_file(),
      output: layout.bundle_dir(),
    }))
}
