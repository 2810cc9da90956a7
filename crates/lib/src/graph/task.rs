//! Build task definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::deps::Dependency;
use crate::fat::MergeRequest;
use crate::link::LinkRequest;
use crate::package::PackageRequest;
use crate::platform::{PlatformId, Slice};

/// Identifies a task in the build graph.
///
/// Ordering follows pipeline order (fetch before configure, and so on), which
/// keeps reports and plans stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskId {
  Fetch(Dependency),
  Configure(Dependency, PlatformId),
  Compile(Dependency, PlatformId),
  Install(Dependency, PlatformId),
  Link(PlatformId),
  Merge(Slice),
  Package,
}

impl TaskId {
  pub fn stage(&self) -> &'static str {
    match self {
      Self::Fetch(_) => "fetch",
      Self::Configure(..) => "configure",
      Self::Compile(..) => "compile",
      Self::Install(..) => "install",
      Self::Link(_) => "link",
      Self::Merge(_) => "merge",
      Self::Package => "package",
    }
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Fetch(dep) => write!(f, "fetch {dep}"),
      Self::Configure(dep, p) | Self::Compile(dep, p) | Self::Install(dep, p) => {
        write!(f, "{} {dep} [{p}]", self.stage())
      }
      Self::Link(p) => write!(f, "link [{p}]"),
      Self::Merge(slice) => write!(f, "merge [{slice}]"),
      Self::Package => write!(f, "package"),
    }
  }
}

impl Serialize for TaskId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// A single step of a task, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Download `url` to `dest` unless already cached.
  Fetch {
    url: String,
    dest: PathBuf,
    sha256: Option<String>,
  },
  /// Replace `dest` with a fresh extraction of `archive`.
  Unpack { archive: PathBuf, dest: PathBuf },
  /// Run a shell script in `cwd`.
  Cmd { script: String, cwd: PathBuf },
  /// Write (or refresh) an empty stamp file.
  Stamp { path: PathBuf },
  Link(LinkRequest),
  Merge(MergeRequest),
  Package(PackageRequest),
}

/// A node of the build graph.
///
/// A task is stale when its `output` is missing or older than any of its
/// `inputs`. Edges are implied: a task depends on whichever task declares one
/// of its inputs as output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
  pub id: TaskId,
  pub inputs: Vec<PathBuf>,
  pub output: PathBuf,
  pub actions: Vec<Action>,
  /// Working directory no other task may use at the same time.
  pub workdir: Option<PathBuf>,
}

impl Task {
  pub fn new(id: TaskId, output: impl Into<PathBuf>) -> Self {
    Self {
      id,
      inputs: Vec::new(),
      output: output.into(),
      actions: Vec::new(),
      workdir: None,
    }
  }

  pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
    self.inputs.push(path.into());
    self
  }

  pub fn inputs(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
    self.inputs.extend(paths);
    self
  }

  pub fn action(mut self, action: Action) -> Self {
    self.actions.push(action);
    self
  }

  pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.workdir = Some(dir.into());
    self
  }
}
