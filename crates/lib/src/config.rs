//! Build configuration.
//!
//! Loaded from an optional `xcforge.toml`. Every field has a default, so an
//! empty (or absent) file builds all six platforms with the pinned versions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, ROOT_ENV};
use crate::deps::{Dependency, DependencySpec};
use crate::platform::{PlatformId, UnknownPlatform};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error(transparent)]
  UnknownPlatform(#[from] UnknownPlatform),

  #[error("required tool '{tool}' not found in PATH")]
  ToolMissing { tool: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub build: BuildSection,
  /// Version overrides, keyed by dependency name.
  pub versions: BTreeMap<Dependency, String>,
  /// Expected SHA-256 of downloaded archives, keyed by dependency name.
  pub checksums: BTreeMap<Dependency, String>,
  pub module: ModuleSection,
  pub tools: Tools,
  /// Directory relative paths in the file are resolved against.
  #[serde(skip)]
  pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
  pub root: PathBuf,
  /// Maximum number of tasks running at once.
  pub jobs: Option<usize>,
  /// `-j` passed to make/cmake inside a single task.
  pub make_jobs: Option<usize>,
  pub platforms: Vec<String>,
}

impl Default for BuildSection {
  fn default() -> Self {
    Self {
      root: PathBuf::from("out"),
      jobs: None,
      make_jobs: None,
      platforms: PlatformId::names().into_iter().map(String::from).collect(),
    }
  }
}

/// Shape of the interface declaration shipped with every slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleSection {
  pub name: String,
  pub umbrella_header: String,
  /// System libraries the module links against.
  pub links: Vec<String>,
}

impl Default for ModuleSection {
  fn default() -> Self {
    Self {
      name: "Clibgit2".to_string(),
      umbrella_header: "git2.h".to_string(),
      links: vec!["z".to_string(), "iconv".to_string()],
    }
  }
}

/// Which tool merges static archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archiver {
  /// `libtool -static`, the Apple toolchain's archive merger.
  #[default]
  Libtool,
  /// `ar -M` with an MRI script.
  Ar,
}

/// External programs invoked by the linker, fat merger and packager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tools {
  pub archiver: Archiver,
  pub ar: String,
  pub libtool: String,
  pub lipo: String,
  pub xcodebuild: String,
}

impl Default for Tools {
  fn default() -> Self {
    Self {
      archiver: Archiver::default(),
      ar: "ar".to_string(),
      libtool: "libtool".to_string(),
      lipo: "lipo".to_string(),
      xcodebuild: "xcodebuild".to_string(),
    }
  }
}

impl Tools {
  /// Program used to merge archives.
  pub fn archiver_program(&self) -> &str {
    match self.archiver {
      Archiver::Libtool => &self.libtool,
      Archiver::Ar => &self.ar,
    }
  }

  /// Verify that every tool needed for merging and packaging is on PATH.
  ///
  /// `ar` is always required because archive members are listed with it.
  pub fn check(&self, packaging: bool) -> Result<(), ConfigError> {
    let mut needed = vec![self.archiver_program(), self.ar.as_str(), self.lipo.as_str()];
    if packaging {
      needed.push(&self.xcodebuild);
    }
    for tool in needed {
      if which::which(tool).is_err() {
        return Err(ConfigError::ToolMissing { tool: tool.to_string() });
      }
    }
    Ok(())
  }
}

impl Config {
  /// Load configuration.
  ///
  /// An explicit path must exist. Without one, `xcforge.toml` in the current
  /// directory is used when present, otherwise defaults.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => {
        if !path.exists() {
          return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::from_file(path)
      }
      None => {
        let default_path = PathBuf::from(CONFIG_FILENAME);
        if default_path.exists() {
          Self::from_file(&default_path)
        } else {
          debug!("no config file, using defaults");
          Ok(Self {
            base_dir: PathBuf::from("."),
            ..Self::default()
          })
        }
      }
    }
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config = Self::parse(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    let parent = path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or_else(|| Path::new("."));
    config.base_dir = dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  /// Build root: `override_root`, then `$XCFORGE_ROOT`, then `build.root`
  /// relative to the config file.
  ///
  /// Always absolute, since recipe scripts run from inside source trees.
  pub fn resolve_root(&self, override_root: Option<&Path>) -> PathBuf {
    let root = match override_root {
      Some(root) => root.to_path_buf(),
      None => match std::env::var(ROOT_ENV) {
        Ok(root) if !root.is_empty() => PathBuf::from(root),
        _ => self.base_dir.join(&self.build.root),
      },
    };
    std::path::absolute(&root).unwrap_or(root)
  }

  /// Configured platforms in canonical order, without duplicates.
  pub fn platform_ids(&self) -> Result<Vec<PlatformId>, UnknownPlatform> {
    let mut ids = self
      .build
      .platforms
      .iter()
      .map(|s| s.parse::<PlatformId>())
      .collect::<Result<Vec<_>, _>>()?;
    ids.sort();
    ids.dedup();
    Ok(ids)
  }

  /// Pinned dependency specs in link order.
  pub fn dependency_specs(&self) -> Vec<DependencySpec> {
    Dependency::ALL
      .iter()
      .map(|dep| {
        let version = self
          .versions
          .get(dep)
          .cloned()
          .unwrap_or_else(|| dep.default_version().to_string());
        DependencySpec::new(*dep, version).with_sha256(self.checksums.get(dep).cloned())
      })
      .collect()
  }

  /// Number of tasks run at once: CLI value, then config, then 1 (sequential).
  pub fn jobs(&self, cli_jobs: Option<usize>) -> usize {
    cli_jobs.or(self.build.jobs).unwrap_or(1).max(1)
  }

  pub fn make_jobs(&self) -> usize {
    self
      .build
      .make_jobs
      .unwrap_or_else(|| std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4))
  }
}
