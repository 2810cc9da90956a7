//! Removal of build artifacts.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::layout::Layout;
use crate::platform::PlatformId;
use crate::util::fs::{dir_size, remove_path};

#[derive(Debug, Error)]
pub enum CleanError {
  #[error("failed to delete {path}: {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// What to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanScope {
  /// Everything the build produced, downloads included.
  All,
  /// Only the downloads cache (archives and extracted sources).
  Deps,
  /// One platform's artifacts plus everything merged from them.
  Platform(PlatformId),
}

impl fmt::Display for CleanScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::All => write!(f, "all"),
      Self::Deps => write!(f, "deps"),
      Self::Platform(p) => write!(f, "{p}"),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct CleanReport {
  #[serde(serialize_with = "serialize_scope")]
  pub scope: CleanScope,
  pub dry_run: bool,
  pub removed: Vec<PathBuf>,
  pub bytes_freed: u64,
}

/// Paths removed for `scope`, existing or not.
pub fn targets(layout: &Layout, scope: CleanScope) -> Vec<PathBuf> {
  match scope {
    CleanScope::All => vec![
      layout.deps_dir(),
      layout.install_dir(),
      layout.build_dir(),
      layout.bundle_dir(),
      layout.log_file(),
    ],
    CleanScope::Deps => vec![layout.deps_dir()],
    CleanScope::Platform(platform) => {
      let mut paths = vec![
        layout.platform_deps_dir(platform),
        layout.platform_install_dir(platform),
        layout.platform_build_dir(platform),
      ];
      let slice = platform.platform().slice;
      if slice.is_fat() {
        paths.push(layout.fat_lib(slice));
      }
      paths.push(layout.bundle_dir());
      paths
    }
  }
}

/// Remove the artifacts of `scope`. With `dry_run`, only report them.
pub fn clean(layout: &Layout, scope: CleanScope, dry_run: bool) -> Result<CleanReport, CleanError> {
  let mut removed = Vec::new();
  let mut bytes_freed = 0;

  for path in targets(layout, scope) {
    if path.symlink_metadata().is_err() {
      continue;
    }
    let size = dir_size(&path);
    debug!(path = %path.display(), size, dry_run, "removing");

    if !dry_run {
      remove_path(&path).map_err(|source| CleanError::Delete {
        path: path.clone(),
        source,
      })?;
    }
    bytes_freed += size;
    removed.push(path);
  }

  info!(scope = %scope, removed = removed.len(), bytes_freed, dry_run, "clean complete");

  Ok(CleanReport {
    scope,
    dry_run,
    removed,
    bytes_freed,
  })
}

fn serialize_scope<S: serde::Serializer>(scope: &CleanScope, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(scope)
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::Path;

  use super::*;
  use crate::deps::{Dependency, DependencySpec};
  use crate::platform::Slice;
  use tempfile::TempDir;

  /// Populate a root with one file at every artifact location.
  fn populate(layout: &Layout) {
    let write = |path: &Path, size: usize| {
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, vec![0u8; size]).unwrap();
    };
    let spec = DependencySpec::new(Dependency::Libgit2, "1.7.2");
    write(&layout.archive(&spec), 100);
    for platform in PlatformId::ALL {
      write(&layout.configured_stamp(platform, &spec), 0);
      write(&layout.installed_libs(platform, Dependency::Libgit2)[0], 10);
      write(&layout.combined_lib(platform), 20);
    }
    write(&layout.fat_lib(Slice::MacOs), 40);
    write(&layout.fat_lib(Slice::MacCatalyst), 40);
    write(&layout.bundle_marker(), 1);
    write(&layout.log_file(), 5);
    write(&layout.lock_file(), 0);
  }

  #[test]
  fn clean_all_keeps_only_lock() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path(), "Clibgit2");
    populate(&layout);

    let report = clean(&layout, CleanScope::All, false).unwrap();

    assert_eq!(report.removed.len(), 5);
    assert_eq!(report.bytes_freed, 100 + 6 * 10 + 6 * 20 + 80 + 1 + 5);
    let left: Vec<_> = fs::read_dir(temp.path()).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(left, vec![".lock".to_string()]);
  }

  #[test]
  fn clean_deps_keeps_build_outputs() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path(), "Clibgit2");
    populate(&layout);

    clean(&layout, CleanScope::Deps, false).unwrap();

    assert!(!layout.deps_dir().exists());
    assert!(layout.combined_lib(PlatformId::MacOsx).exists());
    assert!(layout.bundle_marker().exists());
  }

  #[test]
  fn clean_platform_touches_only_its_artifacts() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path(), "Clibgit2");
    populate(&layout);

    clean(&layout, CleanScope::Platform(PlatformId::MacOsxArm64), false).unwrap();

    assert!(!layout.combined_lib(PlatformId::MacOsxArm64).exists());
    assert!(!layout.platform_install_dir(PlatformId::MacOsxArm64).exists());
    assert!(!layout.fat_lib(Slice::MacOs).exists());
    assert!(!layout.bundle_dir().exists());

    assert!(layout.combined_lib(PlatformId::MacOsx).exists());
    assert!(layout.fat_lib(Slice::MacCatalyst).exists());
    assert!(layout.platform_deps_dir(PlatformId::MacOsx).exists());
  }

  #[test]
  fn single_arch_platform_has_no_fat_target() {
    let layout = Layout::new("/out", "Clibgit2");
    let paths = targets(&layout, CleanScope::Platform(PlatformId::IPhoneOs));
    assert!(!paths.iter().any(|p| p.starts_with("/out/build/fat")));
  }

  #[test]
  fn dry_run_removes_nothing() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path(), "Clibgit2");
    populate(&layout);

    let report = clean(&layout, CleanScope::All, true).unwrap();

    assert!(report.dry_run);
    assert_eq!(report.removed.len(), 5);
    assert!(layout.deps_dir().exists());
    assert!(layout.bundle_marker().exists());
  }

  #[test]
  fn clean_empty_root_reports_nothing() {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path().join("missing"), "Clibgit2");

    let report = clean(&layout, CleanScope::All, false).unwrap();

    assert!(report.removed.is_empty());
    assert_eq!(report.bytes_freed, 0);
  }
}
