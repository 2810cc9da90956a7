//! Artifact store layout.
//!
//! Every path the build reads or writes is derived here from a single build
//! root. Per-platform paths always contain the platform identifier, which is
//! what lets independent platforms run concurrently without locking.

use std::path::{Path, PathBuf};

use crate::consts::{COMPILED_STAMP, CONFIGURED_STAMP, INSTALLED_STAMP, LOCK_FILENAME, LOG_FILENAME};
use crate::deps::{Dependency, DependencySpec};
use crate::platform::{PlatformId, Slice};

const DEPS_DIR: &str = "deps";
const INSTALL_DIR: &str = "install";
const BUILD_DIR: &str = "build";
const FAT_DIR: &str = "fat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  root: PathBuf,
  /// Base name of the combined library and the bundle (e.g. `Clibgit2`).
  module_name: String,
}

impl Layout {
  pub fn new(root: impl Into<PathBuf>, module_name: impl Into<String>) -> Self {
    Self {
      root: root.into(),
      module_name: module_name.into(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Downloads cache: archives plus one extracted tree per platform.
  pub fn deps_dir(&self) -> PathBuf {
    self.root.join(DEPS_DIR)
  }

  pub fn archive(&self, spec: &DependencySpec) -> PathBuf {
    self.deps_dir().join(spec.archive_name())
  }

  pub fn platform_deps_dir(&self, platform: PlatformId) -> PathBuf {
    self.deps_dir().join(platform.as_str())
  }

  /// Extracted source tree, also the working directory of the dependency's build.
  pub fn source_dir(&self, platform: PlatformId, spec: &DependencySpec) -> PathBuf {
    self.platform_deps_dir(platform).join(spec.source_dir_name())
  }

  pub fn configured_stamp(&self, platform: PlatformId, spec: &DependencySpec) -> PathBuf {
    self.source_dir(platform, spec).join(CONFIGURED_STAMP)
  }

  pub fn compiled_stamp(&self, platform: PlatformId, spec: &DependencySpec) -> PathBuf {
    self.source_dir(platform, spec).join(COMPILED_STAMP)
  }

  pub fn install_dir(&self) -> PathBuf {
    self.root.join(INSTALL_DIR)
  }

  pub fn platform_install_dir(&self, platform: PlatformId) -> PathBuf {
    self.install_dir().join(platform.as_str())
  }

  pub fn install_prefix(&self, platform: PlatformId, dependency: Dependency) -> PathBuf {
    self.platform_install_dir(platform).join(dependency.name())
  }

  pub fn installed_stamp(&self, platform: PlatformId, dependency: Dependency) -> PathBuf {
    self.install_prefix(platform, dependency).join(INSTALLED_STAMP)
  }

  /// Static archives an install task is expected to produce.
  pub fn installed_libs(&self, platform: PlatformId, dependency: Dependency) -> Vec<PathBuf> {
    let lib_dir = self.install_prefix(platform, dependency).join("lib");
    dependency.static_libs().iter().map(|name| lib_dir.join(name)).collect()
  }

  /// Public header tree shipped with each slice.
  pub fn headers(&self, platform: PlatformId) -> PathBuf {
    self.install_prefix(platform, Dependency::Libgit2).join("include")
  }

  pub fn build_dir(&self) -> PathBuf {
    self.root.join(BUILD_DIR)
  }

  pub fn platform_build_dir(&self, platform: PlatformId) -> PathBuf {
    self.build_dir().join(platform.as_str())
  }

  pub fn library_file_name(&self) -> String {
    format!("lib{}.a", self.module_name)
  }

  pub fn combined_lib(&self, platform: PlatformId) -> PathBuf {
    self.platform_build_dir(platform).join(self.library_file_name())
  }

  pub fn fat_lib(&self, slice: Slice) -> PathBuf {
    self.build_dir().join(FAT_DIR).join(slice.as_str()).join(self.library_file_name())
  }

  /// Library that represents `slice` in the bundle: the fat binary for
  /// dual-architecture slices, the combined library otherwise.
  pub fn slice_lib(&self, slice: Slice) -> PathBuf {
    if slice.is_fat() {
      self.fat_lib(slice)
    } else {
      self.combined_lib(slice.platforms()[0])
    }
  }

  /// Headers packaged with `slice`. All platforms of a slice install the same headers.
  pub fn slice_headers(&self, slice: Slice) -> PathBuf {
    self.headers(slice.platforms()[0])
  }

  pub fn interface_file(&self) -> PathBuf {
    self.build_dir().join("module.modulemap")
  }

  pub fn bundle_dir(&self) -> PathBuf {
    self.root.join(format!("{}.xcframework", self.module_name))
  }

  /// File whose presence marks a completed bundle.
  pub fn bundle_marker(&self) -> PathBuf {
    self.bundle_dir().join("Info.plist")
  }

  pub fn log_file(&self) -> PathBuf {
    self.root.join(LOG_FILENAME)
  }

  pub fn lock_file(&self) -> PathBuf {
    self.root.join(LOCK_FILENAME)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  fn layout() -> Layout {
    Layout::new("/out", "Clibgit2")
  }

  #[test]
  fn per_platform_paths_are_disjoint() {
    let layout = layout();
    let spec = DependencySpec::new(Dependency::Libssh2, "1.11.0");
    let mut seen = HashSet::new();
    for platform in PlatformId::ALL {
      for path in [
        layout.source_dir(platform, &spec),
        layout.install_prefix(platform, Dependency::Libssh2),
        layout.combined_lib(platform),
      ] {
        assert!(path.to_string_lossy().contains(platform.as_str()));
        assert!(seen.insert(path.clone()), "duplicate path {}", path.display());
      }
    }
  }

  #[test]
  fn slice_lib_uses_fat_binary_only_for_dual_arch() {
    let layout = layout();
    assert_eq!(
      layout.slice_lib(Slice::MacOs),
      PathBuf::from("/out/build/fat/macos/libClibgit2.a")
    );
    assert_eq!(
      layout.slice_lib(Slice::Ios),
      PathBuf::from("/out/build/iphoneos/libClibgit2.a")
    );
  }

  #[test]
  fn installed_libs_cover_every_archive() {
    let libs = layout().installed_libs(PlatformId::MacOsx, Dependency::OpenSsl);
    assert_eq!(
      libs,
      vec![
        PathBuf::from("/out/install/macosx/openssl/lib/libssl.a"),
        PathBuf::from("/out/install/macosx/openssl/lib/libcrypto.a"),
      ]
    );
  }

  #[test]
  fn bundle_is_named_after_module() {
    let layout = layout();
    assert_eq!(layout.bundle_dir(), PathBuf::from("/out/Clibgit2.xcframework"));
    assert_eq!(layout.bundle_marker(), PathBuf::from("/out/Clibgit2.xcframework/Info.plist"));
  }
}
