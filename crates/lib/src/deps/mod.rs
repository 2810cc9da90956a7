//! The three wrapped C libraries and their pinned sources.

pub mod recipe;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use recipe::Recipe;

/// One of the wrapped libraries, in link order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
  /// Cryptography library.
  OpenSsl,
  /// SSH transport library, built against OpenSSL.
  Libssh2,
  /// Source-control library, built against OpenSSL and libssh2.
  Libgit2,
}

impl Dependency {
  pub const ALL: [Dependency; 3] = [Dependency::OpenSsl, Dependency::Libssh2, Dependency::Libgit2];

  pub fn name(&self) -> &'static str {
    match self {
      Self::OpenSsl => "openssl",
      Self::Libssh2 => "libssh2",
      Self::Libgit2 => "libgit2",
    }
  }

  pub fn default_version(&self) -> &'static str {
    match self {
      Self::OpenSsl => "3.0.13",
      Self::Libssh2 => "1.11.0",
      Self::Libgit2 => "1.7.2",
    }
  }

  /// Static archives the dependency installs into `<prefix>/lib`.
  pub fn static_libs(&self) -> &'static [&'static str] {
    match self {
      Self::OpenSsl => &["libssl.a", "libcrypto.a"],
      Self::Libssh2 => &["libssh2.a"],
      Self::Libgit2 => &["libgit2.a"],
    }
  }

  /// Dependencies whose installed trees must exist before this one is configured.
  pub fn upstream(&self) -> &'static [Dependency] {
    match self {
      Self::OpenSsl => &[],
      Self::Libssh2 => &[Dependency::OpenSsl],
      Self::Libgit2 => &[Dependency::OpenSsl, Dependency::Libssh2],
    }
  }
}

impl fmt::Display for Dependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// A dependency pinned to a version, optionally with a known archive checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
  pub dependency: Dependency,
  pub version: String,
  pub sha256: Option<String>,
}

impl DependencySpec {
  pub fn new(dependency: Dependency, version: impl Into<String>) -> Self {
    Self {
      dependency,
      version: version.into(),
      sha256: None,
    }
  }

  pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
    self.sha256 = sha256;
    self
  }

  pub fn url(&self) -> String {
    let v = &self.version;
    match self.dependency {
      Dependency::OpenSsl => format!("https://www.openssl.org/source/openssl-{v}.tar.gz"),
      Dependency::Libssh2 => format!("https://www.libssh2.org/download/libssh2-{v}.tar.gz"),
      Dependency::Libgit2 => format!("https://github.com/libgit2/libgit2/archive/refs/tags/v{v}.tar.gz"),
    }
  }

  /// File name the archive is cached under. The libgit2 tag URL ends in
  /// `v<version>.tar.gz`, so the name is always derived rather than taken
  /// from the URL.
  pub fn archive_name(&self) -> String {
    format!("{}.tar.gz", self.source_dir_name())
  }

  pub fn source_dir_name(&self) -> String {
    format!("{}-{}", self.dependency.name(), self.version)
  }
}
