//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary working directory and build root.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Environment with `xcforge.toml` in the working directory.
  pub fn with_config(content: &str) -> Self {
    let env = Self::empty();
    env.write_file("xcforge.toml", content);
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Build root handed to the binary through `XCFORGE_ROOT`.
  pub fn root_path(&self) -> PathBuf {
    self.temp.path().join("root")
  }

  /// Get a pre-configured Command for the xcforge binary.
  pub fn xcforge_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("xcforge");
    cmd.current_dir(self.temp.path());
    cmd.env("XCFORGE_ROOT", self.root_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
