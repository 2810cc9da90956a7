//! Fat-binary merge for dual-architecture slices.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::Tools;
use crate::platform::{Arch, Slice};
use crate::util::process::{ToolError, run_tool};

#[derive(Debug, Error)]
pub enum MergeError {
  #[error("missing {arch} library for {slice}: {path}")]
  MissingInput { slice: Slice, arch: Arch, path: PathBuf },

  #[error("{output} is missing architecture {arch} (lipo reports: {reported})")]
  MissingArch {
    output: PathBuf,
    arch: Arch,
    reported: String,
  },

  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
  pub slice: Slice,
  /// One combined library per architecture.
  pub inputs: Vec<(Arch, PathBuf)>,
  pub output: PathBuf,
}

/// Merge single-architecture libraries into a universal one and verify that
/// every architecture made it in.
pub async fn merge_fat(request: &MergeRequest, tools: &Tools) -> Result<String, MergeError> {
  for (arch, path) in &request.inputs {
    if !path.exists() {
      return Err(MergeError::MissingInput {
        slice: request.slice,
        arch: *arch,
        path: path.clone(),
      });
    }
  }

  if let Some(parent) = request.output.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }

  info!(slice = %request.slice, "creating fat library");

  let mut args = vec!["-create".to_string()];
  args.extend(request.inputs.iter().map(|(_, p)| p.to_string_lossy().into_owned()));
  args.push("-output".to_string());
  args.push(request.output.to_string_lossy().into_owned());
  run_tool(&tools.lipo, &args, None).await?;

  let out = run_tool(
    &tools.lipo,
    &["-archs".to_string(), request.output.to_string_lossy().into_owned()],
    None,
  )
  .await?;
  let reported = out.stdout.trim().to_string();
  let present: Vec<&str> = reported.split_whitespace().collect();

  for (arch, _) in &request.inputs {
    if !present.contains(&arch.as_str()) {
      return Err(MergeError::MissingArch {
        output: request.output.clone(),
        arch: *arch,
        reported,
      });
    }
  }

  Ok(format!("{} contains {}", request.output.display(), reported))
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::Path;

  use super::*;
  use crate::util::testutil::fake_tools;
  use tempfile::TempDir;

  fn request(dir: &Path) -> MergeRequest {
    MergeRequest {
      slice: Slice::MacOs,
      inputs: vec![
        (Arch::X86_64, dir.join("build/macosx/libClibgit2.a")),
        (Arch::Arm64, dir.join("build/macosx-arm64/libClibgit2.a")),
      ],
      output: dir.join("build/fat/macos/libClibgit2.a"),
    }
  }

  fn write_inputs(req: &MergeRequest) {
    for (arch, path) in &req.inputs {
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, arch.as_str()).unwrap();
    }
  }

  #[tokio::test]
  async fn merges_both_architectures() {
    let temp = TempDir::new().unwrap();
    let tools = fake_tools(temp.path(), "x86_64 arm64");
    let req = request(temp.path());
    write_inputs(&req);

    let summary = merge_fat(&req, &tools).await.unwrap();

    assert!(summary.ends_with("x86_64 arm64"));
    assert_eq!(fs::read_to_string(&req.output).unwrap(), "x86_64arm64");
  }

  #[tokio::test]
  async fn missing_input_names_architecture() {
    let temp = TempDir::new().unwrap();
    let tools = fake_tools(temp.path(), "x86_64 arm64");
    let req = request(temp.path());
    write_inputs(&req);
    fs::remove_file(&req.inputs[1].1).unwrap();

    let err = merge_fat(&req, &tools).await.unwrap_err();
    assert!(matches!(err, MergeError::MissingInput { arch: Arch::Arm64, .. }));
    assert!(err.to_string().contains("macosx-arm64"));
  }

  #[tokio::test]
  async fn missing_architecture_in_output_fails() {
    let temp = TempDir::new().unwrap();
    let tools = fake_tools(temp.path(), "x86_64");
    let req = request(temp.path());
    write_inputs(&req);

    let err = merge_fat(&req, &tools).await.unwrap_err();
    assert!(matches!(err, MergeError::MissingArch { arch: Arch::Arm64, .. }));
  }
}
