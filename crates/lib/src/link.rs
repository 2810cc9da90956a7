//! Per-platform static library merge.
//!
//! The combined library is an archive-level merge of every static library the
//! three dependencies installed for a platform. Nothing is relinked: member
//! objects are copied as-is, and the result is checked member by member
//! against its inputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Archiver, Tools};
use crate::platform::PlatformId;
use crate::util::fs::{copy_dir_all, remove_path};
use crate::util::process::{ToolError, run_tool, run_tool_in};

/// Symbol table members some archivers list alongside real objects.
const SYMBOL_TABLE_MEMBERS: &[&str] = &["__.SYMDEF", "__.SYMDEF SORTED", "__.SYMDEF_64", "/", "//", "/SYM64/"];

#[derive(Debug, Error)]
pub enum LinkError {
  #[error("missing input archive: {0}")]
  MissingArchive(PathBuf),

  #[error("archive {output} does not match its inputs (missing: {missing:?}, unexpected: {unexpected:?})")]
  MemberMismatch {
    output: PathBuf,
    missing: Vec<String>,
    unexpected: Vec<String>,
  },

  #[error("path {0} cannot be written into an ar MRI script (whitespace or one of `,();*+`)")]
  UnsafeMriPath(PathBuf),

  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Recovery for a dependency whose install step left its archive in the build
/// tree instead of the install prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFallback {
  /// Where the archive is expected after install.
  pub library: PathBuf,
  /// Build tree searched for an archive with the same file name.
  pub search_dir: PathBuf,
  /// Raw public headers in the source tree.
  pub include_src: PathBuf,
  pub include_dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
  pub platform: PlatformId,
  /// Archives to merge, in link order.
  pub inputs: Vec<PathBuf>,
  pub output: PathBuf,
  pub fallback: Option<InstallFallback>,
}

/// Merge the request's archives into one static library.
///
/// Returns a one-line summary for the build log.
pub async fn link_platform(request: &LinkRequest, tools: &Tools) -> Result<String, LinkError> {
  let platform = request.platform;

  if let Some(fallback) = &request.fallback
    && !fallback.library.exists()
  {
    recover_install(fallback)?;
  }

  for input in &request.inputs {
    if !input.exists() {
      return Err(LinkError::MissingArchive(input.clone()));
    }
  }

  let mut expected = Vec::new();
  for input in &request.inputs {
    expected.extend(list_members(&tools.ar, input).await?);
  }

  if let Some(parent) = request.output.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  // Both archivers append to an existing output
  remove_path(&request.output)?;

  info!(platform = %platform, inputs = request.inputs.len(), "merging static libraries");
  merge_archives(tools, &request.inputs, &request.output).await?;

  let actual = list_members(&tools.ar, &request.output).await?;
  verify_members(&request.output, expected, actual.clone())?;

  debug!(platform = %platform, members = actual.len(), "combined library verified");

  Ok(format!(
    "merged {} archives into {} ({} members)",
    request.inputs.len(),
    request.output.display(),
    actual.len()
  ))
}

/// Copy a misplaced archive and the raw headers into the install prefix.
fn recover_install(fallback: &InstallFallback) -> Result<(), LinkError> {
  let Some(name) = fallback.library.file_name() else {
    return Err(LinkError::MissingArchive(fallback.library.clone()));
  };

  let found = WalkDir::new(&fallback.search_dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .find(|e| e.file_type().is_file() && e.file_name() == name)
    .map(|e| e.into_path());

  let Some(found) = found else {
    return Err(LinkError::MissingArchive(fallback.library.clone()));
  };

  warn!(
    found = %found.display(),
    expected = %fallback.library.display(),
    "archive missing from install prefix, copying from build tree"
  );

  if let Some(parent) = fallback.library.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::copy(&found, &fallback.library)?;

  if fallback.include_src.is_dir() {
    copy_dir_all(&fallback.include_src, &fallback.include_dest)?;
  }

  Ok(())
}

async fn merge_archives(tools: &Tools, inputs: &[PathBuf], output: &Path) -> Result<(), LinkError> {
  match tools.archiver {
    Archiver::Libtool => {
      let mut args = vec!["-static".to_string(), "-o".to_string(), path_arg(output)];
      args.extend(inputs.iter().map(|p| path_arg(p)));
      run_tool(&tools.libtool, &args, None).await?;
    }
    Archiver::Ar => {
      // MRI has no quoting, so names are written relative to the output's directory
      let dir = output.parent().unwrap_or(Path::new("."));
      let script = mri_script(dir, inputs, output)?;
      run_tool_in(&tools.ar, &["-M".to_string()], Some(&script), dir).await?;
    }
  }
  Ok(())
}

/// MRI script that creates `output` from every member of `inputs`, with
/// every path relative to `dir`.
fn mri_script(dir: &Path, inputs: &[PathBuf], output: &Path) -> Result<String, LinkError> {
  let mut script = format!("CREATE {}\n", mri_name(dir, output)?);
  for input in inputs {
    script.push_str(&format!("ADDLIB {}\n", mri_name(dir, input)?));
  }
  script.push_str("SAVE\nEND\n");
  Ok(script)
}

fn mri_name(dir: &Path, path: &Path) -> Result<String, LinkError> {
  let name = path_arg(&relative_to(dir, path));
  let unsafe_char = |c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | ';' | '*' | '+');
  if name.is_empty() || name.chars().any(unsafe_char) {
    return Err(LinkError::UnsafeMriPath(path.to_path_buf()));
  }
  Ok(name)
}

/// `path` expressed from `base`. Paths sharing no prefix come back unchanged.
fn relative_to(base: &Path, path: &Path) -> PathBuf {
  let base: Vec<_> = base.components().collect();
  let target: Vec<_> = path.components().collect();
  let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();
  if common == 0 {
    return path.to_path_buf();
  }

  let mut relative = PathBuf::new();
  for _ in common..base.len() {
    relative.push("..");
  }
  for component in &target[common..] {
    relative.push(component);
  }
  relative
}

/// Member names of an archive, symbol tables excluded.
pub async fn list_members(ar: &str, archive: &Path) -> Result<Vec<String>, LinkError> {
  let out = run_tool(ar, &["t".to_string(), path_arg(archive)], None).await?;
  Ok(
    out
      .stdout
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !SYMBOL_TABLE_MEMBERS.contains(line))
      .map(str::to_string)
      .collect(),
  )
}

/// Compare member multisets.
fn verify_members(output: &Path, expected: Vec<String>, actual: Vec<String>) -> Result<(), LinkError> {
  let mut counts: BTreeMap<String, i64> = BTreeMap::new();
  for name in expected {
    *counts.entry(name).or_default() += 1;
  }
  for name in actual {
    *counts.entry(name).or_default() -= 1;
  }

  let mut missing = Vec::new();
  let mut unexpected = Vec::new();
  for (name, count) in counts {
    if count > 0 {
      missing.extend(std::iter::repeat_n(name.clone(), count as usize));
    } else if count < 0 {
      unexpected.extend(std::iter::repeat_n(name.clone(), (-count) as usize));
    }
  }

  if missing.is_empty() && unexpected.is_empty() {
    Ok(())
  } else {
    Err(LinkError::MemberMismatch {
      output: output.to_path_buf(),
      missing,
      unexpected,
    })
  }
}

fn path_arg(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}
