//! Bundle packaging.
//!
//! The bundle is assembled by `xcodebuild -create-xcframework` from one
//! library and header tree per slice. The shared module map is then copied
//! into every slice's `Headers/` directory so each slice can be imported as a
//! module.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ModuleSection, Tools};
use crate::platform::Slice;
use crate::util::fs::remove_path;
use crate::util::hash::hash_file;
use crate::util::process::{ToolError, run_tool};

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("missing library for slice {slice}: {path}")]
  MissingLibrary { slice: Slice, path: PathBuf },

  #[error("missing headers for slice {slice}: {path}")]
  MissingHeaders { slice: Slice, path: PathBuf },

  #[error("missing interface file: {0}")]
  MissingInterface(PathBuf),

  #[error("bundle has {found} slices, expected {expected}")]
  SliceCount { expected: usize, found: usize },

  #[error("interface copy differs from source: {0}")]
  InterfaceMismatch(PathBuf),

  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceInput {
  pub slice: Slice,
  pub library: PathBuf,
  pub headers: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
  pub slices: Vec<SliceInput>,
  /// Module map copied into every slice.
  pub interface: PathBuf,
  /// Bundle directory (`<Module>.xcframework`).
  pub output: PathBuf,
}

/// Render the module map for the combined library.
pub fn render_module_map(module: &ModuleSection) -> String {
  let mut out = format!("module {} {{\n", module.name);
  out.push_str(&format!("    umbrella header \"{}\"\n", module.umbrella_header));
  for lib in &module.links {
    out.push_str(&format!("    link \"{lib}\"\n"));
  }
  out.push_str("    export *\n}\n");
  out
}

/// Write the module map only when its content changed, so an unchanged
/// configuration does not make the bundle stale.
///
/// Returns whether the file was written.
pub fn write_interface_if_changed(path: &Path, module: &ModuleSection) -> std::io::Result<bool> {
  let content = render_module_map(module);
  if let Ok(existing) = std::fs::read_to_string(path)
    && existing == content
  {
    debug!(path = %path.display(), "interface file unchanged");
    return Ok(false);
  }
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, content)?;
  info!(path = %path.display(), "wrote interface file");
  Ok(true)
}

/// Assemble the bundle and install the interface file into every slice.
pub async fn package(request: &PackageRequest, tools: &Tools) -> Result<String, PackageError> {
  for input in &request.slices {
    if !input.library.exists() {
      return Err(PackageError::MissingLibrary {
        slice: input.slice,
        path: input.library.clone(),
      });
    }
    if !input.headers.is_dir() {
      return Err(PackageError::MissingHeaders {
        slice: input.slice,
        path: input.headers.clone(),
      });
    }
  }
  if !request.interface.exists() {
    return Err(PackageError::MissingInterface(request.interface.clone()));
  }

  // xcodebuild refuses to overwrite an existing bundle
  remove_path(&request.output)?;

  info!(bundle = %request.output.display(), slices = request.slices.len(), "creating bundle");

  let mut args = vec!["-create-xcframework".to_string()];
  for input in &request.slices {
    args.push("-library".to_string());
    args.push(input.library.to_string_lossy().into_owned());
    args.push("-headers".to_string());
    args.push(input.headers.to_string_lossy().into_owned());
  }
  args.push("-output".to_string());
  args.push(request.output.to_string_lossy().into_owned());
  run_tool(&tools.xcodebuild, &args, None).await?;

  // A bundle without its interface copies must not survive as a finished one
  match install_interface(request) {
    Ok(slices) => Ok(format!("packaged {slices} slices into {}", request.output.display())),
    Err(e) => {
      remove_path(&request.output)?;
      Err(e)
    }
  }
}

/// Copy the interface file into every slice of a freshly created bundle.
fn install_interface(request: &PackageRequest) -> Result<usize, PackageError> {
  let header_dirs = slice_header_dirs(&request.output)?;
  if header_dirs.len() != request.slices.len() {
    return Err(PackageError::SliceCount {
      expected: request.slices.len(),
      found: header_dirs.len(),
    });
  }

  let file_name = request
    .interface
    .file_name()
    .ok_or_else(|| PackageError::MissingInterface(request.interface.clone()))?;
  let source_hash = hash_file(&request.interface)?;

  for dir in &header_dirs {
    let dest = dir.join(file_name);
    std::fs::copy(&request.interface, &dest)?;
    if hash_file(&dest)? != source_hash {
      return Err(PackageError::InterfaceMismatch(dest));
    }
  }

  Ok(header_dirs.len())
}

/// `Headers/` directories of every slice in a bundle, sorted.
pub fn slice_header_dirs(bundle: &Path) -> std::io::Result<Vec<PathBuf>> {
  let mut dirs = Vec::new();
  for entry in std::fs::read_dir(bundle)? {
    let headers = entry?.path().join("Headers");
    if headers.is_dir() {
      dirs.push(headers);
    }
  }
  dirs.sort();
  Ok(dirs)
}
