//! Fetch action implementation.
//!
//! Downloads a dependency archive into the shared downloads cache. The file
//! is written to a temporary sibling and renamed into place only after the
//! optional checksum verified, so an interrupted download never looks
//! complete.

use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::execute::types::ExecuteError;
use crate::util::hash::{hash_bytes, hash_file};

/// Execute a Fetch action.
///
/// An existing file at `dest` is reused when it matches `expected_sha256`, or
/// unconditionally when no checksum is pinned.
///
/// # Returns
///
/// A one-line summary for the build log.
pub async fn execute_fetch(url: &str, dest: &Path, expected_sha256: Option<&str>) -> Result<String, ExecuteError> {
  if dest.exists() {
    match expected_sha256 {
      None => {
        debug!(path = %dest.display(), "using cached archive");
        return Ok(format!("using cached {}", dest.display()));
      }
      Some(expected) => {
        if hash_file(dest)?.matches(expected) {
          debug!(path = %dest.display(), "using cached archive");
          return Ok(format!("using cached {}", dest.display()));
        }
        warn!(path = %dest.display(), "cached archive hash mismatch, re-downloading");
      }
    }
  }

  info!(url = %url, "fetching URL");

  let response = reqwest::get(url).await.map_err(|e| ExecuteError::FetchFailed {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  if !response.status().is_success() {
    return Err(ExecuteError::FetchFailed {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().await.map_err(|e| ExecuteError::FetchFailed {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  let actual_hash = hash_bytes(&bytes);
  if let Some(expected) = expected_sha256
    && !actual_hash.matches(expected)
  {
    return Err(ExecuteError::HashMismatch {
      url: url.to_string(),
      expected: expected.to_string(),
      actual: actual_hash.0,
    });
  }

  let dest = dest.to_path_buf();
  let size = bytes.len();
  tokio::task::spawn_blocking(move || -> std::io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(&dest).map_err(|e| e.error)?;
    Ok(())
  })
  .await
  .map_err(|e| ExecuteError::Aborted(e.to_string()))??;

  info!(url = %url, size, sha256 = %actual_hash, "download complete");

  Ok(format!("downloaded {url} ({size} bytes, sha256 {actual_hash})"))
}
