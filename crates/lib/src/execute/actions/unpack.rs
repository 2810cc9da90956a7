//! Unpack action implementation.
//!
//! Source archives carry a single top-level directory (`openssl-3.0.13/`),
//! which is stripped so the tree lands directly in the destination.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::info;

use crate::execute::types::ExecuteError;
use crate::util::fs::remove_path;

/// Replace `dest` with a fresh extraction of `archive`.
pub async fn execute_unpack(archive: &Path, dest: &Path) -> Result<String, ExecuteError> {
  info!(archive = %archive.display(), dest = %dest.display(), "unpacking");

  let archive_path = archive.to_path_buf();
  let dest_path = dest.to_path_buf();
  let count = tokio::task::spawn_blocking(move || -> std::io::Result<usize> {
    remove_path(&dest_path)?;
    fs::create_dir_all(&dest_path)?;
    unpack_tar_gz(&archive_path, &dest_path)
  })
  .await
  .map_err(|e| ExecuteError::Aborted(e.to_string()))?
  .map_err(|e| ExecuteError::UnpackFailed {
    archive: archive.to_path_buf(),
    message: e.to_string(),
  })?;

  Ok(format!("unpacked {count} entries into {}", dest.display()))
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> std::io::Result<usize> {
  let file = File::open(archive_path)?;
  let decoder = GzDecoder::new(BufReader::new(file));
  let mut archive = Archive::new(decoder);
  archive.set_preserve_mtime(true);

  let mut count = 0;
  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?;

    // Strip the first component (e.g., libssh2-1.11.0/)
    let stripped: PathBuf = path.components().skip(1).collect();

    if stripped.as_os_str().is_empty() || stripped.components().any(|c| matches!(c, Component::ParentDir)) {
      continue;
    }

    let dest_path = dest.join(&stripped);

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }

    entry.unpack(&dest_path)?;
    count += 1;
  }

  Ok(count)
}

#[cfg(test)]
mod tests {
  use super::*;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use tempfile::TempDir;

  fn make_tar_gz(path: &Path, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
      let mut header = tar::Header::new_gnu();
      header.set_size(content.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
  }

  #[tokio::test]
  async fn strips_top_level_directory() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("libgit2-1.7.2.tar.gz");
    make_tar_gz(
      &archive,
      &[
        ("libgit2-1.7.2/CMakeLists.txt", "project(libgit2)"),
        ("libgit2-1.7.2/include/git2.h", "// git2"),
      ],
    );
    let dest = temp.path().join("deps/macosx/libgit2-1.7.2");

    execute_unpack(&archive, &dest).await.unwrap();

    assert_eq!(fs::read_to_string(dest.join("CMakeLists.txt")).unwrap(), "project(libgit2)");
    assert!(dest.join("include/git2.h").exists());
    assert!(!dest.join("libgit2-1.7.2").exists());
  }

  #[tokio::test]
  async fn replaces_previous_tree() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    make_tar_gz(&archive, &[("top/configure", "#!/bin/sh")]);
    let dest = temp.path().join("src");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join(".xcforge-compiled"), "").unwrap();

    execute_unpack(&archive, &dest).await.unwrap();

    assert!(dest.join("configure").exists());
    assert!(!dest.join(".xcforge-compiled").exists());
  }

  #[tokio::test]
  async fn corrupt_archive_is_unpack_failure() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("bad.tar.gz");
    fs::write(&archive, b"not gzip").unwrap();

    let err = execute_unpack(&archive, &temp.path().join("out")).await.unwrap_err();

    assert!(matches!(err, ExecuteError::UnpackFailed { .. }));
  }
}
