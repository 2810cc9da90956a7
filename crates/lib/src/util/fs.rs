//! Filesystem helpers shared by the linker, packager and clean.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy a directory recursively, merging into `dst` if it exists.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
  fs::create_dir_all(dst)?;
  for entry in fs::read_dir(src)? {
    let entry = entry?;
    let ty = entry.file_type()?;
    let dst_path = dst.join(entry.file_name());
    if ty.is_dir() {
      copy_dir_all(&entry.path(), &dst_path)?;
    } else {
      fs::copy(entry.path(), dst_path)?;
    }
  }
  Ok(())
}

/// Total size of regular files below `path`. Missing paths count as zero.
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
  let Ok(meta) = path.symlink_metadata() else {
    return Ok(());
  };
  if meta.is_dir() {
    fs::remove_dir_all(path)
  } else {
    fs::remove_file(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn copy_dir_all_copies_nested_files() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("git2/sys")).unwrap();
    fs::write(src.join("git2.h"), "top").unwrap();
    fs::write(src.join("git2/sys/repo.h"), "nested").unwrap();

    let dst = temp.path().join("dst");
    copy_dir_all(&src, &dst).unwrap();

    assert_eq!(fs::read_to_string(dst.join("git2.h")).unwrap(), "top");
    assert_eq!(fs::read_to_string(dst.join("git2/sys/repo.h")).unwrap(), "nested");
  }

  #[test]
  fn dir_size_sums_files() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a")).unwrap();
    fs::write(temp.path().join("a/one"), [0u8; 10]).unwrap();
    fs::write(temp.path().join("two"), [0u8; 5]).unwrap();
    assert_eq!(dir_size(temp.path()), 15);
    assert_eq!(dir_size(&temp.path().join("missing")), 0);
  }

  #[test]
  fn remove_path_handles_files_dirs_and_missing() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("f");
    let dir = temp.path().join("d");
    fs::write(&file, "x").unwrap();
    fs::create_dir_all(dir.join("inner")).unwrap();

    remove_path(&file).unwrap();
    remove_path(&dir).unwrap();
    remove_path(&temp.path().join("missing")).unwrap();

    assert!(!file.exists());
    assert!(!dir.exists());
  }
}
