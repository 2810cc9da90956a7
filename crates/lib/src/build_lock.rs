//! Exclusive lock on a build root.
//!
//! Two processes building into the same root would race on every artifact,
//! so `build` and the clean commands hold an advisory `flock` on
//! `<root>/.lock` for their whole run. The file records who holds it, which
//! is what a blocked invocation reports.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::layout::Layout;

/// Who holds the lock, as written into the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
  pub pid: u32,
  pub command: String,
  pub started_at_unix: u64,
}

impl LockHolder {
  fn current(command: &str) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      started_at_unix: unix_now(),
    }
  }

  /// Holder recorded in `lock_path`, if it can be read.
  pub fn read(lock_path: &Path) -> Option<Self> {
    let contents = std::fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
  }

  fn age_secs(&self) -> u64 {
    unix_now().saturating_sub(self.started_at_unix)
  }
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "build root {} is in use by `xcforge {}` (pid {}, started {}s ago)\n\
     If no xcforge process is running, remove {}",
    .root.display(), .holder.command, .holder.pid, .holder.age_secs(), .lock_path.display()
  )]
  Held {
    root: PathBuf,
    holder: LockHolder,
    lock_path: PathBuf,
  },

  #[error(
    "build root {} is in use by another process\n\
     If no xcforge process is running, remove {}",
    .root.display(), .lock_path.display()
  )]
  HeldByUnknown { root: PathBuf, lock_path: PathBuf },

  #[error("failed to prepare lock file {}: {source}", .lock_path.display())]
  Io {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct BuildLock {
  _file: File,
  lock_path: PathBuf,
}

impl BuildLock {
  /// Take the exclusive lock on the layout's root, creating the root if needed.
  ///
  /// Never waits: a held lock is reported immediately with its holder.
  pub fn acquire(layout: &Layout, command: &str) -> Result<Self, BuildLockError> {
    let root = layout.root();
    let lock_path = layout.lock_file();
    let io_err = |source| BuildLockError::Io {
      lock_path: lock_path.clone(),
      source,
    };

    std::fs::create_dir_all(root).map_err(io_err)?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(io_err)?;

    match try_lock(&file) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
        let root = root.to_path_buf();
        return Err(match LockHolder::read(&lock_path) {
          Some(holder) => BuildLockError::Held {
            root,
            holder,
            lock_path: lock_path.clone(),
          },
          None => BuildLockError::HeldByUnknown {
            root,
            lock_path: lock_path.clone(),
          },
        });
      }
      Err(e) => return Err(io_err(e)),
    }

    record_holder(&file, &LockHolder::current(command)).map_err(io_err)?;
    debug!(path = %lock_path.display(), command, "acquired build lock");

    Ok(Self { _file: file, lock_path })
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn record_holder(file: &File, holder: &LockHolder) -> io::Result<()> {
  file.set_len(0)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer(&mut writer, holder).map_err(io::Error::other)?;
  writer.flush()
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(not(unix))]
fn try_lock(file: &File) -> io::Result<()> {
  file.try_lock().map_err(|e| match e {
    std::fs::TryLockError::WouldBlock => io::Error::from(io::ErrorKind::WouldBlock),
    std::fs::TryLockError::Error(err) => err,
  })
}
