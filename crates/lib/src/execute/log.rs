//! Shared build log.
//!
//! Tasks never write the log file directly. Each task buffers its captured
//! output and hands it to a single writer task as one block, so blocks from
//! concurrently running tasks never interleave.

use std::io;
use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::graph::TaskId;

struct LogBlock {
  subject: String,
  status: &'static str,
  body: String,
}

impl LogBlock {
  fn render(&self) -> String {
    render_block(&self.subject, self.status, &self.body)
  }
}

fn render_block(subject: &str, status: &str, body: &str) -> String {
  let mut out = format!("==> {subject} ({status})\n");
  out.push_str(body);
  if !body.is_empty() && !body.ends_with('\n') {
    out.push('\n');
  }
  out
}

/// Append one block to the log outside of a running build, e.g. for an error
/// that stopped the build before any task ran.
pub fn append_block(path: &Path, subject: &str, status: &str, body: &str) -> io::Result<()> {
  use std::io::Write;

  let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
  file.write_all(render_block(subject, status, body).as_bytes())
}

/// Owner of the writer task. Dropping every handle and calling
/// [`BuildLog::close`] flushes the log.
pub struct BuildLog {
  sender: mpsc::UnboundedSender<LogBlock>,
  writer: JoinHandle<io::Result<()>>,
}

/// Cheap, cloneable sender used by running tasks.
#[derive(Clone)]
pub struct LogHandle {
  sender: mpsc::UnboundedSender<LogBlock>,
}

impl BuildLog {
  /// Open `path` for appending and start the writer.
  pub async fn open(path: &Path) -> io::Result<Self> {
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    let (sender, mut receiver) = mpsc::unbounded_channel::<LogBlock>();

    let writer = tokio::spawn(async move {
      while let Some(block) = receiver.recv().await {
        file.write_all(block.render().as_bytes()).await?;
      }
      file.flush().await?;
      Ok(())
    });

    Ok(Self { sender, writer })
  }

  pub fn handle(&self) -> LogHandle {
    LogHandle {
      sender: self.sender.clone(),
    }
  }

  /// Wait for every queued block to be written.
  pub async fn close(self) -> io::Result<()> {
    drop(self.sender);
    self
      .writer
      .await
      .map_err(|e| io::Error::other(format!("log writer stopped: {e}")))?
  }
}

impl LogHandle {
  pub fn append(&self, task: TaskId, status: &'static str, body: String) {
    let block = LogBlock {
      subject: task.to_string(),
      status,
      body,
    };
    if self.sender.send(block).is_err() {
      warn!(task = %task, "build log closed, dropping output");
    }
  }
}
