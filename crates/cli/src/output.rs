//! Terminal output helpers shared by the commands.
//!
//! Status lines go to stdout, problems to stderr. Colors are dropped when the
//! stream is not a terminal.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const PLUS: &str = "+";
}

/// Human-readable size with binary units, one decimal above bytes.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  format!("{value:.1} {}", UNITS[unit])
}

/// Compact duration: `850ms`, `4.20s`, `3m 7s`, `1h 2m`.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  match secs {
    0 => format!("{}ms", duration.subsec_millis()),
    1..60 => format!("{secs}.{:02}s", duration.subsec_millis() / 10),
    60..3600 => format!("{}m {}s", secs / 60, secs % 60),
    _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
  }
}

fn status(symbol: &str, symbol_style: Style, message: &str) {
  println!(
    "{} {}",
    symbol.if_supports_color(Stream::Stdout, |s| s.style(symbol_style)),
    message
  );
}

fn problem(symbol: &str, style: Style, message: &str) {
  eprintln!(
    "{} {}",
    symbol.if_supports_color(Stream::Stderr, |s| s.style(style)),
    message.if_supports_color(Stream::Stderr, |s| s.style(style))
  );
}

pub fn print_success(message: &str) {
  status(symbols::SUCCESS, Style::new().green(), message);
}

pub fn print_info(message: &str) {
  status(symbols::INFO, Style::new().blue(), message);
}

pub fn print_error(message: &str) {
  problem(symbols::ERROR, Style::new().red(), message);
}

pub fn print_warning(message: &str) {
  problem(symbols::WARNING, Style::new().yellow(), message);
}

/// Indented `label: value` line under a status message.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

/// Captured tool output under an error, indented and dimmed on stderr.
pub fn print_captured(text: &str) {
  for line in text.lines() {
    eprintln!("    {}", line.if_supports_color(Stream::Stderr, |s| s.dimmed()));
  }
}

/// A task that would run, with the reason dimmed.
pub fn print_task(task: &str, reason: &str) {
  println!(
    "  {} {task} {}",
    symbols::PLUS.if_supports_color(Stream::Stdout, |s| s.green()),
    format!("({reason})").if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bytes_pick_the_largest_unit() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1024), "1.0 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(48 * 1024 * 1024), "48.0 MB");
    assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
  }

  #[test]
  fn durations_scale_with_length() {
    assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
    assert_eq!(format_duration(Duration::from_millis(4200)), "4.20s");
    assert_eq!(format_duration(Duration::from_secs(187)), "3m 7s");
    assert_eq!(format_duration(Duration::from_secs(3720)), "1h 2m");
  }

  #[test]
  fn json_is_detected() {
    assert!(OutputFormat::Json.is_json());
    assert!(!OutputFormat::Text.is_json());
  }
}
