mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xcforge_lib::config::Config;

use crate::output::OutputFormat;

/// xcforge - build libgit2 and its dependencies into a static xcframework
#[derive(Parser)]
#[command(name = "xcforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Config file (default: ./xcforge.toml when present)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Build root, overriding XCFORGE_ROOT and the config file
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every stale artifact (default)
  Build(BuildArgs),

  /// Show which tasks a build would run
  Plan {
    /// Restrict to these platforms (repeatable)
    #[arg(short, long = "platform")]
    platforms: Vec<String>,

    /// Treat every task as stale
    #[arg(long)]
    force: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Remove build artifacts
  Clean {
    /// Only remove this platform's artifacts and what was merged from them
    #[arg(short, long)]
    platform: Option<String>,

    /// Show what would be removed without removing it
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Remove only the downloads cache
  CleanDeps {
    /// Show what would be removed without removing it
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

#[derive(Args, Default)]
struct BuildArgs {
  /// Number of tasks to run at once (default: config, else 1)
  #[arg(short, long)]
  jobs: Option<usize>,

  /// Restrict to these platforms (repeatable)
  #[arg(short, long = "platform")]
  platforms: Vec<String>,

  /// Rebuild everything regardless of timestamps
  #[arg(long)]
  force: bool,

  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

fn init_tracing(verbose: u8) {
  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
  let root = config.resolve_root(cli.root.as_deref());
  tracing::debug!(root = %root.display(), "resolved build root");

  match cli.command.unwrap_or(Commands::Build(BuildArgs::default())) {
    Commands::Build(args) => {
      if !args.platforms.is_empty() {
        config.build.platforms = args.platforms;
      }
      cmd::cmd_build(&config, &root, args.jobs, args.force, args.output)
    }
    Commands::Plan {
      platforms,
      force,
      output,
    } => {
      if !platforms.is_empty() {
        config.build.platforms = platforms;
      }
      cmd::cmd_plan(&config, &root, force, output)
    }
    Commands::Clean {
      platform,
      dry_run,
      output,
    } => cmd::cmd_clean(&config, &root, platform.as_deref(), dry_run, output),
    Commands::CleanDeps { dry_run, output } => cmd::cmd_clean_deps(&config, &root, dry_run, output),
  }
}
