mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, print_error};

/// ts-make - plugin-driven build orchestration
#[derive(Parser)]
#[command(name = "ts-make")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging (RUST_LOG takes precedence)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a target after its dependencies
  Make {
    /// Target to build (default: defaultTarget, then "default")
    target: Option<String>,

    /// Configuration file (default: ts-make.{lua,tl,json} in the project root)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Ask actions to keep watching; stops on Ctrl-C
    #[arg(short, long)]
    watch: bool,

    /// Print the build steps without running any action
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Print the loaded configuration
  ShowConfig {
    /// Configuration file (default: ts-make.{lua,tl,json} in the project root)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Also load plugins and validate the target graph
    #[arg(long)]
    check: bool,
  },
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();
}

async fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Make {
      target,
      file,
      watch,
      dry_run,
      output,
    } => cmd::cmd_make(target, file.as_deref(), watch, dry_run, output).await,
    Commands::ShowConfig { file, check } => cmd::cmd_show_config(file.as_deref(), check).await,
  }
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  // The Lua VM is not Send, so everything runs on one thread.
  let result = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
    .and_then(|runtime| runtime.block_on(run(cli)));

  if let Err(err) = result {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}
