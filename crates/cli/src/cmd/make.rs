//! Implementation of the `ts-make make` command.
//!
//! Loads the project, builds the model and runs the plan rooted at the
//! requested target. In watch mode the build is raced against Ctrl-C; dropping
//! the build future kills any child process an action is waiting on.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info};

use tsmake_lib::make::{Make, MakeOptions, MakeReport, Session};

use super::environment;
use crate::output::{OutputFormat, format_duration, print_info, print_json, print_stat, print_success};

pub async fn cmd_make(
  target: Option<String>,
  file: Option<&Path>,
  watch: bool,
  dry_run: bool,
  output: OutputFormat,
) -> Result<()> {
  let (cwd, settings) = environment()?;
  let started = Instant::now();

  let session = Session::open(file, &cwd, &settings)
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("Failed to load configuration")?;
  let spec = session.build_model().await.map_err(|e| anyhow::anyhow!("{e}")).context("Invalid build configuration")?;

  let options = MakeOptions {
    target,
    watch,
    dry_run,
  };
  debug!(project = %session.project_dir.display(), targets = spec.targets().len(), "model ready");
  info!(
    make_target = options.target.as_deref().unwrap_or("<default>"),
    watch,
    dry_run,
    "starting build"
  );
  let make = Make::new(&spec, &session.project_dir, options);

  let report = if watch {
    tokio::select! {
      report = make.build() => report.map_err(|e| anyhow::anyhow!("{e}"))?,
      interrupted = tokio::signal::ctrl_c() => {
        interrupted.context("Failed to listen for Ctrl-C")?;
        info!("watch interrupted");
        print_info("Interrupted, stopping watch");
        return Ok(());
      }
    }
  } else {
    make.build().await.map_err(|e| anyhow::anyhow!("{e}"))?
  };

  if output.is_json() {
    return print_json(&json!({
      "root": report.root,
      "built": report.built,
      "steps": report.steps,
      "dry_run": dry_run,
    }));
  }

  print_report(&report, dry_run, started);
  Ok(())
}

fn print_report(report: &MakeReport, dry_run: bool, started: Instant) {
  if dry_run {
    for step in &report.steps {
      println!("{}", step);
    }
    println!();
    print_info(&format!(
      "Would build {} target(s) for \"{}\"",
      report.built.len(),
      report.root
    ));
    return;
  }

  print_success(&format!("Built \"{}\"", report.root));
  print_stat("Targets", &report.built.join(", "));
  print_stat("Time", &format_duration(started.elapsed()));
}
