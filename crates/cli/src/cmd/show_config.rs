//! Implementation of the `ts-make show-config` command.
//!
//! Prints the validated configuration as JSON. With `--check` the plugins are
//! then loaded and the target graph is validated too, exactly as `make` would,
//! without running any action.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use tsmake_lib::make::Session;

use super::environment;
use crate::output::{print_json, print_success};

pub async fn cmd_show_config(file: Option<&Path>, check: bool) -> Result<()> {
  let (cwd, settings) = environment()?;

  let session = Session::open(file, &cwd, &settings)
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))
    .context("Failed to load configuration")?;

  print_json(&session.config.config)?;
  if !check {
    return Ok(());
  }

  debug!(config = %session.config.file.path.display(), "checking build model");
  let spec = session.build_model().await.map_err(|e| anyhow::anyhow!("{e}")).context("Invalid build configuration")?;
  print_success(&format!(
    "{} is valid: {} target(s), {} plugin(s), {} action(s)",
    session.config.file.path.display(),
    spec.targets().len(),
    spec.plugins().len(),
    spec.actions().len()
  ));
  Ok(())
}
