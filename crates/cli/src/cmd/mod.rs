mod make;
mod show_config;

pub use make::cmd_make;
pub use show_config::cmd_show_config;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tsmake_lib::settings::Settings;

/// Working directory and environment settings shared by every command.
fn environment() -> Result<(PathBuf, Settings)> {
  let cwd = env::current_dir().context("Failed to read the current directory")?;
  let settings = Settings::from_env().context("Invalid environment settings")?;
  Ok((cwd, settings))
}
