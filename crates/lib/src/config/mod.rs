//! Locating and loading the project configuration.
//!
//! Without an explicit path, the configuration is `<project-root>/ts-make`
//! with the first existing extension in priority order (`.lua`, `.tl`,
//! `.json`). The project root is the nearest ancestor of the working
//! directory containing a `ts-make.*` file, a `lua_modules` directory or a
//! `.git` directory.

mod types;

pub use types::{Config, ConfigSchema, PluginDecl, TargetDecl};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_BASENAME, MODULES_DIR};
use crate::export::{ExportError, ExportFile, ExportLoader, extension_list, find_export_file};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no configuration found: looked for {} with extensions {}", .basename.display(), extension_list())]
  NotFound { basename: PathBuf },

  #[error("no project root found above {}: expected a ts-make.* file, a lua_modules directory or a .git directory", .start.display())]
  NoProjectRoot { start: PathBuf },

  #[error(transparent)]
  Export(#[from] ExportError),
}

/// A configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
  pub config: Config,
  pub file: ExportFile,
  /// Directory containing the config file; plugins resolve against it.
  pub base_dir: PathBuf,
}

/// Nearest ancestor of `start` (inclusive) that looks like a project root.
pub fn project_root(start: &Path) -> Option<PathBuf> {
  start.ancestors().find(|dir| is_project_root(dir)).map(Path::to_path_buf)
}

fn is_project_root(dir: &Path) -> bool {
  find_export_file(&dir.join(CONFIG_BASENAME)).is_some()
    || dir.join(MODULES_DIR).is_dir()
    || dir.join(".git").exists()
}

/// Locate the configuration file.
///
/// An explicit path is classified and returned as-is (resolved against `cwd`
/// when relative); no search happens and its existence is checked on load.
pub fn find_config(explicit: Option<&Path>, cwd: &Path) -> Result<ExportFile, ConfigError> {
  if let Some(path) = explicit {
    return Ok(ExportFile::classify(cwd.join(path))?);
  }

  let root = project_root(cwd).ok_or_else(|| ConfigError::NoProjectRoot {
    start: cwd.to_path_buf(),
  })?;
  let basename = root.join(CONFIG_BASENAME);
  let file = find_export_file(&basename).ok_or(ConfigError::NotFound { basename })?;
  debug!(path = %file.path.display(), "found configuration");
  Ok(file)
}

/// Project directory for a configuration file: its nearest project root, or
/// the file's own directory when none exists.
pub fn project_dir_for(file: &ExportFile) -> PathBuf {
  let dir = config_dir(file);
  project_root(&dir).unwrap_or(dir)
}

fn config_dir(file: &ExportFile) -> PathBuf {
  let absolute = dunce::canonicalize(&file.path).unwrap_or_else(|_| file.path.clone());
  absolute.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

/// Load and validate a configuration file.
pub async fn load_config(file: &ExportFile, exports: &ExportLoader) -> Result<LoadedConfig, ConfigError> {
  if !file.path.is_file() {
    return Err(ConfigError::Export(ExportError::Io {
      path: file.path.clone(),
      source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
    }));
  }

  let config = exports.validate_export(file, &ConfigSchema).await?;
  debug!(
    path = %file.path.display(),
    plugins = config.plugins.len(),
    targets = config.targets.len(),
    "loaded configuration"
  );

  Ok(LoadedConfig {
    config,
    file: file.clone(),
    base_dir: config_dir(file),
  })
}
