//! Options and errors for module resolution and loading.

use std::path::PathBuf;

use mlua::prelude::*;
use regex::Regex;
use thiserror::Error;

/// Controls how package specifiers are located on disk.
///
/// Relative and absolute specifiers ignore everything here; these options only
/// apply when a specifier names an installed package.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
  /// Directories (relative to the base directory) searched for packages, in order.
  pub module_dirs: Vec<PathBuf>,

  /// Subpaths appended to a package name when its root entry cannot be found.
  pub subpath_candidates: Vec<String>,

  /// Export-map keys worth trying when subpaths fail.
  pub export_key_pattern: Regex,

  /// Conditions consulted, in order, when an export target is conditional.
  pub export_conditions: Vec<String>,
}

impl ResolveOptions {
  pub const DEFAULT_MODULE_DIRS: &'static [&'static str] = &["lua_modules/share/lua/5.4", "lua_modules", "lua"];
  pub const DEFAULT_SUBPATHS: &'static [&'static str] = &["/plugin", "/dist/plugin", "/ts-make", "/dist/ts-make"];
  pub const DEFAULT_EXPORT_PATTERN: &'static str = "(?i)plugin|ts-make|loader";
  pub const DEFAULT_CONDITIONS: &'static [&'static str] = &["lua", "default"];
}

impl Default for ResolveOptions {
  fn default() -> Self {
    Self {
      module_dirs: Self::DEFAULT_MODULE_DIRS.iter().map(PathBuf::from).collect(),
      subpath_candidates: Self::DEFAULT_SUBPATHS.iter().map(|s| s.to_string()).collect(),
      export_key_pattern: Regex::new(Self::DEFAULT_EXPORT_PATTERN).expect("default export pattern is valid"),
      export_conditions: Self::DEFAULT_CONDITIONS.iter().map(|s| s.to_string()).collect(),
    }
  }
}

/// Error policy for [`ModuleLoader::load_many`](super::ModuleLoader::load_many).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadManyOptions {
  /// Keep loading the remaining specifiers after a failure and report all failures together.
  pub continue_on_error: bool,

  /// With `continue_on_error`, log failures and return only the successes.
  pub swallow_errors: bool,
}

/// A specifier could not be resolved by any strategy.
#[derive(Debug, Clone, Error)]
#[error(
  "cannot resolve \"{specifier}\" from {}: check it is installed and exposes a loadable entry (try adding one of: {})",
  .base_dir.display(),
  .candidates.join(", ")
)]
pub struct ResolveError {
  pub specifier: String,
  pub base_dir: PathBuf,
  pub candidates: Vec<String>,
}

/// Errors produced while loading a module.
///
/// Cloneable because a single load result is shared by every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  /// Executing the module failed.
  #[error("error loading \"{}\": {source}", .location.display())]
  Import {
    location: PathBuf,
    #[source]
    source: LuaError,
  },

  /// The module loaded but its exports were rejected by the caller's projection.
  #[error("module \"{specifier}\" ({}) {message}", .location.display())]
  Instance {
    specifier: String,
    location: PathBuf,
    message: String,
  },

  /// A failure attributed to one specifier of a batch.
  #[error("[{specifier}] {source}")]
  Specifier {
    specifier: String,
    #[source]
    source: Box<LoadError>,
  },

  /// Every failure of a batch load run with `continue_on_error`.
  #[error("failed to load {} module(s):\n{}", .0.len(), render_list(.0))]
  Aggregate(Vec<LoadError>),
}

impl LoadError {
  /// Attach the specifier that produced this error.
  pub fn for_specifier(self, specifier: &str) -> Self {
    LoadError::Specifier {
      specifier: specifier.to_string(),
      source: Box::new(self),
    }
  }
}

fn render_list(errors: &[LoadError]) -> String {
  errors
    .iter()
    .map(|e| format!("  - {}", e))
    .collect::<Vec<_>>()
    .join("\n")
}
