//! Runtime settings taken from the environment.
//!
//! | Variable                 | Effect                                         |
//! |--------------------------|------------------------------------------------|
//! | `TS_MAKE_TL`             | Teal compiler program (default `tl`)           |
//! | `TS_MAKE_MODULE_DIRS`    | Package search dirs, `PATH`-style list         |
//! | `TS_MAKE_SUBPATHS`       | Comma-separated plugin subpaths to try         |
//! | `TS_MAKE_EXPORT_PATTERN` | Regex selecting plugin keys of `exports` maps  |

use std::env;
use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

use crate::export::compile::TealCompiler;
use crate::module::ResolveOptions;

pub const ENV_COMPILER: &str = "TS_MAKE_TL";
pub const ENV_MODULE_DIRS: &str = "TS_MAKE_MODULE_DIRS";
pub const ENV_SUBPATHS: &str = "TS_MAKE_SUBPATHS";
pub const ENV_EXPORT_PATTERN: &str = "TS_MAKE_EXPORT_PATTERN";

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("invalid {var}: {source}")]
  Pattern {
    var: &'static str,
    #[source]
    source: regex::Error,
  },
}

#[derive(Debug, Clone)]
pub struct Settings {
  /// Program used to compile `.tl` configs.
  pub compiler: String,
  pub resolve: ResolveOptions,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      compiler: TealCompiler::DEFAULT_PROGRAM.to_string(),
      resolve: ResolveOptions::default(),
    }
  }
}

impl Settings {
  /// Defaults, overridden by any `TS_MAKE_*` variable that is set and non-empty.
  pub fn from_env() -> Result<Self, SettingsError> {
    let mut settings = Self::default();

    if let Some(program) = non_empty(ENV_COMPILER) {
      settings.compiler = program;
    }

    if let Some(raw) = env::var_os(ENV_MODULE_DIRS).filter(|v| !v.is_empty()) {
      settings.resolve.module_dirs = env::split_paths(&raw)
        .filter(|p| !p.as_os_str().is_empty())
        .collect::<Vec<PathBuf>>();
    }

    if let Some(raw) = non_empty(ENV_SUBPATHS) {
      settings.resolve.subpath_candidates = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if s.starts_with('/') { s.to_string() } else { format!("/{}", s) })
        .collect();
    }

    if let Some(pattern) = non_empty(ENV_EXPORT_PATTERN) {
      settings.resolve.export_key_pattern = Regex::new(&pattern).map_err(|source| SettingsError::Pattern {
        var: ENV_EXPORT_PATTERN,
        source,
      })?;
    }

    Ok(settings)
  }
}

fn non_empty(var: &str) -> Option<String> {
  env::var(var).ok().filter(|v| !v.trim().is_empty())
}
