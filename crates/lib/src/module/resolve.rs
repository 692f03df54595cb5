//! Specifier resolution.
//!
//! # Resolution Algorithm
//!
//! Strategies are tried in order and the first hit wins:
//! 1. `file://` locations and path-like specifiers (`./x`, `../x`, `/abs/x`)
//!    resolve against the base directory with no package lookup
//! 2. The package's root entry (`<name>.lua`, `<name>/init.lua`) in each module directory
//!
//! Package lookups (2 to 4) look for the module directories in the base
//! directory and then in each of its ancestors, nearest first.
//! 3. Each configured subpath candidate appended to the package name
//! 4. Keys of the package manifest's `exports` map that match the export-key
//!    pattern, shortest key first
//!
//! When everything fails the error lists the subpath candidates that were tried.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, trace};

use super::types::{ResolveError, ResolveOptions};
use crate::consts::PACKAGE_MANIFEST;

const FILE_SCHEME: &str = "file://";

/// The part of a package manifest consulted during resolution.
#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
  #[serde(default)]
  exports: Option<BTreeMap<String, ExportTarget>>,
}

/// An export target: either a path or a map of condition name to target.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportTarget {
  Path(String),
  Conditional(BTreeMap<String, ExportTarget>),
}

impl ExportTarget {
  /// Pick the path for this target, honouring conditions in priority order.
  fn select(&self, conditions: &[String]) -> Option<&str> {
    match self {
      ExportTarget::Path(path) => Some(path),
      ExportTarget::Conditional(by_condition) => conditions
        .iter()
        .filter_map(|c| by_condition.get(c))
        .find_map(|target| target.select(conditions)),
    }
  }
}

/// Resolve a module specifier relative to a base directory.
pub fn resolve(specifier: &str, base_dir: &Path, options: &ResolveOptions) -> Result<PathBuf, ResolveError> {
  if let Some(path) = specifier.strip_prefix(FILE_SCHEME) {
    return Ok(PathBuf::from(path));
  }

  if is_path_like(specifier) {
    return Ok(resolve_path(base_dir, specifier));
  }

  if let Some(entry) = search_package(specifier, base_dir, options) {
    debug!(specifier, entry = %entry.display(), "resolved package entry");
    return Ok(entry);
  }

  for subpath in &options.subpath_candidates {
    let candidate = format!("{}{}", specifier, subpath);
    if let Some(entry) = search_package(&candidate, base_dir, options) {
      debug!(specifier, subpath = %subpath, entry = %entry.display(), "resolved package subpath");
      return Ok(entry);
    }
  }

  if let Some(entry) = search_exports(specifier, base_dir, options) {
    debug!(specifier, entry = %entry.display(), "resolved through package exports");
    return Ok(entry);
  }

  Err(ResolveError {
    specifier: specifier.to_string(),
    base_dir: base_dir.to_path_buf(),
    candidates: options.subpath_candidates.clone(),
  })
}

/// True for specifiers that name a file rather than a package.
pub fn is_path_like(specifier: &str) -> bool {
  specifier.starts_with('.') || Path::new(specifier).is_absolute()
}

/// Resolve a path-like specifier, accepting the Lua-style `.lua` and `init.lua` shorthands.
fn resolve_path(base_dir: &Path, specifier: &str) -> PathBuf {
  let joined = base_dir.join(specifier);
  if joined.is_file() {
    return dunce::canonicalize(&joined).unwrap_or(joined);
  }

  let shorthands = [
    PathBuf::from(format!("{}.lua", joined.display())),
    joined.join("init.lua"),
  ];
  shorthands
    .into_iter()
    .find(|p| p.is_file())
    .map(|p| dunce::canonicalize(&p).unwrap_or(p))
    .unwrap_or(joined)
}

/// Map a package name to a relative path (`a.b` → `a/b`, as `require` does).
fn name_to_path(name: &str) -> PathBuf {
  PathBuf::from(name.replace('.', "/"))
}

/// Every module directory that may hold packages, nearest ancestor of `base_dir` first.
fn module_roots(base_dir: &Path, options: &ResolveOptions) -> Vec<PathBuf> {
  let mut roots: Vec<PathBuf> = Vec::new();
  for dir in base_dir.ancestors() {
    for module_dir in &options.module_dirs {
      let root = dir.join(module_dir);
      if !roots.contains(&root) {
        roots.push(root);
      }
    }
  }
  roots
}

/// Search the module directories for a package's entry file.
fn search_package(name: &str, base_dir: &Path, options: &ResolveOptions) -> Option<PathBuf> {
  let relative = name_to_path(name.trim_start_matches('/'));
  for root in module_roots(base_dir, options) {
    if !root.is_dir() {
      continue;
    }
    let candidates = [
      root.join(format!("{}.lua", relative.display())),
      root.join(&relative).join("init.lua"),
    ];
    for candidate in candidates {
      trace!(candidate = %candidate.display(), "trying module candidate");
      if candidate.is_file() {
        return Some(candidate);
      }
    }
  }
  None
}

/// Resolve through the `exports` map of the package manifest.
fn search_exports(name: &str, base_dir: &Path, options: &ResolveOptions) -> Option<PathBuf> {
  let relative = name_to_path(name);
  for root in module_roots(base_dir, options) {
    let package_dir = root.join(&relative);
    let manifest_path = package_dir.join(PACKAGE_MANIFEST);
    if !manifest_path.is_file() {
      continue;
    }

    let manifest = match read_manifest(&manifest_path) {
      Ok(manifest) => manifest,
      Err(message) => {
        debug!(path = %manifest_path.display(), error = %message, "ignoring unreadable package manifest");
        continue;
      }
    };

    let Some(exports) = manifest.exports else {
      continue;
    };

    let mut keys: Vec<&String> = exports
      .keys()
      .filter(|k| options.export_key_pattern.is_match(k))
      .collect();
    keys.sort_by_key(|k| k.len());

    for key in keys {
      let Some(target) = exports[key].select(&options.export_conditions) else {
        continue;
      };
      let entry = package_dir.join(target.trim_start_matches("./"));
      trace!(key = %key, entry = %entry.display(), "trying export");
      if entry.is_file() {
        return Some(entry);
      }
    }
  }
  None
}

fn read_manifest(path: &Path) -> Result<PackageManifest, String> {
  let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
  serde_json::from_str(&text).map_err(|e| e.to_string())
}
