//! Export files: a value exported by a Lua script, a Teal script or a JSON document.
//!
//! Loading an export file goes through three stages:
//! 1. Materialize: Teal sources are compiled to Lua first
//! 2. Evaluate: JSON is parsed; scripts are executed and their export unwrapped
//! 3. Validate: the resulting JSON value is checked against a [`Schema`]

pub mod compile;
pub mod schema;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::module::{LoadError, LuaImporter, ModuleLoader, ResolveOptions, ToInstance};
use compile::{CompileError, ScriptCompiler, artifact_path};
use schema::{Schema, SchemaError};

/// How an export file is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
  /// Lua script, executed directly.
  Script,
  /// Teal script, compiled to Lua before it is executed.
  TypedScript,
  /// JSON document.
  Data,
}

impl ExportKind {
  /// Recognized extensions in lookup priority order.
  pub const EXTENSIONS: &'static [(&'static str, ExportKind)] = &[
    ("lua", ExportKind::Script),
    ("tl", ExportKind::TypedScript),
    ("json", ExportKind::Data),
  ];

  fn from_extension(ext: &str) -> Option<Self> {
    Self::EXTENSIONS.iter().find(|(e, _)| *e == ext).map(|(_, kind)| *kind)
  }
}

/// A file that exports a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
  pub kind: ExportKind,
  pub path: PathBuf,
}

impl ExportFile {
  /// Classify a path by its extension.
  pub fn classify(path: impl Into<PathBuf>) -> Result<Self, ExportError> {
    let path = path.into();
    let kind = path
      .extension()
      .and_then(|e| e.to_str())
      .and_then(ExportKind::from_extension)
      .ok_or_else(|| ExportError::Unsupported { path: path.clone() })?;
    Ok(Self { kind, path })
  }
}

/// Find the first existing `<basename>.<ext>`, trying extensions in priority order.
pub fn find_export_file(basename: &Path) -> Option<ExportFile> {
  ExportKind::EXTENSIONS.iter().find_map(|(ext, kind)| {
    let path = PathBuf::from(format!("{}.{}", basename.display(), ext));
    path.is_file().then_some(ExportFile { kind: *kind, path })
  })
}

/// Comma-separated list of recognized extensions, for error messages.
pub fn extension_list() -> String {
  ExportKind::EXTENSIONS
    .iter()
    .map(|(e, _)| format!(".{}", e))
    .collect::<Vec<_>>()
    .join(", ")
}

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("unsupported export file {}: expected one of {}", .path.display(), extension_list())]
  Unsupported { path: PathBuf },

  #[error("failed to read {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON in {}: {source}", .path.display())]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to load {}: {source}", .path.display())]
  Load {
    path: PathBuf,
    #[source]
    source: LoadError,
  },

  #[error("failed to evaluate the export of {}: {source}", .path.display())]
  Evaluate {
    path: PathBuf,
    #[source]
    source: LuaError,
  },

  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error("invalid value exported by {}:\n{source}", .path.display())]
  Schema {
    path: PathBuf,
    #[source]
    source: SchemaError,
  },
}

/// Loads and validates export files for one project.
pub struct ExportLoader {
  lua: Lua,
  project_dir: PathBuf,
  compiler: Rc<dyn ScriptCompiler>,
  modules: ModuleLoader<LuaValue>,
}

impl ExportLoader {
  pub fn new(lua: Lua, project_dir: &Path, compiler: Rc<dyn ScriptCompiler>) -> Self {
    let modules = ModuleLoader::new(Rc::new(LuaImporter::new(lua.clone())), ResolveOptions::default());
    Self {
      lua,
      project_dir: project_dir.to_path_buf(),
      compiler,
      modules,
    }
  }

  /// Load an export file and validate its value.
  pub async fn validate_export<S: Schema>(&self, file: &ExportFile, schema: &S) -> Result<S::Output, ExportError> {
    let value = self.load_value(file).await?;
    schema.validate(&value).map_err(|source| ExportError::Schema {
      path: file.path.clone(),
      source,
    })
  }

  /// Load an export file's value without validating it.
  pub async fn load_value(&self, file: &ExportFile) -> Result<Value, ExportError> {
    match file.kind {
      ExportKind::Data => {
        let text = tokio::fs::read_to_string(&file.path).await.map_err(|source| ExportError::Io {
          path: file.path.clone(),
          source,
        })?;
        serde_json::from_str(&text).map_err(|source| ExportError::Json {
          path: file.path.clone(),
          source,
        })
      }
      ExportKind::TypedScript => {
        let compiled = artifact_path(&self.project_dir, &file.path);
        self.compiler.compile(&file.path, &compiled).await?;
        self.evaluate_script(&compiled, &file.path).await
      }
      ExportKind::Script => self.evaluate_script(&file.path, &file.path).await,
    }
  }

  /// Execute a script and turn its export into JSON.
  ///
  /// `origin` is the file the user wrote, used in errors when `script` is a
  /// compiled artifact.
  async fn evaluate_script(&self, script: &Path, origin: &Path) -> Result<Value, ExportError> {
    let specifier = format!("file://{}", script.display());
    let identity: Rc<ToInstance<LuaValue>> = Rc::new(|value: LuaValue, _: &str, _: &Path| Ok(value));
    let exported = self
      .modules
      .load(&specifier, &self.project_dir, identity)
      .await
      .map_err(|source| ExportError::Load {
        path: origin.to_path_buf(),
        source,
      })?;

    let evaluate = |source| ExportError::Evaluate {
      path: origin.to_path_buf(),
      source,
    };

    let default = match &exported {
      LuaValue::Table(table) => table.get::<LuaValue>("default").map_err(evaluate)?,
      _ => LuaValue::Nil,
    };
    let mut value = if default.is_nil() { exported } else { default };

    if let LuaValue::Function(deferred) = &value {
      debug!(path = %origin.display(), "calling deferred export");
      value = deferred.call_async::<LuaValue>(()).await.map_err(evaluate)?;
    }

    self.lua.from_value(value).map_err(evaluate)
  }
}
