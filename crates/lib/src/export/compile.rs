//! Compilation of typed script configs.
//!
//! Teal sources are compiled to plain Lua by an external compiler before they
//! are loaded. Artifacts live under the project's `lua_modules` directory so
//! that `require` inside them still sees the project's installed packages.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::{COMPILE_TMP_DIR, MODULES_DIR};
use crate::util::hash::short_path_hash;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error("failed to start compiler '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("compiling {} failed with exit code {code:?}: {stderr}", .source_path.display())]
  Failed {
    source_path: PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to prepare {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Turns a typed script into a plain Lua file.
#[async_trait(?Send)]
pub trait ScriptCompiler {
  async fn compile(&self, source: &Path, output: &Path) -> Result<(), CompileError>;
}

/// Runs `<program> gen <source> -o <output>`.
#[derive(Debug, Clone)]
pub struct TealCompiler {
  program: String,
}

impl TealCompiler {
  pub const DEFAULT_PROGRAM: &'static str = "tl";

  pub fn new(program: impl Into<String>) -> Self {
    Self { program: program.into() }
  }

  pub fn program(&self) -> &str {
    &self.program
  }
}

impl Default for TealCompiler {
  fn default() -> Self {
    Self::new(Self::DEFAULT_PROGRAM)
  }
}

#[async_trait(?Send)]
impl ScriptCompiler for TealCompiler {
  async fn compile(&self, source: &Path, output: &Path) -> Result<(), CompileError> {
    if let Some(parent) = output.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(|source| CompileError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    info!(source = %source.display(), "compiling script config");
    let result = Command::new(&self.program)
      .arg("gen")
      .arg(source)
      .arg("-o")
      .arg(output)
      .output()
      .await
      .map_err(|source| CompileError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if !result.status.success() {
      return Err(CompileError::Failed {
        source_path: source.to_path_buf(),
        code: result.status.code(),
        stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
      });
    }

    debug!(output = %output.display(), "compiled script config");
    Ok(())
  }
}

/// Location of the compiled artifact for a typed script.
///
/// `<project>/lua_modules/.ts-make-tmp/<stem>-<hash>.lua`, hashed on the
/// source path so same-named files in different directories do not collide.
pub fn artifact_path(project_dir: &Path, source: &Path) -> PathBuf {
  let stem = source
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "config".to_string());
  project_dir
    .join(MODULES_DIR)
    .join(COMPILE_TMP_DIR)
    .join(format!("{}-{}.lua", stem, short_path_hash(source)))
}
