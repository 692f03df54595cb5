//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

/// Isolated project directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project containing only `ts-make.json`.
  pub fn with_config(config: &Value) -> Self {
    let env = Self::empty();
    env.write_file("ts-make.json", &serde_json::to_string_pretty(config).unwrap());
    env
  }

  /// A project root with no configuration.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".git")).unwrap();
    Self { temp }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path)).unwrap_or_default()
  }

  /// `ts-make` running in the project root with a clean `TS_MAKE_*` environment.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("ts-make");
    cmd
      .current_dir(self.temp.path())
      .env_remove("RUST_LOG")
      .env_remove("TS_MAKE_TL")
      .env_remove("TS_MAKE_MODULE_DIRS")
      .env_remove("TS_MAKE_SUBPATHS")
      .env_remove("TS_MAKE_EXPORT_PATTERN");
    cmd
  }
}

/// `exec` args running a shell snippet.
#[cfg(unix)]
pub fn shell(script: &str) -> Value {
  serde_json::json!({ "cmd": "/bin/sh", "args": ["-c", script] })
}

#[cfg(windows)]
pub fn shell(script: &str) -> Value {
  serde_json::json!({ "cmd": "cmd.exe", "args": ["/C", script] })
}
