//! The `make` global table.
//!
//! Scripts (configs and plugins) can read:
//! - `make.dir` - The project directory
//! - `make.version` - The ts-make version
//! - `make.os` - Operating system name (e.g., "linux", "macos", "windows")
//! - `make.log(msg)` - Log a message through the host's logger

use std::path::Path;

use mlua::prelude::*;
use tracing::info;

/// Register the `make` global table in the Lua runtime.
pub fn register_globals(lua: &Lua, project_dir: &Path) -> LuaResult<()> {
  let make = lua.create_table()?;

  make.set("dir", project_dir.to_string_lossy().to_string())?;
  make.set("version", env!("CARGO_PKG_VERSION"))?;
  make.set("os", std::env::consts::OS)?;

  let log = lua.create_function(|_, message: String| {
    info!(source = "lua", "{}", message);
    Ok(())
  })?;
  make.set("log", log)?;

  lua.globals().set("make", make)?;
  Ok(())
}
