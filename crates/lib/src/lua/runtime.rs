use std::path::Path;

use mlua::prelude::*;
use tracing::debug;

use crate::consts::MODULES_DIR;
use crate::lua::{globals, loaders};

/// Search templates appended to `package.path`, relative to the project directory.
const PROJECT_PATH_TEMPLATES: &[&str] = &[
  "lua/?.lua",
  "lua/?/init.lua",
  "share/lua/5.4/?.lua",
  "share/lua/5.4/?/init.lua",
  "?.lua",
  "?/init.lua",
];

/// Create the Lua VM used for one run.
///
/// `package.path` is extended with the project's `lua/` directory and its
/// installed packages so that plugins and compiled configs can `require`
/// their dependencies. The `__dir` loaders and the `make` global are installed.
pub fn create_runtime(project_dir: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();

  let package: LuaTable = lua.globals().get("package")?;
  let current: String = package.get("path")?;
  let project_paths = project_package_path(project_dir);
  package.set("path", format!("{};{}", project_paths, current))?;
  debug!(package_path = %project_paths, "set package.path");

  loaders::install_loaders(&lua)?;
  globals::register_globals(&lua, project_dir)?;

  Ok(lua)
}

/// Build the `package.path` prefix for a project directory.
fn project_package_path(project_dir: &Path) -> String {
  let root = project_dir.to_string_lossy().replace('\\', "/");
  PROJECT_PATH_TEMPLATES
    .iter()
    .map(|template| {
      if template.starts_with("lua/") {
        format!("{}/{}", root, template)
      } else {
        format!("{}/{}/{}", root, MODULES_DIR, template)
      }
    })
    .collect::<Vec<_>>()
    .join(";")
}
