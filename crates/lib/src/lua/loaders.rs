//! Module loading with per-file `__dir` injection.
//!
//! Every Lua file executed through this module sees a `__dir` variable holding
//! its own directory, so plugins can locate files shipped next to them
//! regardless of where the project lives.
//!
//! `require` keeps its normal semantics (search order, `package.loaded`
//! caching); only `package.searchers[2]` is swapped for a searcher that loads
//! through [`load_file_with_dir`]. `dofile` resolves relative paths against
//! the calling file's `__dir`.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Registry key holding the `__dir` of the file currently executing.
const CURRENT_DIR_KEY: &str = "__tsmake_current_dir";

/// Read a file and prepare it as a chunk whose environment carries `__dir`.
fn prepare_chunk(lua: &Lua, path: &Path) -> LuaResult<(LuaFunction, String)> {
  let canonical = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;
  let source = fs::read_to_string(&canonical)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical.display(), e)))?;

  let dir = canonical
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let env = lua.create_table()?;
  env.set("__dir", dir.as_str())?;
  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;

  let chunk = lua
    .load(&source)
    .set_name(format!("@{}", canonical.display()))
    .set_environment(env)
    .into_function()?;

  Ok((chunk, dir))
}

/// Execute a Lua file and return its value, with `__dir` set for the file.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let (chunk, dir) = prepare_chunk(lua, path)?;

  let prev_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir)?;

  let result = chunk.call::<LuaValue>(());

  // Restore even on failure; a cleanup error must not mask the chunk's error.
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, prev_dir);

  result
}

/// Resolve a `dofile` argument against the calling file's `__dir`.
fn resolve_relative(lua: &Lua, path_str: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path_str);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }

  let current: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  if let Some(dir) = current {
    let candidate = Path::new(&dir).join(path);
    if candidate.exists() {
      return Ok(candidate);
    }
  }

  Ok(path.to_path_buf())
}

/// Searcher for `package.searchers[2]` that loads files via [`load_file_with_dir`].
fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let package: LuaTable = lua.globals().get("package")?;
    let search_path: String = package.get("path")?;
    let searchpath: LuaFunction = package.get("searchpath")?;

    let found: LuaMultiValue = searchpath.call((modname.as_str(), search_path))?;
    match found.into_iter().next() {
      Some(LuaValue::String(file)) => {
        let file = file.to_str()?.to_string();
        let target = file.clone();
        let loader = lua.create_function(move |lua, _: LuaMultiValue| load_file_with_dir(lua, Path::new(&target)))?;
        Ok((LuaValue::Function(loader), file))
      }
      _ => Ok((LuaValue::Nil, format!("\n\tno file for module '{}'", modname))),
    }
  })
}

/// Install the `__dir`-aware searcher and `dofile` into the VM.
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;

  let dofile = lua.create_function(|lua, path: Option<String>| match path {
    Some(path) => {
      let resolved = resolve_relative(lua, &path)?;
      load_file_with_dir(lua, &resolved)
    }
    None => Err(LuaError::external("dofile() without a path is not supported")),
  })?;
  lua.globals().set("dofile", dofile)?;

  Ok(())
}
