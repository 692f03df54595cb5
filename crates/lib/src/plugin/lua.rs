//! Lua bindings for plugins and actions.
//!
//! A Lua plugin module exports an init function:
//!
//! ```lua
//! return function(host)
//!   host.register_action("greet", {
//!     args_schema = function(args)
//!       if type(args) ~= "string" then return "expected a name" end
//!     end,
//!     run = function(args, ctx)
//!       ctx.log("hello " .. args)
//!     end,
//!   })
//! end
//! ```
//!
//! The init function may also be exported as `default`, as `plugin`, or be
//! produced by a `create_plugin()` factory. An action may be given as a bare
//! function, which is then its `run`.

use std::path::Path;
use std::rc::Rc;

use async_trait::async_trait;
use mlua::prelude::*;
use mlua::SerializeOptions;
use serde_json::Value;
use tracing::trace;

use super::{Action, ActionContext, ActionError, Plugin, PluginError, PluginHost};
use crate::export::schema::{ArgsSchema, Schema, SchemaError, SchemaIssue};
use crate::module::{LoadError, ToInstance};

/// Find the init function in a plugin module's exports.
pub fn normalize_plugin(exports: LuaValue, specifier: &str, location: &Path) -> Result<LuaFunction, LoadError> {
  let import_error = |source| LoadError::Import {
    location: location.to_path_buf(),
    source,
  };

  match exports {
    LuaValue::Function(init) => Ok(init),
    LuaValue::Table(table) => {
      for field in ["default", "plugin"] {
        if let LuaValue::Function(init) = table.get::<LuaValue>(field).map_err(import_error)? {
          trace!(specifier, field, "using exported plugin field");
          return Ok(init);
        }
      }

      if let LuaValue::Function(factory) = table.get::<LuaValue>("create_plugin").map_err(import_error)? {
        if let LuaValue::Function(init) = factory.call::<LuaValue>(()).map_err(import_error)? {
          return Ok(init);
        }
        return Err(LoadError::Instance {
          specifier: specifier.to_string(),
          location: location.to_path_buf(),
          message: "has a create_plugin() that does not return a function".to_string(),
        });
      }

      Err(not_a_plugin(specifier, location))
    }
    _ => Err(not_a_plugin(specifier, location)),
  }
}

fn not_a_plugin(specifier: &str, location: &Path) -> LoadError {
  LoadError::Instance {
    specifier: specifier.to_string(),
    location: location.to_path_buf(),
    message: "does not export a plugin: expected a function, or a table with `default`, `plugin` or `create_plugin`"
      .to_string(),
  }
}

/// Projection used by the model's plugin loader.
pub fn plugin_instance(lua: Lua) -> Rc<ToInstance<Rc<dyn Plugin>>> {
  Rc::new(move |exports: LuaValue, specifier: &str, location: &Path| {
    let init = normalize_plugin(exports, specifier, location)?;
    Ok(Rc::new(LuaPlugin::new(lua.clone(), init)) as Rc<dyn Plugin>)
  })
}

/// Conversion options mapping JSON `null` to Lua `nil`.
fn to_lua_options() -> SerializeOptions {
  SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false)
}

/// Drop a leading `self` so both `t.f(x)` and `t:f(x)` work.
///
/// `owner` is the table the function is bound to; a leading argument that is
/// that table is always `self`, even when no other argument follows.
fn strip_self(args: LuaMultiValue, expected: usize, owner: usize) -> Vec<LuaValue> {
  let mut args: Vec<LuaValue> = args.into_iter().collect();
  let leading_self = match args.first() {
    Some(LuaValue::Table(first)) => args.len() > expected || first.to_pointer() as usize == owner,
    _ => false,
  };
  if leading_self {
    args.remove(0);
  }
  args
}

/// A plugin whose initializer is a Lua function.
pub struct LuaPlugin {
  lua: Lua,
  init: LuaFunction,
}

impl LuaPlugin {
  pub fn new(lua: Lua, init: LuaFunction) -> Self {
    Self { lua, init }
  }
}

#[async_trait(?Send)]
impl Plugin for LuaPlugin {
  async fn init(&self, host: &PluginHost) -> Result<(), PluginError> {
    let host = host_table(&self.lua, host)?;
    self.init.call_async::<()>(host).await?;
    Ok(())
  }
}

fn host_table(lua: &Lua, host: &PluginHost) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("name", host.descriptor().name.as_str())?;

  let owner = table.to_pointer() as usize;
  let bound = host.clone();
  let register = lua.create_function(move |lua, args: LuaMultiValue| {
    let mut args = strip_self(args, 2, owner).into_iter();
    let name = match args.next() {
      Some(LuaValue::String(name)) => name.to_str()?.to_string(),
      _ => return Err(LuaError::runtime("register_action: expected an action name")),
    };
    let action = LuaAction::from_lua_value(lua, args.next().unwrap_or(LuaValue::Nil))?;
    bound
      .register_action(&name, Rc::new(action))
      .map_err(|e| LuaError::runtime(e.to_string()))
  })?;
  table.set("register_action", register)?;

  Ok(table)
}

/// An action implemented in Lua.
pub struct LuaAction {
  lua: Lua,
  run: LuaFunction,
  schema: Option<LuaSchema>,
}

impl LuaAction {
  fn from_lua_value(lua: &Lua, value: LuaValue) -> LuaResult<Self> {
    match value {
      LuaValue::Function(run) => Ok(Self {
        lua: lua.clone(),
        run,
        schema: None,
      }),
      LuaValue::Table(spec) => {
        let run = match spec.get::<LuaValue>("run")? {
          LuaValue::Function(run) => run,
          _ => return Err(LuaError::runtime("register_action: action table needs a `run` function")),
        };
        let schema = match spec.get::<LuaValue>("args_schema")? {
          LuaValue::Nil => None,
          LuaValue::Function(check) => Some(LuaSchema {
            lua: lua.clone(),
            check,
          }),
          _ => return Err(LuaError::runtime("register_action: `args_schema` must be a function")),
        };
        Ok(Self {
          lua: lua.clone(),
          run,
          schema,
        })
      }
      _ => Err(LuaError::runtime("register_action: expected an action table or function")),
    }
  }
}

#[async_trait(?Send)]
impl Action for LuaAction {
  fn args_schema(&self) -> Option<&dyn ArgsSchema> {
    self.schema.as_ref().map(|s| s as &dyn ArgsSchema)
  }

  async fn run(&self, args: &Value, ctx: &ActionContext) -> Result<(), ActionError> {
    let args = self.lua.to_value_with(args, to_lua_options())?;
    let ctx = context_table(&self.lua, ctx)?;
    self.run.call_async::<()>((args, ctx)).await?;
    Ok(())
  }
}

fn context_table(lua: &Lua, ctx: &ActionContext) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("target", ctx.target.as_str())?;
  table.set("watch", ctx.watch)?;
  table.set("dir", ctx.dir.to_string_lossy().to_string())?;

  let owner = table.to_pointer() as usize;
  let bound = ctx.clone();
  let log = lua.create_function(move |_, args: LuaMultiValue| {
    match strip_self(args, 1, owner).into_iter().next() {
      Some(LuaValue::String(message)) => bound.log(&message.to_string_lossy()),
      Some(other) => bound.log(&format!("{:?}", other)),
      None => bound.log(""),
    }
    Ok(())
  })?;
  table.set("log", log)?;

  Ok(table)
}

/// Argument check written in Lua.
///
/// The function receives the arguments and returns `nil` (or `true`) when
/// they are acceptable, otherwise a message, a `{ path = ..., message = ... }`
/// table, or a list of either.
pub struct LuaSchema {
  lua: Lua,
  check: LuaFunction,
}

impl Schema for LuaSchema {
  type Output = ();

  fn validate(&self, value: &Value) -> Result<(), SchemaError> {
    let args = self
      .lua
      .to_value_with(value, to_lua_options())
      .map_err(|e| SchemaError::single("", e.to_string()))?;

    let verdict = self
      .check
      .call::<LuaValue>(args)
      .map_err(|e| SchemaError::single("", e.to_string()))?;

    let issues = match verdict {
      LuaValue::Nil | LuaValue::Boolean(true) => Vec::new(),
      LuaValue::Boolean(false) => vec![SchemaIssue::new("", "rejected by args_schema")],
      LuaValue::String(message) => vec![SchemaIssue::new("", message.to_string_lossy())],
      LuaValue::Table(table) => issues_from_table(table),
      other => vec![SchemaIssue::new(
        "",
        format!("args_schema returned an unexpected {}", other.type_name()),
      )],
    };

    if issues.is_empty() {
      Ok(())
    } else {
      Err(SchemaError { issues })
    }
  }
}

/// A returned table is either one `{ path, message }` issue or a list of issues.
fn issues_from_table(table: LuaTable) -> Vec<SchemaIssue> {
  let single = table.contains_key("message").unwrap_or(false)
    || (table.raw_len() == 0 && table.pairs::<LuaValue, LuaValue>().next().is_some());
  if single {
    return vec![issue_from_lua(LuaValue::Table(table))];
  }

  table
    .sequence_values::<LuaValue>()
    .enumerate()
    .map(|(i, item)| match item {
      Ok(value) => issue_from_lua(value),
      Err(e) => SchemaIssue::new("", format!("args_schema issue #{} is unreadable: {}", i + 1, e)),
    })
    .collect()
}

fn issue_from_lua(value: LuaValue) -> SchemaIssue {
  match value {
    LuaValue::String(message) => SchemaIssue::new("", message.to_string_lossy()),
    LuaValue::Table(issue) => {
      let path = issue.get::<Option<String>>("path").ok().flatten().unwrap_or_default();
      let message = issue
        .get::<Option<String>>("message")
        .ok()
        .flatten()
        .unwrap_or_else(|| "invalid".to_string());
      SchemaIssue::new(path, message)
    }
    other => SchemaIssue::new("", format!("{:?}", other)),
  }
}
