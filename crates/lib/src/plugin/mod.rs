//! The plugin and action contracts.
//!
//! A plugin is an async initializer that receives a [`PluginHost`] and
//! registers actions through it. Each host is bound to one plugin, so the
//! names it registers are qualified for that plugin: built-in plugins
//! register bare names, every other plugin's names are prefixed with
//! `"<alias or name>:"`.

pub mod builtin;
pub mod lua;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use async_trait::async_trait;
use mlua::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::export::schema::{ArgsSchema, SchemaError};

/// Identity of a plugin as far as naming is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
  pub name: String,
  pub alias: Option<String>,
  pub built_in: bool,
}

impl PluginDescriptor {
  pub fn built_in(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      alias: None,
      built_in: true,
    }
  }

  pub fn declared(name: impl Into<String>, alias: Option<String>) -> Self {
    Self {
      name: name.into(),
      alias,
      built_in: false,
    }
  }
}

/// Full name of an action registered by a plugin.
pub fn qualify(descriptor: &PluginDescriptor, name: &str) -> String {
  if descriptor.built_in {
    name.to_string()
  } else {
    let prefix = descriptor.alias.as_deref().unwrap_or(&descriptor.name);
    format!("{}:{}", prefix, name)
  }
}

#[derive(Debug, Clone, Error)]
pub enum PluginError {
  #[error("action \"{full_name}\" is already registered")]
  DuplicateAction { full_name: String },

  #[error(transparent)]
  Lua(#[from] LuaError),

  #[error("{0}")]
  Failed(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
  #[error("invalid arguments: {0}")]
  InvalidArgs(#[from] SchemaError),

  #[error(transparent)]
  Lua(#[from] LuaError),

  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command '{cmd}' exited with code {code:?}")]
  CmdFailed { cmd: String, code: Option<i32> },
}

/// A plugin initializer.
#[async_trait(?Send)]
pub trait Plugin {
  async fn init(&self, host: &PluginHost) -> Result<(), PluginError>;
}

/// A unit of build work bound to targets.
#[async_trait(?Send)]
pub trait Action {
  /// Schema target arguments must satisfy, checked when the model is built.
  fn args_schema(&self) -> Option<&dyn ArgsSchema> {
    None
  }

  /// Run the action. `args` is `null` when the target declares none.
  async fn run(&self, args: &Value, ctx: &ActionContext) -> Result<(), ActionError>;
}

/// What an action can see of the build it runs in.
#[derive(Debug, Clone)]
pub struct ActionContext {
  /// Name of the target being built.
  pub target: String,
  /// Whether actions should keep watching for changes instead of returning.
  pub watch: bool,
  /// Project directory.
  pub dir: PathBuf,
}

impl ActionContext {
  pub fn log(&self, message: &str) {
    info!(make_target = %self.target, "{}", message);
  }
}

/// Index of a plugin in the model's plugin list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(pub usize);

/// An action as registered, before it becomes part of a model.
#[derive(Clone)]
pub struct RegisteredAction {
  pub name: String,
  pub full_name: String,
  pub plugin: PluginId,
  pub implementation: Rc<dyn Action>,
}

/// Actions registered so far, in registration order.
#[derive(Default)]
pub struct ActionRegistry {
  actions: Vec<RegisteredAction>,
  index: HashMap<String, usize>,
  conflicts: Vec<String>,
}

impl ActionRegistry {
  /// Take the registered actions and any rejected duplicate names.
  pub fn take(&mut self) -> (Vec<RegisteredAction>, Vec<String>) {
    self.index.clear();
    (std::mem::take(&mut self.actions), std::mem::take(&mut self.conflicts))
  }
}

/// Registration capability handed to one plugin's initializer.
///
/// Duplicate registrations are remembered by the registry even if the plugin
/// swallows the returned error, so they still fail the build.
#[derive(Clone)]
pub struct PluginHost {
  registry: Rc<RefCell<ActionRegistry>>,
  plugin: PluginId,
  descriptor: Rc<PluginDescriptor>,
}

impl PluginHost {
  pub fn new(registry: Rc<RefCell<ActionRegistry>>, plugin: PluginId, descriptor: PluginDescriptor) -> Self {
    Self {
      registry,
      plugin,
      descriptor: Rc::new(descriptor),
    }
  }

  pub fn descriptor(&self) -> &PluginDescriptor {
    &self.descriptor
  }

  /// Register an action under this plugin's qualified name.
  pub fn register_action(&self, name: &str, action: Rc<dyn Action>) -> Result<(), PluginError> {
    let full_name = qualify(&self.descriptor, name);
    let mut registry = self.registry.borrow_mut();

    if registry.index.contains_key(&full_name) {
      registry.conflicts.push(full_name.clone());
      return Err(PluginError::DuplicateAction { full_name });
    }

    debug!(plugin = %self.descriptor.name, action = %full_name, "registered action");
    let position = registry.actions.len();
    registry.index.insert(full_name.clone(), position);
    registry.actions.push(RegisteredAction {
      name: name.to_string(),
      full_name,
      plugin: self.plugin,
      implementation: action,
    });
    Ok(())
  }
}
