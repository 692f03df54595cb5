//! The resolved build model.
//!
//! A [`MakeSpec`] is an arena: plugins, actions and targets live in vectors
//! and refer to each other by index. Once built it is never mutated, and it
//! upholds these invariants:
//! - target names are unique
//! - every dependency edge and action reference resolves
//! - the dependency graph is acyclic

mod builder;

pub use builder::{ModelBuilderContext, ModelError, build_model};

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::consts::DEFAULT_TARGET_NAME;
use crate::plugin::{Action, Plugin, PluginDescriptor, PluginId};

/// Index of a target in [`MakeSpec::targets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

/// Index of an action in [`MakeSpec::actions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

pub struct PluginRecord {
  pub descriptor: PluginDescriptor,
  pub instance: Rc<dyn Plugin>,
  pub actions: Vec<ActionId>,
}

impl fmt::Debug for PluginRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PluginRecord")
      .field("descriptor", &self.descriptor)
      .field("actions", &self.actions)
      .finish_non_exhaustive()
  }
}

pub struct ActionRecord {
  /// Name the plugin registered.
  pub name: String,
  /// Qualified name targets refer to.
  pub full_name: String,
  pub plugin: PluginId,
  pub implementation: Rc<dyn Action>,
}

impl fmt::Debug for ActionRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionRecord")
      .field("full_name", &self.full_name)
      .field("plugin", &self.plugin)
      .finish_non_exhaustive()
  }
}

/// A named build node. Without an action it only groups its dependencies.
#[derive(Debug, Clone)]
pub struct Target {
  pub id: TargetId,
  pub name: String,
  pub deps: Vec<TargetId>,
  pub action: Option<ActionId>,
  pub args: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MakeSpec {
  plugins: Vec<PluginRecord>,
  actions: Vec<ActionRecord>,
  action_index: HashMap<String, ActionId>,
  targets: Vec<Target>,
  target_index: HashMap<String, TargetId>,
  default_target: Option<TargetId>,
}

impl MakeSpec {
  pub fn plugins(&self) -> &[PluginRecord] {
    &self.plugins
  }

  pub fn plugin(&self, id: PluginId) -> &PluginRecord {
    &self.plugins[id.0]
  }

  pub fn actions(&self) -> &[ActionRecord] {
    &self.actions
  }

  pub fn action(&self, id: ActionId) -> &ActionRecord {
    &self.actions[id.0]
  }

  pub fn action_by_name(&self, full_name: &str) -> Option<&ActionRecord> {
    self.action_index.get(full_name).map(|id| self.action(*id))
  }

  /// Targets in declaration order.
  pub fn targets(&self) -> &[Target] {
    &self.targets
  }

  pub fn target(&self, id: TargetId) -> &Target {
    &self.targets[id.0]
  }

  pub fn target_by_name(&self, name: &str) -> Option<&Target> {
    self.target_index.get(name).map(|id| self.target(*id))
  }

  /// The declared `defaultTarget`, if any.
  pub fn declared_default(&self) -> Option<&Target> {
    self.default_target.map(|id| self.target(id))
  }

  /// Pick the target to build.
  ///
  /// An explicit name must exist. Without one, the declared default is used,
  /// then a target literally named `default`.
  pub fn target_or_default(&self, name: Option<&str>) -> Result<&Target, ModelError> {
    match name {
      Some(name) => self.target_by_name(name).ok_or_else(|| ModelError::TargetNotFound {
        name: name.to_string(),
        available: self.targets.iter().map(|t| t.name.clone()).collect(),
      }),
      None => self
        .declared_default()
        .or_else(|| self.target_by_name(DEFAULT_TARGET_NAME))
        .ok_or(ModelError::NoStartTarget),
    }
  }
}
