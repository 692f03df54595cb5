//! Building a [`MakeSpec`] from a [`Config`].
//!
//! # Phases
//!
//! Each phase completes before the next one starts:
//! 1. Collect plugin records (built-ins first, then declared plugins)
//! 2. Load declared plugin modules concurrently
//! 3. Initialize every plugin concurrently, each with its own host
//! 4. Instantiate targets and resolve their actions
//! 5. Resolve dependency edges and the declared default target
//! 6. Reject dependency cycles
//!
//! No action runs during a build; a failure in any phase aborts it.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use futures::future::try_join_all;
use mlua::Lua;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{ActionId, ActionRecord, MakeSpec, PluginRecord, Target, TargetId};
use crate::config::Config;
use crate::consts::BUILTIN_PLUGIN_NAME;
use crate::export::schema::SchemaError;
use crate::module::{Importer, LoadError, LoadManyOptions, LuaImporter, ModuleLoader, ResolveOptions};
use crate::plugin::builtin::BuiltinPlugin;
use crate::plugin::lua::plugin_instance;
use crate::plugin::{ActionRegistry, Plugin, PluginDescriptor, PluginError, PluginHost, PluginId};

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("failed to load plugins: {0}")]
  PluginLoad(#[source] LoadError),

  #[error("plugin \"{plugin}\" failed to initialize: {source}")]
  PluginInit {
    plugin: String,
    #[source]
    source: PluginError,
  },

  #[error("action \"{full_name}\" is registered more than once")]
  DuplicateAction { full_name: String },

  #[error("target \"{name}\" is declared more than once")]
  DuplicateTarget { name: String },

  #[error("target \"{target}\" uses unknown action \"{action}\"")]
  UnknownAction { target: String, action: String },

  #[error("target \"{target}\" depends on unknown target \"{dependency}\"")]
  UnknownDependency { target: String, dependency: String },

  #[error("default target \"{name}\" is not declared")]
  UnknownDefaultTarget { name: String },

  #[error("invalid args for target \"{target}\" (action \"{action}\"):\n{source}")]
  InvalidArgs {
    target: String,
    action: String,
    #[source]
    source: SchemaError,
  },

  #[error("dependency cycle detected: {}", .path.join(" -> "))]
  Cycle { path: Vec<String> },

  #[error("target \"{name}\" not found (available: {})", .available.join(", "))]
  TargetNotFound { name: String, available: Vec<String> },

  #[error("no target to build: name one, declare defaultTarget, or add a target named \"default\"")]
  NoStartTarget,

  /// Builder inconsistency, not a configuration problem.
  #[error("internal error: {0}")]
  Assertion(String),
}

/// Everything a model build needs besides the configuration.
///
/// Owns the plugin loader, so plugin modules are loaded at most once per
/// context.
pub struct ModelBuilderContext {
  base_dir: PathBuf,
  lua: Lua,
  plugins: ModuleLoader<Rc<dyn Plugin>>,
  builtins: Vec<(String, Rc<dyn Plugin>)>,
}

impl ModelBuilderContext {
  /// Create a context with the `@ts-make` built-in plugin registered.
  pub fn new(lua: Lua, base_dir: &Path, options: ResolveOptions) -> Self {
    let importer = Rc::new(LuaImporter::new(lua.clone()));
    Self::with_importer(lua, base_dir, options, importer)
  }

  /// Create a context that imports plugin modules through `importer`.
  pub fn with_importer(lua: Lua, base_dir: &Path, options: ResolveOptions, importer: Rc<dyn Importer>) -> Self {
    let mut ctx = Self {
      base_dir: base_dir.to_path_buf(),
      lua,
      plugins: ModuleLoader::new(importer, options),
      builtins: Vec::new(),
    };
    ctx.register_builtin_plugin(BUILTIN_PLUGIN_NAME, Rc::new(BuiltinPlugin));
    ctx
  }

  /// Register a plugin whose actions are available without a prefix.
  pub fn register_builtin_plugin(&mut self, name: &str, plugin: Rc<dyn Plugin>) {
    self.builtins.push((name.to_string(), plugin));
  }

  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }
}

/// Build and validate the model for a configuration.
pub async fn build_model(config: &Config, ctx: &ModelBuilderContext) -> Result<MakeSpec, ModelError> {
  let plugins = load_plugins(config, ctx).await?;
  let mut spec = MakeSpec {
    plugins,
    ..MakeSpec::default()
  };

  init_plugins(&mut spec).await?;
  instantiate_targets(config, &mut spec)?;
  link_targets(config, &mut spec)?;
  check_cycles(&spec.targets)?;

  info!(
    plugins = spec.plugins.len(),
    actions = spec.actions.len(),
    targets = spec.targets.len(),
    "model built"
  );
  Ok(spec)
}

/// Phases 1 and 2.
async fn load_plugins(config: &Config, ctx: &ModelBuilderContext) -> Result<Vec<PluginRecord>, ModelError> {
  let mut declared: Vec<(PluginDescriptor, Option<Rc<dyn Plugin>>)> = ctx
    .builtins
    .iter()
    .map(|(name, plugin)| (PluginDescriptor::built_in(name.as_str()), Some(Rc::clone(plugin))))
    .collect();
  declared.extend(
    config
      .plugins
      .iter()
      .map(|decl| (PluginDescriptor::declared(decl.name.as_str(), decl.alias.clone()), None)),
  );

  let specifiers: Vec<String> = config.plugins.iter().map(|decl| decl.name.clone()).collect();
  debug!(count = specifiers.len(), base_dir = %ctx.base_dir.display(), "loading plugins");
  let loaded = ctx
    .plugins
    .load_many(
      &specifiers,
      &ctx.base_dir,
      plugin_instance(ctx.lua.clone()),
      LoadManyOptions::default(),
    )
    .await
    .map_err(ModelError::PluginLoad)?;

  declared
    .into_iter()
    .map(|(descriptor, instance)| {
      let instance = match instance {
        Some(instance) => instance,
        None => loaded.get(&descriptor.name).cloned().ok_or_else(|| {
          ModelError::Assertion(format!("plugin \"{}\" has no loaded instance", descriptor.name))
        })?,
      };
      Ok(PluginRecord {
        descriptor,
        instance,
        actions: Vec::new(),
      })
    })
    .collect()
}

/// Phase 3.
async fn init_plugins(spec: &mut MakeSpec) -> Result<(), ModelError> {
  let registry = Rc::new(RefCell::new(ActionRegistry::default()));

  let inits = spec.plugins.iter().enumerate().map(|(position, record)| {
    let host = PluginHost::new(Rc::clone(&registry), PluginId(position), record.descriptor.clone());
    let instance = Rc::clone(&record.instance);
    let plugin = record.descriptor.name.clone();
    async move {
      instance
        .init(&host)
        .await
        .map_err(|source| ModelError::PluginInit { plugin, source })
    }
  });
  let result = try_join_all(inits).await;

  // A duplicate registration wins over whatever error it caused downstream.
  let (registered, conflicts) = registry.borrow_mut().take();
  if let Some(full_name) = conflicts.into_iter().next() {
    return Err(ModelError::DuplicateAction { full_name });
  }
  result?;

  for (position, action) in registered.into_iter().enumerate() {
    let id = ActionId(position);
    spec.plugins[action.plugin.0].actions.push(id);
    spec.action_index.insert(action.full_name.clone(), id);
    spec.actions.push(ActionRecord {
      name: action.name,
      full_name: action.full_name,
      plugin: action.plugin,
      implementation: action.implementation,
    });
  }
  Ok(())
}

/// Phase 4.
fn instantiate_targets(config: &Config, spec: &mut MakeSpec) -> Result<(), ModelError> {
  for decl in &config.targets {
    if spec.target_index.contains_key(&decl.name) {
      return Err(ModelError::DuplicateTarget {
        name: decl.name.clone(),
      });
    }

    let action = match &decl.action {
      None => None,
      Some(full_name) => {
        let id = spec
          .action_index
          .get(full_name)
          .copied()
          .ok_or_else(|| ModelError::UnknownAction {
            target: decl.name.clone(),
            action: full_name.clone(),
          })?;
        check_args(spec.action(id), &decl.name, decl.args.as_ref())?;
        Some(id)
      }
    };

    let id = TargetId(spec.targets.len());
    spec.target_index.insert(decl.name.clone(), id);
    spec.targets.push(Target {
      id,
      name: decl.name.clone(),
      deps: Vec::new(),
      action,
      args: decl.args.clone(),
    });
  }
  Ok(())
}

fn check_args(action: &ActionRecord, target: &str, args: Option<&Value>) -> Result<(), ModelError> {
  let Some(schema) = action.implementation.args_schema() else {
    return Ok(());
  };
  schema
    .check(args.unwrap_or(&Value::Null))
    .map_err(|source| ModelError::InvalidArgs {
      target: target.to_string(),
      action: action.full_name.clone(),
      source,
    })
}

/// Phase 5. Targets were created one per declaration, so positions line up.
fn link_targets(config: &Config, spec: &mut MakeSpec) -> Result<(), ModelError> {
  for (position, decl) in config.targets.iter().enumerate() {
    let deps = decl
      .deps
      .iter()
      .map(|dep| {
        spec
          .target_index
          .get(dep)
          .copied()
          .ok_or_else(|| ModelError::UnknownDependency {
            target: decl.name.clone(),
            dependency: dep.clone(),
          })
      })
      .collect::<Result<Vec<_>, _>>()?;
    spec.targets[position].deps = deps;
  }

  spec.default_target = config
    .default_target
    .as_ref()
    .map(|name| {
      spec
        .target_index
        .get(name)
        .copied()
        .ok_or_else(|| ModelError::UnknownDefaultTarget { name: name.clone() })
    })
    .transpose()?;
  Ok(())
}

/// Phase 6. Depth-first from every target; the path is passed down by value
/// so a target reached through two separate branches is not mistaken for a
/// cycle. Targets whose subtree is known to be acyclic are not walked again.
fn check_cycles(targets: &[Target]) -> Result<(), ModelError> {
  let mut cleared = vec![false; targets.len()];
  for target in targets {
    visit(targets, target.id, &[], &mut cleared)?;
  }
  Ok(())
}

fn visit(targets: &[Target], id: TargetId, path: &[TargetId], cleared: &mut [bool]) -> Result<(), ModelError> {
  if cleared[id.0] {
    return Ok(());
  }

  if path.contains(&id) {
    let names = path
      .iter()
      .chain(std::iter::once(&id))
      .map(|t| targets[t.0].name.clone())
      .collect();
    return Err(ModelError::Cycle { path: names });
  }

  let path = [path, &[id]].concat();
  for dep in &targets[id.0].deps {
    visit(targets, *dep, &path, cleared)?;
  }
  cleared[id.0] = true;
  Ok(())
}
