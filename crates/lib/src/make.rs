//! Running builds.
//!
//! [`Session::open`] locates and loads the configuration and prepares the Lua
//! runtime; [`Make`] drives a plan over a built [`MakeSpec`], running each
//! target's action in order and waiting for it before moving on.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, LoadedConfig, find_config, load_config, project_dir_for};
use crate::export::ExportLoader;
use crate::export::compile::TealCompiler;
use crate::lua::runtime::create_runtime;
use crate::model::{ActionId, MakeSpec, ModelBuilderContext, ModelError, build_model};
use crate::plan::{BuildStep, create_build_plan};
use crate::plugin::{ActionContext, ActionError};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum MakeError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("failed to initialize the Lua runtime: {0}")]
  Runtime(#[source] LuaError),

  #[error(transparent)]
  Model(#[from] ModelError),

  #[error("target \"{target}\" failed (action \"{action}\"): {source}")]
  Action {
    target: String,
    action: String,
    #[source]
    source: ActionError,
  },
}

#[derive(Debug, Clone, Default)]
pub struct MakeOptions {
  /// Target to build; the default target when absent.
  pub target: Option<String>,
  /// Passed to actions, which may keep running to watch for changes.
  pub watch: bool,
  /// Plan and report without running any action.
  pub dry_run: bool,
}

/// What a build did.
#[derive(Debug, Clone, Default)]
pub struct MakeReport {
  /// Name of the target the plan was rooted at.
  pub root: String,
  /// Targets built (or, in a dry run, that would be built), in order.
  pub built: Vec<String>,
  /// Every step of the plan, rendered.
  pub steps: Vec<String>,
}

/// A loaded project ready to be turned into a model.
pub struct Session {
  pub config: LoadedConfig,
  pub project_dir: PathBuf,
  context: ModelBuilderContext,
}

impl Session {
  /// Find and load the configuration (an explicit file, or the one in the
  /// project enclosing `cwd`).
  pub async fn open(config_file: Option<&Path>, cwd: &Path, settings: &Settings) -> Result<Self, MakeError> {
    let file = find_config(config_file, cwd)?;
    let project_dir = project_dir_for(&file);
    debug!(config = %file.path.display(), project = %project_dir.display(), "opening project");

    let lua = create_runtime(&project_dir).map_err(MakeError::Runtime)?;
    let compiler = Rc::new(TealCompiler::new(settings.compiler.clone()));
    let exports = ExportLoader::new(lua.clone(), &project_dir, compiler);
    let config = load_config(&file, &exports).await?;

    let context = ModelBuilderContext::new(lua, &config.base_dir, settings.resolve.clone());
    Ok(Self {
      config,
      project_dir,
      context,
    })
  }

  pub fn context(&self) -> &ModelBuilderContext {
    &self.context
  }

  pub async fn build_model(&self) -> Result<MakeSpec, MakeError> {
    Ok(build_model(&self.config.config, &self.context).await?)
  }
}

/// Drives one build over a model.
pub struct Make<'a> {
  spec: &'a MakeSpec,
  project_dir: PathBuf,
  options: MakeOptions,
}

impl<'a> Make<'a> {
  pub fn new(spec: &'a MakeSpec, project_dir: &Path, options: MakeOptions) -> Self {
    Self {
      spec,
      project_dir: project_dir.to_path_buf(),
      options,
    }
  }

  pub async fn build(&self) -> Result<MakeReport, MakeError> {
    let plan = create_build_plan(self.spec, self.options.target.as_deref())?;
    let mut report = MakeReport {
      root: plan.root.target.name.clone(),
      ..MakeReport::default()
    };

    for step in plan.steps() {
      debug!(step = %step, "build step");
      report.steps.push(step.to_string());

      if let BuildStep::BuildTarget { target } = step {
        if !self.options.dry_run {
          self.run_action(&target.name, target.action, target.args.as_ref()).await?;
        }
        report.built.push(target.name.clone());
      }
    }

    info!(root = %report.root, built = report.built.len(), dry_run = self.options.dry_run, "build finished");
    Ok(report)
  }

  async fn run_action(
    &self,
    target: &str,
    action: Option<ActionId>,
    args: Option<&Value>,
  ) -> Result<(), MakeError> {
    let Some(action) = action.map(|id| self.spec.action(id)) else {
      debug!(make_target = %target, "no action bound");
      return Ok(());
    };

    info!(make_target = %target, action = %action.full_name, "building target");
    let ctx = ActionContext {
      target: target.to_string(),
      watch: self.options.watch,
      dir: self.project_dir.clone(),
    };
    action
      .implementation
      .run(args.unwrap_or(&Value::Null), &ctx)
      .await
      .map_err(|source| MakeError::Action {
        target: target.to_string(),
        action: action.full_name.clone(),
        source,
      })
  }
}

/// Load the project, build its model and run one build.
pub async fn make(
  config_file: Option<&Path>,
  cwd: &Path,
  settings: &Settings,
  options: MakeOptions,
) -> Result<MakeReport, MakeError> {
  let session = Session::open(config_file, cwd, settings).await?;
  let spec = session.build_model().await?;
  Make::new(&spec, &session.project_dir, options).build().await
}
