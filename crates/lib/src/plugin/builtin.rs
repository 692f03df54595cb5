//! The `@ts-make` built-in plugin.
//!
//! Its actions are registered without a prefix:
//! - `print`: log a line, or each line of a list
//! - `exec`: run a program, failing the build on a non-zero exit

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Action, ActionContext, ActionError, Plugin, PluginError, PluginHost};
use crate::export::schema::{ArgsSchema, Schema, TypedSchema};

pub struct BuiltinPlugin;

#[async_trait(?Send)]
impl Plugin for BuiltinPlugin {
  async fn init(&self, host: &PluginHost) -> Result<(), PluginError> {
    host.register_action("print", Rc::new(PrintAction::default()))?;
    host.register_action("exec", Rc::new(ExecAction::default()))?;
    Ok(())
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PrintArgs {
  Line(String),
  Lines(Vec<String>),
}

#[derive(Default)]
pub struct PrintAction {
  schema: TypedSchema<PrintArgs>,
}

#[async_trait(?Send)]
impl Action for PrintAction {
  fn args_schema(&self) -> Option<&dyn ArgsSchema> {
    Some(&self.schema)
  }

  async fn run(&self, args: &Value, ctx: &ActionContext) -> Result<(), ActionError> {
    match self.schema.validate(args)? {
      PrintArgs::Line(line) => ctx.log(&line),
      PrintArgs::Lines(lines) => lines.iter().for_each(|line| ctx.log(line)),
    }
    Ok(())
  }
}

/// Arguments of the `exec` action.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecArgs {
  /// Program to run (looked up on `PATH`).
  pub cmd: String,
  #[serde(default)]
  pub args: Vec<String>,
  /// Working directory, relative to the project directory.
  #[serde(default)]
  pub cwd: Option<PathBuf>,
  /// Extra environment variables layered over the inherited environment.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct ExecAction {
  schema: TypedSchema<ExecArgs>,
}

#[async_trait(?Send)]
impl Action for ExecAction {
  fn args_schema(&self) -> Option<&dyn ArgsSchema> {
    Some(&self.schema)
  }

  /// Runs the program with inherited stdio so its output reaches the user.
  /// The child is killed if the build is dropped (e.g. on Ctrl-C in watch mode).
  async fn run(&self, args: &Value, ctx: &ActionContext) -> Result<(), ActionError> {
    let args = self.schema.validate(args)?;
    let working_dir = match &args.cwd {
      Some(cwd) => ctx.dir.join(cwd),
      None => ctx.dir.clone(),
    };

    info!(make_target = %ctx.target, cmd = %args.cmd, "executing command");
    debug!(args = ?args.args, working_dir = %working_dir.display(), "spawning process");

    let status = Command::new(&args.cmd)
      .args(&args.args)
      .current_dir(&working_dir)
      .envs(&args.env)
      .env("TS_MAKE_TARGET", &ctx.target)
      .env("TS_MAKE_WATCH", if ctx.watch { "1" } else { "0" })
      .kill_on_drop(true)
      .status()
      .await
      .map_err(|source| ActionError::Spawn {
        program: args.cmd.clone(),
        source,
      })?;

    if !status.success() {
      return Err(ActionError::CmdFailed {
        cmd: args.cmd,
        code: status.code(),
      });
    }
    Ok(())
  }
}
