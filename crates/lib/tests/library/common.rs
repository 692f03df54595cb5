use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tsmake_lib::make::{MakeError, MakeOptions, MakeReport, Session, make};
use tsmake_lib::model::MakeSpec;
use tsmake_lib::settings::Settings;

/// A project on disk. A `.git` directory marks its root so the search never
/// escapes into the temp directory's parents.
pub struct Project {
  _temp: TempDir,
  root: PathBuf,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    fs::create_dir(root.join(".git")).unwrap();
    Self { _temp: temp, root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    let path = self.root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
  }

  pub fn write_json_config(&self, config: &Value) -> PathBuf {
    self.write("ts-make.json", &serde_json::to_string_pretty(config).unwrap())
  }

  pub fn read(&self, relative: &str) -> String {
    fs::read_to_string(self.root.join(relative)).unwrap_or_default()
  }

  /// Lines of a file, trimmed; empty when the file does not exist.
  pub fn lines(&self, relative: &str) -> Vec<String> {
    self.read(relative).lines().map(|l| l.trim().to_string()).collect()
  }

  pub async fn session(&self) -> Result<Session, MakeError> {
    Session::open(None, &self.root, &Settings::default()).await
  }

  pub async fn spec(&self) -> Result<MakeSpec, MakeError> {
    self.session().await?.build_model().await
  }

  pub async fn make(&self, target: Option<&str>) -> Result<MakeReport, MakeError> {
    let options = MakeOptions {
      target: target.map(str::to_string),
      ..MakeOptions::default()
    };
    make(None, &self.root, &Settings::default(), options).await
  }
}

/// A Lua plugin whose `record` action appends its args (or the target name)
/// to `record.txt` in the project directory.
pub const RECORDING_PLUGIN: &str = r#"
return function(host)
  host.register_action("record", {
    args_schema = function(args)
      if args ~= nil and type(args) ~= "string" then
        return "expected a string"
      end
    end,
    run = function(args, ctx)
      local file = assert(io.open(ctx.dir .. "/record.txt", "a"))
      file:write((args or ctx.target) .. "\n")
      file:close()
    end,
  })
end
"#;

/// Install [`RECORDING_PLUGIN`] as the package `recorder`.
pub fn install_recorder(project: &Project) {
  project.write("lua_modules/recorder/init.lua", RECORDING_PLUGIN);
}
