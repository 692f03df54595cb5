//! Locating and validating configurations.

use serde_json::json;
use tsmake_lib::config::ConfigError;
use tsmake_lib::export::{ExportError, ExportKind};
use tsmake_lib::make::{MakeError, Session};
use tsmake_lib::settings::Settings;

use super::common::Project;

#[tokio::test]
async fn lua_config_wins_over_json() {
  let project = Project::new();
  project.write("ts-make.lua", r#"return { targets = { { name = "from-lua" } } }"#);
  project.write_json_config(&json!({ "targets": [{ "name": "from-json" }] }));

  let session = project.session().await.unwrap();

  assert_eq!(session.config.file.kind, ExportKind::Script);
  assert_eq!(session.config.config.targets[0].name, "from-lua");
  assert_eq!(session.config.base_dir, project.root());
}

#[tokio::test]
async fn default_export_field_is_unwrapped() {
  let project = Project::new();
  project.write(
    "ts-make.lua",
    r#"return { default = { targets = { { name = "a", deps = {} }, { name = "b", deps = "a" } } } }"#,
  );

  let session = project.session().await.unwrap();
  let targets = &session.config.config.targets;

  assert_eq!(targets.len(), 2);
  assert!(targets[0].deps.is_empty());
  assert_eq!(targets[1].deps, vec!["a"]);
}

#[tokio::test]
async fn explicit_config_path_is_used_as_is() {
  let project = Project::new();
  project.write_json_config(&json!({ "targets": [{ "name": "root" }] }));
  project.write("configs/alt.json", r#"{ "targets": [{ "name": "alt" }] }"#);

  let session = Session::open(Some("configs/alt.json".as_ref()), project.root(), &Settings::default())
    .await
    .unwrap();

  assert_eq!(session.config.config.targets[0].name, "alt");
  assert_eq!(session.config.base_dir, project.root().join("configs"));
  assert_eq!(session.project_dir, project.root());
}

#[tokio::test]
async fn schema_errors_list_every_problem() {
  let project = Project::new();
  project.write_json_config(&json!({
    "targets": [
      { "name": "ok" },
      { "deps": [1], "colour": "red" },
    ],
    "extra": true,
  }));

  let err = project.session().await.err().unwrap();

  assert!(matches!(err, MakeError::Config(ConfigError::Export(ExportError::Schema { .. }))));
  let message = err.to_string();
  for expected in ["extra: unknown key", "targets[1].name: required", "targets[1].deps[0]", "targets[1].colour: unknown key"] {
    assert!(message.contains(expected), "missing {:?} in:\n{}", expected, message);
  }
}

#[tokio::test]
async fn malformed_json_is_reported_with_its_path() {
  let project = Project::new();
  let path = project.write("ts-make.json", "{ \"targets\": [ ");

  let err = project.session().await.err().unwrap();

  assert!(matches!(err, MakeError::Config(ConfigError::Export(ExportError::Json { .. }))));
  assert!(err.to_string().contains(&path.display().to_string()));
}

#[tokio::test]
async fn missing_explicit_config_fails_to_load() {
  let project = Project::new();

  let err = Session::open(Some("nope.json".as_ref()), project.root(), &Settings::default())
    .await
    .err()
    .unwrap();

  assert!(matches!(err, MakeError::Config(ConfigError::Export(ExportError::Io { .. }))));
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
  let project = Project::new();

  let err = Session::open(Some("ts-make.yaml".as_ref()), project.root(), &Settings::default())
    .await
    .err()
    .unwrap();

  assert!(matches!(err, MakeError::Config(ConfigError::Export(ExportError::Unsupported { .. }))));
}
