//! Building models from projects with Lua plugins.

use serde_json::json;
use tsmake_lib::make::{MakeError, Session};
use tsmake_lib::model::ModelError;
use tsmake_lib::settings::Settings;

use super::common::{Project, install_recorder};

fn action_names(spec: &tsmake_lib::model::MakeSpec) -> Vec<&str> {
  spec.actions().iter().map(|a| a.full_name.as_str()).collect()
}

#[tokio::test]
async fn plugin_actions_are_prefixed_with_the_plugin_name() {
  let project = Project::new();
  install_recorder(&project);
  project.write_json_config(&json!({ "plugins": ["recorder"], "targets": [] }));

  let spec = project.spec().await.unwrap();

  assert_eq!(action_names(&spec), vec!["print", "exec", "recorder:record"]);
  let record = spec.action_by_name("recorder:record").unwrap();
  assert_eq!(record.name, "record");
  assert_eq!(spec.plugin(record.plugin).descriptor.name, "recorder");
}

#[tokio::test]
async fn alias_replaces_the_prefix() {
  let project = Project::new();
  install_recorder(&project);
  project.write_json_config(&json!({
    "plugins": [{ "name": "recorder", "alias": "rec" }],
    "targets": [{ "name": "t", "action": "rec:record" }],
  }));

  let spec = project.spec().await.unwrap();

  assert!(spec.action_by_name("rec:record").is_some());
  assert!(spec.action_by_name("recorder:record").is_none());
  let target = spec.target_by_name("t").unwrap();
  assert_eq!(spec.action(target.action.unwrap()).full_name, "rec:record");
}

#[tokio::test]
async fn one_module_can_back_several_aliases() {
  let project = Project::new();
  install_recorder(&project);
  project.write_json_config(&json!({
    "plugins": [
      { "name": "recorder", "alias": "first" },
      { "name": "recorder", "alias": "second" },
    ],
  }));

  let spec = project.spec().await.unwrap();

  assert!(spec.action_by_name("first:record").is_some());
  assert!(spec.action_by_name("second:record").is_some());
}

#[tokio::test]
async fn plugins_resolve_through_path_and_exports() {
  let project = Project::new();
  project.write(
    "plugins/local.lua",
    r#"
      return {
        create_plugin = function()
          return function(host) host:register_action("hello", function() end) end
        end,
      }
    "#,
  );
  project.write(
    "lua_modules/fancy/package.json",
    r#"{ "exports": { ".": "./main.lua", "./ts-make-loader": { "lua": "./build/entry.lua" } } }"#,
  );
  project.write(
    "lua_modules/fancy/build/entry.lua",
    r#"return { default = function(host) host.register_action("shine", function() end) end }"#,
  );
  project.write_json_config(&json!({ "plugins": ["./plugins/local.lua", "fancy"] }));

  let spec = project.spec().await.unwrap();

  assert!(spec.action_by_name("./plugins/local.lua:hello").is_some());
  assert!(spec.action_by_name("fancy:shine").is_some());
}

#[tokio::test]
async fn nested_config_finds_plugins_installed_at_the_project_root() {
  let project = Project::new();
  install_recorder(&project);
  let config = project.write(
    "ci/ts-make.json",
    &json!({
      "plugins": ["recorder"],
      "targets": [{ "name": "nightly", "action": "recorder:record" }],
    })
    .to_string(),
  );

  let session = Session::open(Some(&config), project.root(), &Settings::default())
    .await
    .unwrap();
  let spec = session.build_model().await.unwrap();

  assert!(spec.action_by_name("recorder:record").is_some());
  let target = spec.target_by_name("nightly").unwrap();
  assert_eq!(spec.action(target.action.unwrap()).full_name, "recorder:record");
}

#[tokio::test]
async fn duplicate_registration_is_reported() {
  let project = Project::new();
  project.write(
    "lua_modules/twice.lua",
    r#"
      return function(host)
        host.register_action("go", function() end)
        pcall(host.register_action, "go", function() end)
      end
    "#,
  );
  project.write_json_config(&json!({ "plugins": ["twice"] }));

  let err = project.spec().await.unwrap_err();

  assert!(
    matches!(err, MakeError::Model(ModelError::DuplicateAction { ref full_name }) if full_name == "twice:go"),
    "unexpected error: {}",
    err
  );
}

#[tokio::test]
async fn lua_schemas_validate_target_args() {
  let project = Project::new();
  install_recorder(&project);
  project.write_json_config(&json!({
    "plugins": ["recorder"],
    "targets": [{ "name": "bad", "action": "recorder:record", "args": 42 }],
  }));

  let err = project.spec().await.unwrap_err();

  assert!(matches!(err, MakeError::Model(ModelError::InvalidArgs { .. })));
  let message = err.to_string();
  assert!(message.contains("target \"bad\""), "{}", message);
  assert!(message.contains("expected a string"), "{}", message);
}

#[tokio::test]
async fn unresolvable_plugin_names_the_specifier() {
  let project = Project::new();
  project.write_json_config(&json!({ "plugins": ["does-not-exist"] }));

  let err = project.spec().await.unwrap_err();

  assert!(matches!(err, MakeError::Model(ModelError::PluginLoad(_))));
  assert!(err.to_string().contains("cannot resolve \"does-not-exist\""), "{}", err);
}

#[tokio::test]
async fn failing_plugin_init_is_reported_with_its_name() {
  let project = Project::new();
  project.write("lua_modules/grumpy.lua", r#"return function() error("not today") end"#);
  project.write_json_config(&json!({ "plugins": ["grumpy"] }));

  let err = project.spec().await.unwrap_err();

  assert!(matches!(err, MakeError::Model(ModelError::PluginInit { ref plugin, .. }) if plugin == "grumpy"));
  assert!(err.to_string().contains("not today"), "{}", err);
}

#[tokio::test]
async fn cycles_are_rejected() {
  let project = Project::new();
  project.write_json_config(&json!({
    "targets": [
      { "name": "a", "deps": ["b"] },
      { "name": "b", "deps": ["c"] },
      { "name": "c", "deps": ["a"] },
    ],
  }));

  let err = project.spec().await.unwrap_err();

  assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c -> a");
}
