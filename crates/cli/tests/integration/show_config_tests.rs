use predicates::prelude::*;
use serde_json::{Value, json};

use super::common::TestEnv;

#[test]
fn prints_the_normalized_config() {
  let env = TestEnv::empty();
  env.write_file(
    "ts-make.lua",
    r#"return { targets = { { name = "a" }, { name = "b", deps = "a" } }, defaultTarget = "b" }"#,
  );

  let output = env.cmd().arg("show-config").output().unwrap();

  assert!(output.status.success());
  let config: Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(config["defaultTarget"], "b");
  assert_eq!(config["targets"][1]["deps"], json!(["a"]));
  assert_eq!(config["plugins"], json!([]));
}

#[test]
fn check_validates_the_graph() {
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "a", "deps": "b" }, { "name": "b", "deps": "a" }],
  }));

  env.cmd().arg("show-config").assert().success();
  env
    .cmd()
    .args(["show-config", "--check"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("\"deps\""))
    .stderr(predicate::str::contains("dependency cycle detected: a -> b -> a"));
}

#[test]
fn check_reports_counts_for_a_valid_config() {
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "default", "action": "print", "args": "hi" }],
  }));

  env
    .cmd()
    .args(["show-config", "--check"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"targets\""))
    .stdout(predicate::str::contains("\"args\": \"hi\""))
    .stdout(predicate::str::contains("1 target(s), 1 plugin(s), 2 action(s)"));
}

#[test]
fn schema_errors_are_listed() {
  let env = TestEnv::with_config(&json!({ "targets": [{ "nmae": "typo" }] }));

  env
    .cmd()
    .arg("show-config")
    .assert()
    .failure()
    .stderr(predicate::str::contains("targets[0].name: required"))
    .stderr(predicate::str::contains("targets[0].nmae: unknown key"));
}
