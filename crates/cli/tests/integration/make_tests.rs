use predicates::prelude::*;
use serde_json::{Value, json};

use super::common::{TestEnv, shell};

fn chain() -> Value {
  json!({
    "targets": [
      { "name": "a", "action": "exec", "args": shell("echo a >> order.txt") },
      { "name": "b", "deps": "a", "action": "exec", "args": shell("echo b >> order.txt") },
      { "name": "c", "deps": ["a", "b"], "action": "exec", "args": shell("echo c >> order.txt") },
    ],
    "defaultTarget": "c",
  })
}

fn order(env: &TestEnv) -> Vec<String> {
  env.read_file("order.txt").lines().map(|l| l.trim().to_string()).collect()
}

#[test]
fn builds_the_default_target() {
  let env = TestEnv::with_config(&chain());

  env
    .cmd()
    .arg("make")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built \"c\""))
    .stdout(predicate::str::contains("a, b, c"));

  assert_eq!(order(&env), vec!["a", "b", "c"]);
}

#[test]
fn logs_the_build_request_to_stderr() {
  let env = TestEnv::with_config(&chain());

  env
    .cmd()
    .args(["make", "b", "--dry-run"])
    .assert()
    .success()
    .stderr(predicate::str::contains("starting build"))
    .stderr(predicate::str::contains("dry_run=true"));
}

#[test]
fn builds_a_named_target_only_with_its_dependencies() {
  let env = TestEnv::with_config(&chain());

  env.cmd().args(["make", "b"]).assert().success();

  assert_eq!(order(&env), vec!["a", "b"]);
}

#[test]
fn dry_run_prints_steps_and_runs_nothing() {
  let env = TestEnv::with_config(&chain());

  env
    .cmd()
    .args(["make", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("c -     skipping dependency \"a\" built previously"))
    .stdout(predicate::str::contains("Would build 3 target(s)"));

  assert!(!env.root().join("order.txt").exists());
}

#[test]
fn json_output_reports_the_build() {
  let env = TestEnv::with_config(&chain());

  let output = env
    .cmd()
    .args(["make", "--dry-run", "--output", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let report: Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["root"], "c");
  assert_eq!(report["built"], json!(["a", "b", "c"]));
  assert_eq!(report["dry_run"], true);
}

#[test]
fn print_action_logs_its_message() {
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "default", "action": "print", "args": ["hello from print", "and again"] }],
  }));

  env
    .cmd()
    .arg("make")
    .assert()
    .success()
    .stderr(predicate::str::contains("hello from print"))
    .stderr(predicate::str::contains("and again"));
}

#[test]
fn watch_flag_reaches_actions() {
  let script = if cfg!(windows) {
    "echo %TS_MAKE_WATCH%> watch.txt"
  } else {
    "echo $TS_MAKE_WATCH > watch.txt"
  };
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "default", "action": "exec", "args": shell(script) }],
  }));

  env.cmd().args(["make", "--watch"]).assert().success();

  assert_eq!(env.read_file("watch.txt").trim(), "1");
}

#[test]
fn failing_action_exits_non_zero() {
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "default", "action": "exec", "args": shell("exit 4") }],
  }));

  env
    .cmd()
    .arg("make")
    .assert()
    .failure()
    .stderr(predicate::str::contains("target \"default\" failed"));
}

#[test]
fn unknown_target_lists_available_ones() {
  let env = TestEnv::with_config(&chain());

  env
    .cmd()
    .args(["make", "zzz"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("target \"zzz\" not found (available: a, b, c)"));
}

#[test]
fn missing_dependency_is_reported() {
  let env = TestEnv::with_config(&json!({
    "targets": [{ "name": "x", "deps": ["y"] }],
  }));

  env
    .cmd()
    .args(["make", "x"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("target \"x\" depends on unknown target \"y\""));
}

#[test]
fn explicit_file_is_used() {
  let env = TestEnv::empty();
  env.write_file(
    "build/other.json",
    &json!({ "targets": [{ "name": "default", "action": "print", "args": "from other" }] }).to_string(),
  );

  env
    .cmd()
    .args(["make", "--file", "build/other.json"])
    .assert()
    .success()
    .stderr(predicate::str::contains("from other"));
}
