//! Plans over models loaded from disk.

use serde_json::json;
use tsmake_lib::plan::{BuildStep, create_build_plan};

use super::common::Project;

fn names<'a>(targets: impl IntoIterator<Item = &'a tsmake_lib::model::Target>) -> Vec<&'a str> {
  targets.into_iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn diamond_builds_the_shared_dependency_once() {
  let project = Project::new();
  project.write_json_config(&json!({
    "targets": [
      { "name": "base" },
      { "name": "left", "deps": "base" },
      { "name": "right", "deps": "base" },
      { "name": "top", "deps": ["left", "right"] },
    ],
  }));
  let spec = project.spec().await.unwrap();

  let plan = create_build_plan(&spec, Some("top")).unwrap();

  assert_eq!(names(plan.build_order()), vec!["base", "left", "right", "top"]);
  let skipped: Vec<_> = plan
    .steps()
    .filter_map(|step| match step {
      BuildStep::SkipCompletedDependency { target, dep } => Some((target.name.as_str(), dep.name.as_str())),
      _ => None,
    })
    .collect();
  assert_eq!(skipped, vec![("right", "base")]);
}

#[tokio::test]
async fn dependency_reached_through_another_is_skipped() {
  let project = Project::new();
  project.write_json_config(&json!({
    "targets": [
      { "name": "a" },
      { "name": "b" },
      { "name": "c", "deps": ["a"] },
      { "name": "d", "deps": ["c", "a", "b"] },
    ],
    "defaultTarget": "d",
  }));
  let spec = project.spec().await.unwrap();

  let plan = create_build_plan(&spec, None).unwrap();
  let steps: Vec<String> = plan.steps().map(|s| s.to_string()).collect();

  assert_eq!(
    steps,
    vec![
      "d - begin",
      "d -   build 3 dependencies",
      "d -     build dependency \"c\"",
      "c - begin",
      "c -   build 1 dependencies",
      "c -     build dependency \"a\"",
      "a - begin",
      "a -   build 0 dependencies",
      "a -   end 0 dependencies",
      "a -   building",
      "a - end",
      "c -   end 1 dependencies",
      "c -   building",
      "c - end",
      "d -     skipping dependency \"a\" built previously",
      "d -     build dependency \"b\"",
      "b - begin",
      "b -   build 0 dependencies",
      "b -   end 0 dependencies",
      "b -   building",
      "b - end",
      "d -   end 3 dependencies",
      "d -   building",
      "d - end",
    ]
  );
}

#[tokio::test]
async fn every_reachable_target_is_built_exactly_once() {
  let project = Project::new();
  let targets: Vec<_> = (0..8)
    .map(|i| {
      let deps: Vec<String> = (0..i).map(|j| format!("t{}", j)).collect();
      json!({ "name": format!("t{}", i), "deps": deps })
    })
    .chain([json!({ "name": "orphan" })])
    .collect();
  project.write_json_config(&json!({ "targets": targets }));
  let spec = project.spec().await.unwrap();

  let plan = create_build_plan(&spec, Some("t7")).unwrap();
  let order = names(plan.build_order());

  assert_eq!(order, vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
  for target in &order {
    let begins = plan
      .steps()
      .filter(|s| matches!(s, BuildStep::BeginTarget { target: t } if t.name == *target))
      .count();
    assert_eq!(begins, 1, "{} began more than once", target);
  }
}

#[tokio::test]
async fn plan_roots_at_the_named_target() {
  let project = Project::new();
  project.write_json_config(&json!({
    "targets": [{ "name": "default", "deps": "x" }, { "name": "x" }],
  }));
  let spec = project.spec().await.unwrap();

  assert_eq!(create_build_plan(&spec, None).unwrap().root.target.name, "default");
  assert_eq!(create_build_plan(&spec, Some("x")).unwrap().root.target.name, "x");
  let err = create_build_plan(&spec, Some("y")).unwrap_err();
  assert_eq!(err.to_string(), "target \"y\" not found (available: default, x)");
}
