//! Configuration types and their validator.
//!
//! The validator walks the raw JSON value by hand so that every problem is
//! reported at once, each with its location (`targets[1].deps[0]`). Lua
//! cannot tell an empty array from an empty table, so `{}` is accepted
//! wherever a list is expected.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::export::schema::{Schema, SchemaError, SchemaIssue};

/// A validated project configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
  pub plugins: Vec<PluginDecl>,
  pub targets: Vec<TargetDecl>,
  #[serde(rename = "defaultTarget", skip_serializing_if = "Option::is_none")]
  pub default_target: Option<String>,
}

/// A plugin declaration: a specifier plus an optional action prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDecl {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub alias: Option<String>,
}

/// A target declaration. `deps` is normalized to a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDecl {
  pub name: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub deps: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub args: Option<Value>,
}

/// Validates a raw value as a [`Config`].
pub struct ConfigSchema;

impl Schema for ConfigSchema {
  type Output = Config;

  fn validate(&self, value: &Value) -> Result<Config, SchemaError> {
    let mut issues = Vec::new();
    let config = parse_config(value, &mut issues);
    if issues.is_empty() {
      Ok(config)
    } else {
      Err(SchemaError { issues })
    }
  }
}

const CONFIG_KEYS: &[&str] = &["plugins", "targets", "defaultTarget"];
const PLUGIN_KEYS: &[&str] = &["name", "alias"];
const TARGET_KEYS: &[&str] = &["name", "deps", "action", "args"];

fn parse_config(value: &Value, issues: &mut Vec<SchemaIssue>) -> Config {
  let mut config = Config::default();
  let Some(object) = as_object(value, "", issues) else {
    return config;
  };
  check_keys(object, CONFIG_KEYS, "", issues);

  if let Some(plugins) = object.get("plugins").and_then(|v| as_list(v, "plugins", issues)) {
    config.plugins = plugins
      .iter()
      .enumerate()
      .filter_map(|(i, v)| parse_plugin(v, &format!("plugins[{}]", i), issues))
      .collect();
  }

  if let Some(targets) = object.get("targets").and_then(|v| as_list(v, "targets", issues)) {
    config.targets = targets
      .iter()
      .enumerate()
      .filter_map(|(i, v)| parse_target(v, &format!("targets[{}]", i), issues))
      .collect();
  }

  config.default_target = optional_string(object, "defaultTarget", "", issues);
  config
}

fn parse_plugin(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<PluginDecl> {
  if let Value::String(name) = value {
    return Some(PluginDecl {
      name: name.clone(),
      alias: None,
    });
  }

  let Some(object) = value.as_object() else {
    issues.push(SchemaIssue::new(path, "expected a plugin name or an object with `name`"));
    return None;
  };
  check_keys(object, PLUGIN_KEYS, path, issues);
  let name = required_string(object, "name", path, issues);
  let alias = optional_string(object, "alias", path, issues);
  name.map(|name| PluginDecl { name, alias })
}

fn parse_target(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<TargetDecl> {
  let object = as_object(value, path, issues)?;
  check_keys(object, TARGET_KEYS, path, issues);

  let name = required_string(object, "name", path, issues);
  let action = optional_string(object, "action", path, issues);
  let args = object.get("args").filter(|v| !v.is_null()).cloned();

  let deps_path = join(path, "deps");
  let deps = match object.get("deps") {
    None | Some(Value::Null) => Vec::new(),
    Some(Value::String(dep)) => vec![dep.clone()],
    Some(other) => match as_list(other, &deps_path, issues) {
      Some(items) => items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
          Value::String(dep) => Some(dep.clone()),
          _ => {
            issues.push(SchemaIssue::new(format!("{}[{}]", deps_path, i), "expected a target name"));
            None
          }
        })
        .collect(),
      None => Vec::new(),
    },
  };

  name.map(|name| TargetDecl {
    name,
    deps,
    action,
    args,
  })
}

fn join(path: &str, key: &str) -> String {
  if path.is_empty() {
    key.to_string()
  } else {
    format!("{}.{}", path, key)
  }
}

fn as_object<'a>(value: &'a Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<&'a Map<String, Value>> {
  match value {
    Value::Object(object) => Some(object),
    _ => {
      issues.push(SchemaIssue::new(path, format!("expected an object, found {}", type_name(value))));
      None
    }
  }
}

fn as_list<'a>(value: &'a Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<&'a [Value]> {
  match value {
    Value::Array(items) => Some(items),
    Value::Object(object) if object.is_empty() => Some(&[][..]),
    _ => {
      issues.push(SchemaIssue::new(path, format!("expected an array, found {}", type_name(value))));
      None
    }
  }
}

fn check_keys(object: &Map<String, Value>, allowed: &[&str], path: &str, issues: &mut Vec<SchemaIssue>) {
  for key in object.keys().filter(|k| !allowed.contains(&k.as_str())) {
    issues.push(SchemaIssue::new(join(path, key), "unknown key"));
  }
}

fn required_string(object: &Map<String, Value>, key: &str, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<String> {
  match object.get(key) {
    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
    Some(Value::String(_)) => {
      issues.push(SchemaIssue::new(join(path, key), "must not be empty"));
      None
    }
    None | Some(Value::Null) => {
      issues.push(SchemaIssue::new(join(path, key), "required"));
      None
    }
    Some(other) => {
      issues.push(SchemaIssue::new(
        join(path, key),
        format!("expected a string, found {}", type_name(other)),
      ));
      None
    }
  }
}

fn optional_string(object: &Map<String, Value>, key: &str, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<String> {
  match object.get(key) {
    None | Some(Value::Null) => None,
    Some(_) => required_string(object, key, path, issues),
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
