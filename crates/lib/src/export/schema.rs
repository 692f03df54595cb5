//! Schema validation contract.
//!
//! A schema turns an untyped JSON value into a typed output or reports every
//! mismatch it found. Validation internals are up to each implementation.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// One mismatch between a value and a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
  /// Dotted/indexed location inside the value, empty for the root.
  pub path: String,
  pub message: String,
}

impl SchemaIssue {
  pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      message: message.into(),
    }
  }
}

impl fmt::Display for SchemaIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_empty() {
      write!(f, "(root): {}", self.message)
    } else {
      write!(f, "{}: {}", self.path, self.message)
    }
  }
}

/// Every issue found while validating one value.
#[derive(Debug, Clone, Error)]
#[error("{}", render_issues(.issues))]
pub struct SchemaError {
  pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
  pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      issues: vec![SchemaIssue::new(path, message)],
    }
  }
}

fn render_issues(issues: &[SchemaIssue]) -> String {
  issues
    .iter()
    .map(|issue| format!("  - {}", issue))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Validates a JSON value and produces a typed output.
pub trait Schema {
  type Output;

  fn validate(&self, value: &Value) -> Result<Self::Output, SchemaError>;
}

/// Object-safe view of a schema for values whose typed form is not needed.
pub trait ArgsSchema {
  fn check(&self, value: &Value) -> Result<(), SchemaError>;
}

impl<S: Schema> ArgsSchema for S {
  fn check(&self, value: &Value) -> Result<(), SchemaError> {
    self.validate(value).map(|_| ())
  }
}

/// Schema backed by a serde type.
pub struct TypedSchema<T>(PhantomData<T>);

impl<T> TypedSchema<T> {
  pub fn new() -> Self {
    Self(PhantomData)
  }
}

impl<T> Default for TypedSchema<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: DeserializeOwned> Schema for TypedSchema<T> {
  type Output = T;

  fn validate(&self, value: &Value) -> Result<T, SchemaError> {
    T::deserialize(value).map_err(|e| SchemaError::single("", e.to_string()))
  }
}

/// Accepts any value unchanged.
pub struct AnySchema;

impl Schema for AnySchema {
  type Output = Value;

  fn validate(&self, value: &Value) -> Result<Value, SchemaError> {
    Ok(value.clone())
  }
}
