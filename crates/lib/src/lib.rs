//! tsmake-lib: Core engine for ts-make
//!
//! This crate turns a declarative target graph into executed build steps:
//! - `module`: specifier resolution and single-flight module loading
//! - `export`: loading and validating values exported by config-like files
//! - `config`: locating and loading the project configuration
//! - `plugin`: the plugin/action contracts and the built-in plugin
//! - `model`: building the validated, cross-referenced `MakeSpec`
//! - `plan`: rooted, deduplicated build plans and their step sequence
//! - `make`: the driver that runs actions in step order
//! - `lua`: the per-run Lua VM and its `__dir`-aware loaders
//! - `settings`: environment overrides for the compiler and resolver

pub mod config;
pub mod consts;
pub mod export;
pub mod lua;
pub mod make;
pub mod model;
pub mod module;
pub mod plan;
pub mod plugin;
pub mod settings;
pub mod util;
