//! Embedded Lua environment.
//!
//! Plugins and script configuration files are Lua chunks executed in a single
//! VM per run. This module owns that VM's setup.
//!
//! # Submodules
//!
//! - [`globals`] - The `make` global table available to scripts
//! - [`loaders`] - `__dir`-aware `require` and `dofile`
//! - [`runtime`] - VM creation and `package.path` setup

pub mod globals;
pub mod loaders;
pub mod runtime;
