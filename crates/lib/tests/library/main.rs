//! Integration tests for tsmake-lib: whole projects on disk, loaded and built
//! through the public API.

mod common;
mod config_tests;
mod model_tests;
mod plan_tests;
