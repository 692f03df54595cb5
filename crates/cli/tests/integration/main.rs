//! End-to-end tests running the ts-make binary against projects on disk.

mod common;
mod make_tests;
mod show_config_tests;
