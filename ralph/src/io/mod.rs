//! I/O helpers for loop controller commands.

pub mod committer;
pub mod config;
pub mod git;
pub mod host;
pub mod paths;
pub mod plan_store;
pub mod process;
pub mod project;
pub mod prompt;
pub mod state_store;
