//! I/O helpers for the launcher.

pub mod config;
pub mod git;
pub mod probe;
pub mod process;
pub mod step_runner;
