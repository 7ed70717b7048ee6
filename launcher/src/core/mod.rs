//! Deterministic, pure logic shared by the launcher.
//!
//! Core modules must be free of I/O side effects. They describe what the
//! launcher will run and how results map to exit codes; `io` does the running.

pub mod exit_status;
pub mod plan;
pub mod types;
