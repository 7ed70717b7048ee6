//! Auto-updating launcher for a Commune subnet validator.
//!
//! Each launch runs three external steps in a fixed order: pull the latest
//! source, reinstall the local package in editable mode, then run the
//! validator with the operator's arguments forwarded verbatim. The first two
//! steps are best-effort; only the validator's exit status reaches the caller.
//!
//! - **[`core`]**: Pure, deterministic logic (stages, launch plan, exit codes).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config file, git, child processes).
//!   Isolated behind traits so tests can script every step.
//!
//! Orchestration modules ([`launch`], [`watch`]) coordinate core logic with
//! I/O; [`app`] wires them up for the `auto-updating-validator` binary.

pub mod app;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod watch;
