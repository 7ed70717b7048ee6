//! Shared deterministic types for launcher core logic.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use crate::exit_codes;

/// One of the three launch stages, in execution order.
///
/// `Syncing → Installing → Running`, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Pull the latest source into the working tree.
    Syncing,
    /// Reinstall the local package in editable mode.
    Installing,
    /// Run the validator entrypoint.
    Running,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Syncing => "sync",
            Stage::Installing => "install",
            Stage::Running => "validator",
        }
    }

    /// True for stages whose failure is logged and discarded.
    pub fn is_best_effort(self) -> bool {
        !matches!(self, Stage::Running)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fully resolved command line for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub stage: Stage,
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Working directory the step runs in.
    pub workdir: PathBuf,
    /// Extra environment applied on top of the inherited one.
    pub env: BTreeMap<String, String>,
}

impl StepCommand {
    /// Human-readable command line for logs (lossy for non-UTF-8 tokens).
    pub fn display_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Why a step could not produce an exit code of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Program not found on `PATH` or at the given path.
    NotFound,
    /// Program exists but is not executable.
    PermissionDenied,
    /// Any other spawn or wait failure.
    Other,
}

impl FailureKind {
    /// Exit code a shell would report for the same failure.
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::NotFound => exit_codes::NOT_FOUND,
            FailureKind::PermissionDenied => exit_codes::NOT_EXECUTABLE,
            FailureKind::Other => exit_codes::INVALID,
        }
    }
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The process ran and exited (signals already folded into the code).
    Exited(i32),
    /// The process could not be run to completion by the launcher.
    Errored { kind: FailureKind, message: String },
}

impl StepResult {
    pub fn success(&self) -> bool {
        matches!(self, StepResult::Exited(exit_codes::OK))
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Exited(code) => write!(f, "exited with code {code}"),
            StepResult::Errored { message, .. } => write!(f, "could not run: {message}"),
        }
    }
}
