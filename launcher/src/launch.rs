//! Orchestration for a single launch: sync, install, run.
//!
//! Sync and install are best-effort. Their failures are logged and then
//! dropped, so the validator always starts with whatever source and packages
//! are on disk. Only the validator's result reaches the caller.

use std::fmt;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::plan::LaunchPlan;
use crate::core::types::{FailureKind, Stage, StepCommand, StepResult};
use crate::io::step_runner::StepRunner;

/// Summary of a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    /// Result of the last sync attempt; `None` when sync is disabled.
    pub sync: Option<StepResult>,
    /// Result of the last install attempt; `None` when install is disabled.
    pub install: Option<StepResult>,
    /// The validator's exit code, which becomes the launcher's.
    pub exit_code: i32,
    /// Restarts triggered by watch mode (always 0 otherwise).
    pub restarts: u32,
}

/// Results of the best-effort update steps of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateResults {
    pub sync: Option<StepResult>,
    pub install: Option<StepResult>,
}

/// The validator could not be started at all.
///
/// Carried inside `anyhow::Error`; `main` downcasts it to pick a
/// shell-compatible exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSpawnError {
    pub command: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ValidatorSpawnError {
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl fmt::Display for ValidatorSpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator did not start ({}): {}", self.command, self.message)
    }
}

impl std::error::Error for ValidatorSpawnError {}

/// Run the plan once: `Syncing → Installing → Running`.
///
/// Returns the validator's exit code in [`LaunchOutcome::exit_code`]. Errors
/// only when the validator cannot be started or waited on.
pub fn run_launch<R: StepRunner>(plan: &LaunchPlan, runner: &R) -> Result<LaunchOutcome> {
    let updates = run_update_steps(plan, runner);
    info!(command = %plan.validator.display_line(), "starting validator");
    let result = runner.run(&plan.validator)?;
    let exit_code = validator_exit_code(&plan.validator, result)?;
    info!(exit_code, "validator exited");
    Ok(LaunchOutcome {
        sync: updates.sync,
        install: updates.install,
        exit_code,
        restarts: 0,
    })
}

/// Run the enabled update steps in order, never failing.
pub fn run_update_steps<R: StepRunner>(plan: &LaunchPlan, runner: &R) -> UpdateResults {
    UpdateResults {
        sync: plan.sync.as_ref().map(|step| run_best_effort(runner, step)),
        install: plan
            .install
            .as_ref()
            .map(|step| run_best_effort(runner, step)),
    }
}

/// Run one update step; any failure is logged and turned into a value.
fn run_best_effort<R: StepRunner>(runner: &R, step: &StepCommand) -> StepResult {
    debug_assert!(step.stage.is_best_effort());
    info!(stage = %step.stage, command = %step.display_line(), "starting step");
    let result = match runner.run(step) {
        Ok(result) => result,
        Err(err) => StepResult::Errored {
            kind: FailureKind::Other,
            message: format!("{err:#}"),
        },
    };
    if result.success() {
        debug!(stage = %step.stage, "step succeeded");
    } else {
        warn!(stage = %step.stage, %result, "step failed, continuing");
    }
    result
}

/// Map the validator's result to the launcher exit code.
pub fn validator_exit_code(step: &StepCommand, result: StepResult) -> Result<i32> {
    debug_assert_eq!(step.stage, Stage::Running);
    match result {
        StepResult::Exited(code) => Ok(code),
        StepResult::Errored { kind, message } => Err(ValidatorSpawnError {
            command: step.display_line(),
            kind,
            message,
        }
        .into()),
    }
}
