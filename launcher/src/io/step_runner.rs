//! Step runner abstraction.
//!
//! The [`StepRunner`] trait decouples launch orchestration from actually
//! spawning `git`, `pip` and the validator. Tests use scripted runners that
//! record each [`StepCommand`] and return predetermined results.

use anyhow::Result;

use crate::core::types::{StepCommand, StepResult};
use crate::io::process::{Supervised, Supervision, run_step_command, run_step_supervised};

/// Abstraction over how steps are executed.
pub trait StepRunner {
    /// Run the step to completion and report how it ended.
    fn run(&self, step: &StepCommand) -> Result<StepResult>;

    /// Run the step, polling `should_stop` every `supervision.poll` while it
    /// runs and stopping it when asked.
    fn run_supervised(
        &self,
        step: &StepCommand,
        supervision: Supervision,
        should_stop: &mut dyn FnMut() -> bool,
    ) -> Result<Supervised>;
}

/// Runner that spawns real child processes with inherited stdio.
pub struct ProcessStepRunner;

impl StepRunner for ProcessStepRunner {
    fn run(&self, step: &StepCommand) -> Result<StepResult> {
        run_step_command(step)
    }

    fn run_supervised(
        &self,
        step: &StepCommand,
        supervision: Supervision,
        should_stop: &mut dyn FnMut() -> bool,
    ) -> Result<Supervised> {
        run_step_supervised(step, supervision, should_stop)
    }
}
