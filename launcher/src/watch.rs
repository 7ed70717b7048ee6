//! Watch mode: relaunch when the remote has commits the checkout lacks.
//!
//! Each cycle is a regular launch. While the validator runs, the probe is
//! consulted every check interval; a pending revision stops the validator and
//! starts the next cycle (sync, install, run) with the same arguments.
//! A validator that exits on its own ends the loop with its exit code.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::plan::LaunchPlan;
use crate::core::types::StepResult;
use crate::io::probe::UpdateProbe;
use crate::io::process::{Supervised, Supervision};
use crate::io::step_runner::StepRunner;
use crate::launch::{LaunchOutcome, run_update_steps, validator_exit_code};

/// Run the plan under supervision until the validator exits on its own.
///
/// Probe errors are logged and treated as "no update", so an unreachable
/// remote never interrupts a running validator. A cycle whose sync failed
/// does not check for updates at all: restarting could not pick them up. A
/// revision that already caused one restart never causes another, which
/// covers a sync step that succeeds without moving `HEAD`.
pub fn run_watch<R: StepRunner, P: UpdateProbe>(
    plan: &LaunchPlan,
    runner: &R,
    probe: &P,
    supervision: Supervision,
) -> Result<LaunchOutcome> {
    let mut restarts = 0u32;
    let mut restarted_for: Option<String> = None;
    loop {
        let updates = run_update_steps(plan, runner);
        let synced = updates.sync.as_ref().is_none_or(StepResult::success);
        if !synced {
            warn!("sync failed, update checks paused until the validator exits");
        }
        info!(
            command = %plan.validator.display_line(),
            check_interval_secs = supervision.poll.as_secs(),
            restarts,
            "starting validator under watch"
        );

        let mut pending: Option<String> = None;
        let supervised = {
            let mut should_stop = || {
                if !synced {
                    return false;
                }
                match probe.pending_revision() {
                    Ok(Some(revision)) if restarted_for.as_ref() == Some(&revision) => {
                        debug!(%revision, "already restarted for this revision");
                        false
                    }
                    Ok(Some(revision)) => {
                        pending = Some(revision);
                        true
                    }
                    Ok(None) => false,
                    Err(err) => {
                        warn!(err = %format!("{err:#}"), "update check failed, keeping validator running");
                        false
                    }
                }
            };
            runner.run_supervised(&plan.validator, supervision, &mut should_stop)?
        };

        match supervised {
            Supervised::Finished(result) => {
                let exit_code = validator_exit_code(&plan.validator, result)?;
                info!(exit_code, restarts, "validator exited");
                return Ok(LaunchOutcome {
                    sync: updates.sync,
                    install: updates.install,
                    exit_code,
                    restarts,
                });
            }
            Supervised::Stopped => {
                restarts += 1;
                info!(
                    restarts,
                    revision = pending.as_deref().unwrap_or("unknown"),
                    "update available, restarting validator"
                );
                restarted_for = pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::ffi::OsString;
    use std::path::Path;
    use std::time::Duration;

    use crate::core::plan::{PlanSpec, build_plan};
    use crate::core::types::{FailureKind, Stage, StepResult};
    use crate::launch::ValidatorSpawnError;
    use crate::test_support::{ScriptedProbe, ScriptedStep, ScriptedStepRunner, pending};

    const SUPERVISION: Supervision = Supervision {
        poll: Duration::from_secs(1800),
        grace: Duration::from_secs(10),
    };

    fn plan() -> LaunchPlan {
        let sync: Vec<String> = vec!["git".into(), "pull".into()];
        let install: Vec<String> = vec!["pip".into(), "install".into(), "-e".into(), ".".into()];
        let validator: Vec<String> = vec!["validator".into()];
        let env = BTreeMap::new();
        let spec = PlanSpec {
            workdir: Path::new("/srv/subnet"),
            sync: Some(&sync),
            install: Some(&install),
            validator: &validator,
            env: &env,
        };
        build_plan(&spec, &[OsString::from("mykey")]).expect("plan")
    }

    #[test]
    fn exits_with_validator_code_when_no_update() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(5, 3),
        ]);
        let probe = ScriptedProbe::new(Vec::new());
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");
        assert_eq!(outcome.exit_code, 5);
        assert_eq!(outcome.restarts, 0);
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn update_restarts_the_whole_sequence() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(0, 5),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
        ]);
        let probe = ScriptedProbe::new(vec![Ok(None), pending("b2c4")]);
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");

        assert_eq!(outcome.restarts, 1);
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(probe.calls(), 2);
        assert_eq!(
            runner.seen_stages(),
            vec![
                Stage::Syncing,
                Stage::Installing,
                Stage::Running,
                Stage::Syncing,
                Stage::Installing,
                Stage::Running,
            ]
        );
    }

    #[test]
    fn restarted_validator_keeps_the_same_arguments() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(0, 1),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit(2),
        ]);
        let probe = ScriptedProbe::new(vec![pending("b2c4")]);
        run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");

        let validators: Vec<_> = runner
            .seen()
            .into_iter()
            .filter(|step| step.stage == Stage::Running)
            .collect();
        assert_eq!(validators.len(), 2);
        assert_eq!(validators[0], validators[1]);
        assert_eq!(validators[0].args, vec!["mykey"]);
    }

    #[test]
    fn probe_errors_do_not_stop_validator() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(9, 2),
        ]);
        let probe = ScriptedProbe::new(vec![
            Err("could not read from remote".to_string()),
            Err("could not read from remote".to_string()),
        ]);
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");
        assert_eq!(outcome.exit_code, 9);
        assert_eq!(outcome.restarts, 0);
    }

    #[test]
    fn validator_spawn_failure_ends_watch() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(1),
            ScriptedStep::exit(1),
            ScriptedStep::errored(StepResult::Errored {
                kind: FailureKind::PermissionDenied,
                message: "permission denied".to_string(),
            }),
        ]);
        let probe = ScriptedProbe::new(Vec::new());
        let err = run_watch(&plan(), &runner, &probe, SUPERVISION).unwrap_err();
        let spawn = err
            .downcast_ref::<ValidatorSpawnError>()
            .expect("validator spawn error");
        assert_eq!(spawn.exit_code(), 126);
    }

    #[test]
    fn failing_sync_never_triggers_restarts() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(1),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(6, 5),
        ]);
        let probe = ScriptedProbe::new(vec![pending("b2c4"); 5]);
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");

        assert_eq!(outcome.restarts, 0);
        assert_eq!(outcome.exit_code, 6);
        assert_eq!(outcome.sync, Some(StepResult::Exited(1)));
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn same_revision_restarts_only_once() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(0, 1),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(3, 4),
        ]);
        let probe = ScriptedProbe::new(vec![pending("b2c4"); 5]);
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");

        assert_eq!(outcome.restarts, 1);
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(probe.calls(), 5);
    }

    #[test]
    fn newer_revision_after_restart_restarts_again() {
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(0, 1),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit_after_polls(0, 2),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
        ]);
        let probe =
            ScriptedProbe::new(vec![pending("b2c4"), pending("b2c4"), pending("e7f1")]);
        let outcome = run_watch(&plan(), &runner, &probe, SUPERVISION).expect("watch");

        assert_eq!(outcome.restarts, 2);
        assert_eq!(probe.calls(), 3);
    }
}
