//! Helpers for running step processes with inherited stdio.
//!
//! Steps talk to the operator directly: stdin, stdout and stderr are never
//! piped or captured.

use std::io::ErrorKind;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::exit_status::shell_exit_code;
use crate::core::types::{FailureKind, StepCommand, StepResult};

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Supervised {
    /// The child ended on its own (or could not be spawned).
    Finished(StepResult),
    /// `should_stop` asked for the child to be stopped; it was terminated and reaped.
    Stopped,
}

/// Timing for a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervision {
    /// How long to wait between `should_stop` checks.
    pub poll: Duration,
    /// How long a stopped child gets to exit after SIGTERM before it is killed.
    /// Zero skips SIGTERM.
    pub grace: Duration,
}

/// Build the `Command` for a step: program, args, workdir, extra env, inherited stdio.
pub fn command_for(step: &StepCommand) -> Command {
    let mut cmd = Command::new(&step.program);
    cmd.args(&step.args)
        .current_dir(&step.workdir)
        .envs(&step.env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}

/// Run a step to completion.
///
/// Spawn failures become [`StepResult::Errored`]; only a failure to wait on an
/// already running child is returned as `Err`.
#[instrument(skip_all, fields(stage = %step.stage))]
pub fn run_step_command(step: &StepCommand) -> Result<StepResult> {
    let mut child = match spawn(step) {
        Ok(child) => child,
        Err(result) => return Ok(result),
    };
    let status = child
        .wait()
        .with_context(|| format!("wait for {}", step.stage))?;
    let result = StepResult::Exited(exit_code(status));
    debug!(%result, "step finished");
    Ok(result)
}

/// Run a step, calling `should_stop` every `supervision.poll` while it is
/// still running.
///
/// When `should_stop` returns true the child gets SIGTERM and
/// `supervision.grace` to exit, then it is killed. Either way it is reaped
/// before returning.
#[instrument(skip_all, fields(stage = %step.stage, poll_secs = supervision.poll.as_secs()))]
pub fn run_step_supervised(
    step: &StepCommand,
    supervision: Supervision,
    should_stop: &mut dyn FnMut() -> bool,
) -> Result<Supervised> {
    let mut child = match spawn(step) {
        Ok(child) => child,
        Err(result) => return Ok(Supervised::Finished(result)),
    };

    loop {
        if let Some(status) = child
            .wait_timeout(supervision.poll)
            .with_context(|| format!("wait for {}", step.stage))?
        {
            let result = StepResult::Exited(exit_code(status));
            debug!(%result, "supervised step finished");
            return Ok(Supervised::Finished(result));
        }
        if should_stop() {
            warn!(pid = child.id(), grace_secs = supervision.grace.as_secs(), "stopping step");
            stop(&mut child, supervision.grace)
                .with_context(|| format!("stop {}", step.stage))?;
            return Ok(Supervised::Stopped);
        }
    }
}

/// Ask the child to exit, kill it once `grace` runs out, and reap it.
fn stop(child: &mut Child, grace: Duration) -> Result<()> {
    if !grace.is_zero() && request_termination(child) {
        if let Some(status) = child.wait_timeout(grace).context("wait after SIGTERM")? {
            debug!(exit_code = exit_code(status), "step exited after SIGTERM");
            return Ok(());
        }
        warn!(pid = child.id(), "step outlived its stop grace period, killing");
    }
    child.kill().context("kill")?;
    child.wait().context("wait after kill")?;
    Ok(())
}

/// Send SIGTERM with the `kill` builtin of `sh`.
///
/// The child is unreaped until `stop` waits on it, so its pid cannot have been
/// reused. Returns false when the signal could not be delivered.
#[cfg(unix)]
fn request_termination(child: &Child) -> bool {
    let pid = child.id().to_string();
    match Command::new("sh")
        .args(["-c", "kill -TERM \"$1\"", "sh", pid.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => true,
        Ok(status) => {
            debug!(%status, "kill -TERM failed");
            false
        }
        Err(err) => {
            debug!(err = %err, "could not run kill");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_child: &Child) -> bool {
    false
}

fn spawn(step: &StepCommand) -> std::result::Result<Child, StepResult> {
    debug!(command = %step.display_line(), workdir = %step.workdir.display(), "spawning step");
    command_for(step).spawn().map_err(|err| {
        debug!(err = %err, command = %step.display_line(), "failed to spawn step");
        StepResult::Errored {
            kind: failure_kind(err.kind()),
            message: format!("spawn {}: {err}", step.display_line()),
        }
    })
}

fn failure_kind(kind: ErrorKind) -> FailureKind {
    match kind {
        ErrorKind::NotFound => FailureKind::NotFound,
        ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        _ => FailureKind::Other,
    }
}

/// Shell-style exit code for a finished child.
pub fn exit_code(status: ExitStatus) -> i32 {
    shell_exit_code(status.code(), terminating_signal(status))
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}
