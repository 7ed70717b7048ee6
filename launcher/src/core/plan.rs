//! Launch plan: the resolved command lines for one launch, in stage order.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::types::{Stage, StepCommand};

/// Inputs for [`build_plan`]. Borrowed so callers keep ownership of config.
#[derive(Debug, Clone, Copy)]
pub struct PlanSpec<'a> {
    pub workdir: &'a Path,
    /// `None` when the sync step is disabled.
    pub sync: Option<&'a [String]>,
    /// `None` when the install step is disabled.
    pub install: Option<&'a [String]>,
    pub validator: &'a [String],
    pub env: &'a BTreeMap<String, String>,
}

/// The steps of one launch. Disabled update steps are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub sync: Option<StepCommand>,
    pub install: Option<StepCommand>,
    pub validator: StepCommand,
}

/// Build the launch plan.
///
/// `args` are appended to the validator command exactly as given: no token is
/// added, dropped, reordered, or reinterpreted. An empty `args` adds nothing.
pub fn build_plan(spec: &PlanSpec<'_>, args: &[OsString]) -> Result<LaunchPlan> {
    let sync = spec
        .sync
        .map(|command| step(spec, Stage::Syncing, command, &[]))
        .transpose()?;
    let install = spec
        .install
        .map(|command| step(spec, Stage::Installing, command, &[]))
        .transpose()?;
    let validator = step(spec, Stage::Running, spec.validator, args)?;
    Ok(LaunchPlan {
        sync,
        install,
        validator,
    })
}

fn step(
    spec: &PlanSpec<'_>,
    stage: Stage,
    command: &[String],
    forwarded: &[OsString],
) -> Result<StepCommand> {
    let (program, fixed) = command
        .split_first()
        .ok_or_else(|| anyhow!("{stage} command is empty"))?;
    if program.trim().is_empty() {
        return Err(anyhow!("{stage} command has a blank program"));
    }
    let mut args: Vec<OsString> = fixed.iter().map(OsString::from).collect();
    args.extend(forwarded.iter().cloned());
    Ok(StepCommand {
        stage,
        program: OsString::from(program),
        args,
        workdir: spec.workdir.to_path_buf(),
        env: spec.env.clone(),
    })
}
