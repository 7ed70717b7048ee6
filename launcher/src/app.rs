//! Binary entry logic: resolve config, build the plan, dispatch to a plain
//! launch or watch mode.

use std::ffi::OsString;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::core::plan::build_plan;
use crate::io::config::{config_source, load_from_source};
use crate::io::git::Git;
use crate::io::probe::GitProbe;
use crate::io::step_runner::StepRunner;
use crate::launch::run_launch;
use crate::watch::run_watch;

/// Load the config seen from `cwd` (or named by `config_env`), then run the
/// validator with `args`. Returns the launcher's exit code.
pub fn run<R: StepRunner>(
    cwd: &Path,
    config_env: Option<OsString>,
    args: &[OsString],
    runner: &R,
) -> Result<i32> {
    let source = config_source(config_env, cwd);
    let config = load_from_source(&source)?;
    let workdir = config.resolved_workdir(cwd);
    debug!(
        config = %source.path.display(),
        workdir = %workdir.display(),
        args = args.len(),
        watch = config.update.watch,
        "launcher configured"
    );

    let plan = build_plan(&config.plan_spec(&workdir), args)?;
    let outcome = if config.update.watch {
        let probe = GitProbe::new(Git::new(&workdir), config.update.remote.as_str());
        run_watch(&plan, runner, &probe, config.update.supervision())?
    } else {
        run_launch(&plan, runner)?
    };
    Ok(outcome.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Stage;
    use crate::io::config::{LauncherConfig, write_config};
    use crate::test_support::{ScriptedStep, ScriptedStepRunner, capture_logs};

    #[test]
    fn configured_event_is_logged_under_crate_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedStepRunner::new(vec![
            ScriptedStep::exit(0),
            ScriptedStep::exit(0),
            ScriptedStep::exit(5),
        ]);
        let args = [OsString::from("mykey")];

        let (code, logs) = capture_logs("warn,launcher=debug", || {
            run(temp.path(), None, &args, &runner)
        });

        assert_eq!(code.expect("run"), 5);
        assert!(logs.contains("launcher configured"), "logs: {logs}");
    }

    #[test]
    fn config_from_environment_shapes_the_plan() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = LauncherConfig::default();
        cfg.sync.enabled = false;
        cfg.validator.command = vec!["validator".to_string()];
        write_config(&temp.path().join("ops/launcher.toml"), &cfg).expect("write config");
        let runner = ScriptedStepRunner::new(vec![ScriptedStep::exit(0), ScriptedStep::exit(0)]);

        let code = run(
            temp.path(),
            Some(OsString::from("ops/launcher.toml")),
            &[OsString::from("--help")],
            &runner,
        )
        .expect("run");

        assert_eq!(code, 0);
        assert_eq!(runner.seen_stages(), vec![Stage::Installing, Stage::Running]);
        let validator = runner.seen().pop().expect("validator step");
        assert_eq!(validator.program, OsString::from("validator"));
        assert_eq!(validator.args, vec![OsString::from("--help")]);
        assert_eq!(validator.workdir, temp.path().join("."));
    }

    #[test]
    fn invalid_config_runs_no_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("launcher.toml"), "[validator]\ncommand = []\n")
            .expect("write config");
        let runner = ScriptedStepRunner::new(Vec::new());

        assert!(run(temp.path(), None, &[], &runner).is_err());
        assert!(runner.seen().is_empty());
    }
}
