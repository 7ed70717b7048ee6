//! `auto-updating-validator`: pull, reinstall, then run the subnet validator.
//!
//! Every command-line token is forwarded to the validator untouched, so the
//! launcher reads its own settings from `launcher.toml` (or the file named by
//! `SUBNET_LAUNCHER_CONFIG`) instead of flags.

use std::env;
use std::ffi::OsString;

use anyhow::Context;
use launcher::app;
use launcher::exit_codes;
use launcher::io::config::CONFIG_PATH_ENV;
use launcher::io::step_runner::ProcessStepRunner;
use launcher::launch::ValidatorSpawnError;
use launcher::logging;

fn main() {
    logging::init();
    let args: Vec<OsString> = env::args_os().skip(1).collect();
    let result = env::current_dir()
        .context("read current directory")
        .and_then(|cwd| {
            app::run(
                &cwd,
                env::var_os(CONFIG_PATH_ENV),
                &args,
                &ProcessStepRunner,
            )
        });
    let code = match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            err.downcast_ref::<ValidatorSpawnError>()
                .map_or(exit_codes::INVALID, ValidatorSpawnError::exit_code)
        }
    };
    std::process::exit(code);
}
