//! Launcher configuration stored in `launcher.toml`.
//!
//! The launcher takes no options on its command line (every token belongs to
//! the validator), so this file is its only knob. Every field is optional and
//! the defaults reproduce the plain `git pull` / `pip install -e .` /
//! `python3 -m src.subnet.cli` sequence.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::plan::PlanSpec;
use crate::io::process::Supervision;

/// Config file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "launcher.toml";
/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SUBNET_LAUNCHER_CONFIG";

/// Launcher configuration (TOML).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Working tree that is synced, installed, and run from.
    /// Relative paths resolve against the launcher's current directory.
    pub workdir: PathBuf,

    pub sync: UpdateStepConfig,

    pub install: UpdateStepConfig,

    pub validator: ValidatorConfig,

    pub update: WatchConfig,

    /// Extra environment variables for every step (e.g. `VIRTUAL_ENV`).
    pub env: BTreeMap<String, String>,
}

/// A best-effort update step (sync or install).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdateStepConfig {
    pub enabled: bool,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Entrypoint; forwarded arguments are appended after it.
    pub command: Vec<String>,
}

/// Optional supervision: restart when the remote branch moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    pub watch: bool,
    pub check_interval_secs: u64,
    /// Remote whose `HEAD` is checked against local history.
    pub remote: String,
    /// Seconds a stopped validator gets to exit after SIGTERM before SIGKILL.
    pub stop_grace_secs: u64,
}

fn enabled_by_default() -> bool {
    true
}

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl UpdateStepConfig {
    pub fn sync_default() -> Self {
        Self {
            enabled: true,
            command: words(&["git", "pull"]),
        }
    }

    pub fn install_default() -> Self {
        Self {
            enabled: true,
            command: words(&["python3", "-m", "pip", "install", "-e", "."]),
        }
    }

    fn enabled_command(&self) -> Option<&[String]> {
        self.enabled.then_some(self.command.as_slice())
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: words(&["python3", "-m", "src.subnet.cli"]),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch: false,
            check_interval_secs: 30 * 60,
            remote: "origin".to_string(),
            stop_grace_secs: 10,
        }
    }
}

impl WatchConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn supervision(&self) -> Supervision {
        Supervision {
            poll: self.check_interval(),
            grace: Duration::from_secs(self.stop_grace_secs),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            sync: UpdateStepConfig::sync_default(),
            install: UpdateStepConfig::install_default(),
            validator: ValidatorConfig::default(),
            update: WatchConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

// Section-level defaults differ between sync and install, so a partially
// written `[sync]` table must not fall back to the install command.
#[derive(Deserialize)]
#[serde(default)]
struct RawConfig {
    workdir: PathBuf,
    sync: Option<RawStep>,
    install: Option<RawStep>,
    validator: ValidatorConfig,
    update: WatchConfig,
    env: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    command: Option<Vec<String>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        let defaults = LauncherConfig::default();
        Self {
            workdir: defaults.workdir,
            sync: None,
            install: None,
            validator: defaults.validator,
            update: defaults.update,
            env: defaults.env,
        }
    }
}

impl RawStep {
    fn resolve(self, default: UpdateStepConfig) -> UpdateStepConfig {
        UpdateStepConfig {
            enabled: self.enabled,
            command: self.command.unwrap_or(default.command),
        }
    }
}

impl From<RawConfig> for LauncherConfig {
    fn from(raw: RawConfig) -> Self {
        let sync = match raw.sync {
            Some(step) => step.resolve(UpdateStepConfig::sync_default()),
            None => UpdateStepConfig::sync_default(),
        };
        let install = match raw.install {
            Some(step) => step.resolve(UpdateStepConfig::install_default()),
            None => UpdateStepConfig::install_default(),
        };
        Self {
            workdir: raw.workdir,
            sync,
            install,
            validator: raw.validator,
            update: raw.update,
            env: raw.env,
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<()> {
        // Disabled steps never run, so their command may be left empty.
        if let Some(command) = self.sync.enabled_command() {
            validate_command("sync.command", command)?;
        }
        if let Some(command) = self.install.enabled_command() {
            validate_command("install.command", command)?;
        }
        validate_command("validator.command", &self.validator.command)?;
        if self.update.check_interval_secs == 0 {
            return Err(anyhow!("update.check_interval_secs must be > 0"));
        }
        if self.update.remote.trim().is_empty() {
            return Err(anyhow!("update.remote must be non-empty"));
        }
        if self.env.keys().any(|key| key.is_empty() || key.contains('=')) {
            return Err(anyhow!("env keys must be non-empty and must not contain '='"));
        }
        Ok(())
    }

    /// Working tree path resolved against `cwd`.
    pub fn resolved_workdir(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.workdir)
    }

    /// Borrow this config as plan input. `workdir` must outlive the result.
    pub fn plan_spec<'a>(&'a self, workdir: &'a Path) -> PlanSpec<'a> {
        PlanSpec {
            workdir,
            sync: self.sync.enabled_command(),
            install: self.install.enabled_command(),
            validator: &self.validator.command,
            env: &self.env,
        }
    }
}

fn validate_command(name: &str, command: &[String]) -> Result<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{name} must be a non-empty array")),
    }
}

/// Where the config comes from, and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Named via [`CONFIG_PATH_ENV`]; a missing file is then an error.
    pub explicit: bool,
}

/// Pick the config file: the env override if set, else `launcher.toml` in `cwd`.
pub fn config_source(env_value: Option<OsString>, cwd: &Path) -> ConfigSource {
    match env_value.filter(|value| !value.is_empty()) {
        Some(value) => ConfigSource {
            path: cwd.join(value),
            explicit: true,
        },
        None => ConfigSource {
            path: cwd.join(CONFIG_FILE_NAME),
            explicit: false,
        },
    }
}

/// Load config from the source chosen by [`config_source`].
pub fn load_from_source(source: &ConfigSource) -> Result<LauncherConfig> {
    if source.explicit && !source.path.exists() {
        return Err(anyhow!(
            "config file {} (from {CONFIG_PATH_ENV}) does not exist",
            source.path.display()
        ));
    }
    load_config(&source.path)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LauncherConfig::default()`.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = LauncherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let raw: RawConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    let cfg = LauncherConfig::from(raw);
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LauncherConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
