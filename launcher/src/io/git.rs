//! Git adapter for update checks.
//!
//! The sync step itself runs `git pull` as a plain step with inherited output.
//! This wrapper covers the captured queries used to decide whether the remote
//! has commits the local checkout does not.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Fetch `HEAD` of `remote` into `FETCH_HEAD` and return its SHA.
    #[instrument(skip_all, fields(remote))]
    pub fn fetch_remote_head(&self, remote: &str) -> Result<String> {
        self.run_checked(&["fetch", "--quiet", remote, "HEAD"])?;
        let out = self.run_capture(&["rev-parse", "FETCH_HEAD"])?;
        let sha = out.trim().to_string();
        if sha.is_empty() {
            return Err(anyhow!("git rev-parse FETCH_HEAD returned nothing"));
        }
        Ok(sha)
    }

    /// True when `commit` is already part of the local HEAD's history.
    pub fn head_contains(&self, commit: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", commit, "HEAD"];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }

    /// SHA of the remote HEAD when it has commits missing locally.
    ///
    /// `None` when the checkout already contains the remote HEAD, including
    /// when local commits are ahead of it.
    #[instrument(skip_all, fields(remote))]
    pub fn pending_update(&self, remote: &str) -> Result<Option<String>> {
        let latest = self.fetch_remote_head(remote)?;
        let contained = self.head_contains(&latest)?;
        debug!(%latest, contained, "checked remote head");
        Ok((!contained).then_some(latest))
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}
