//! Test-only helpers: step builders, scripted runners and probes, git fixtures.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::types::{Stage, StepCommand, StepResult};
use crate::io::probe::UpdateProbe;
use crate::io::process::{Supervised, Supervision};
use crate::io::step_runner::StepRunner;

/// Build a step from a literal command line.
pub fn step_command(stage: Stage, workdir: &Path, command: &[&str]) -> StepCommand {
    let (program, args) = command.split_first().expect("command must be non-empty");
    StepCommand {
        stage,
        program: OsString::from(program),
        args: args.iter().map(OsString::from).collect(),
        workdir: workdir.to_path_buf(),
        env: BTreeMap::new(),
    }
}

/// Predetermined behaviour for one step invocation.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub result: StepResult,
    /// For supervised runs: how many times to poll `should_stop` before
    /// finishing with `result`.
    pub polls: u32,
}

impl ScriptedStep {
    pub fn exit(code: i32) -> Self {
        Self {
            result: StepResult::Exited(code),
            polls: 0,
        }
    }

    pub fn exit_after_polls(code: i32, polls: u32) -> Self {
        Self {
            result: StepResult::Exited(code),
            polls,
        }
    }

    pub fn errored(result: StepResult) -> Self {
        Self { result, polls: 0 }
    }
}

/// Step runner that replays scripted results and records every step it saw.
pub struct ScriptedStepRunner {
    script: RefCell<VecDeque<ScriptedStep>>,
    seen: RefCell<Vec<StepCommand>>,
}

impl ScriptedStepRunner {
    pub fn new(script: Vec<ScriptedStep>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    /// Every step invoked so far, in order.
    pub fn seen(&self) -> Vec<StepCommand> {
        self.seen.borrow().clone()
    }

    pub fn seen_stages(&self) -> Vec<Stage> {
        self.seen.borrow().iter().map(|step| step.stage).collect()
    }

    fn next(&self, step: &StepCommand) -> Result<ScriptedStep> {
        self.seen.borrow_mut().push(step.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted result left for {}", step.stage))
    }
}

impl StepRunner for ScriptedStepRunner {
    fn run(&self, step: &StepCommand) -> Result<StepResult> {
        Ok(self.next(step)?.result)
    }

    fn run_supervised(
        &self,
        step: &StepCommand,
        _supervision: Supervision,
        should_stop: &mut dyn FnMut() -> bool,
    ) -> Result<Supervised> {
        let scripted = self.next(step)?;
        for _ in 0..scripted.polls {
            if should_stop() {
                return Ok(Supervised::Stopped);
            }
        }
        Ok(Supervised::Finished(scripted.result))
    }
}

/// One scripted probe answer: `Ok(Some(rev))` is a pending revision,
/// `Err(message)` a failed check.
pub type ProbeAnswer = Result<Option<String>, String>;

/// Pending revision `rev`.
pub fn pending(rev: &str) -> ProbeAnswer {
    Ok(Some(rev.to_string()))
}

/// Probe that replays scripted answers, then reports "no update".
pub struct ScriptedProbe {
    answers: RefCell<VecDeque<ProbeAnswer>>,
    calls: Cell<u32>,
}

impl ScriptedProbe {
    pub fn new(answers: Vec<ProbeAnswer>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl UpdateProbe for ScriptedProbe {
    fn pending_revision(&self) -> Result<Option<String>> {
        self.calls.set(self.calls.get() + 1);
        match self.answers.borrow_mut().pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }
}

/// A bare `origin`, a checkout of it (`work`), and a second checkout
/// (`upstream`) used to push commits the work checkout has not seen.
pub struct TestRepo {
    temp: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let repo = Self { temp };

        git(repo.root(), &["init", "--bare", "--initial-branch=main", "origin.git"])?;
        git(repo.root(), &["clone", "origin.git", "upstream"])?;
        let upstream = repo.upstream();
        git(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        fs::write(upstream.join("README.md"), "subnet\n").context("write README")?;
        git(&upstream, &["add", "-A"])?;
        git(&upstream, &["commit", "--no-gpg-sign", "-m", "chore: initial commit"])?;
        git(&upstream, &["push", "origin", "main"])?;
        git(repo.root(), &["clone", "origin.git", "work"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Checkout the launcher syncs and runs from.
    pub fn workdir(&self) -> PathBuf {
        self.root().join("work")
    }

    fn upstream(&self) -> PathBuf {
        self.root().join("upstream")
    }

    /// Commit `contents` to `path` in the upstream checkout and push it to origin.
    pub fn push_upstream_commit(&self, path: &str, contents: &str) -> Result<()> {
        let upstream = self.upstream();
        fs::write(upstream.join(path), contents).with_context(|| format!("write {path}"))?;
        git(&upstream, &["add", "-A"])?;
        git(&upstream, &["commit", "--no-gpg-sign", "-m", &format!("feat: update {path}")])?;
        git(&upstream, &["push", "origin", "main"])?;
        Ok(())
    }

    /// Commit `contents` to `path` in the work checkout without pushing.
    pub fn commit_local(&self, path: &str, contents: &str) -> Result<()> {
        let work = self.workdir();
        fs::write(work.join(path), contents).with_context(|| format!("write {path}"))?;
        git(&work, &["add", "-A"])?;
        git(&work, &["commit", "--no-gpg-sign", "-m", &format!("local: {path}")])?;
        Ok(())
    }

    /// Fast-forward the work checkout to origin.
    pub fn pull_work(&self) -> Result<()> {
        git(&self.workdir(), &["pull", "--ff-only", "--quiet"])
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "launcher-test")
        .env("GIT_AUTHOR_EMAIL", "launcher-test@example.com")
        .env("GIT_COMMITTER_NAME", "launcher-test")
        .env("GIT_COMMITTER_EMAIL", "launcher-test@example.com")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

/// Run `f` with a subscriber filtered by `filter`, returning its result and
/// everything that was logged.
pub fn capture_logs<T>(filter: &str, f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(buffer.clone())
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, buffer.contents())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        let bytes = self.0.lock().map(|buf| buf.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
