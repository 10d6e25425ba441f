//! Command runners: how a step's commands reach an execution environment

pub mod process;

use crate::core::matrix::OsFamily;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use process::ProcessRunner;

/// Error types for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },
}

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: HashMap::new(),
            timeout: None,
        }
    }

    /// Build from an argument vector whose first element is the program
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-quoted command line for logs and reports
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// What a finished command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// None when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}

/// The execution environments available, one runner per family
#[derive(Clone, Default)]
pub struct RunnerPool {
    runners: HashMap<OsFamily, Arc<dyn CommandRunner>>,
}

impl RunnerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A process runner for the host's family only
    pub fn local() -> Self {
        let mut pool = Self::new();
        if let Some(host) = OsFamily::host() {
            pool.insert(host, Arc::new(ProcessRunner::new()));
        }
        pool
    }

    /// The same runner for every family
    pub fn uniform(runner: Arc<dyn CommandRunner>) -> Self {
        let mut pool = Self::new();
        for os in OsFamily::ALL {
            pool.insert(os, runner.clone());
        }
        pool
    }

    pub fn insert(&mut self, os: OsFamily, runner: Arc<dyn CommandRunner>) {
        self.runners.insert(os, runner);
    }

    pub fn get(&self, os: OsFamily) -> Option<Arc<dyn CommandRunner>> {
        self.runners.get(&os).cloned()
    }

    pub fn families(&self) -> Vec<OsFamily> {
        let mut families: Vec<_> = self.runners.keys().copied().collect();
        families.sort();
        families
    }
}
