//! Triggers: the push event that starts a run and the filter that gates it

use crate::runner::{CommandRunner, CommandSpec};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Event kinds that can start a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerEvent {
    Push,
}

/// A push event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTrigger {
    pub id: Uuid,
    pub event: TriggerEvent,
    /// Full ref that was pushed, e.g. `refs/heads/main`
    pub git_ref: String,
    pub sha: String,
    pub created_at: DateTime<Utc>,
}

impl PipelineTrigger {
    pub fn push(git_ref: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: TriggerEvent::Push,
            git_ref: git_ref.into(),
            sha: sha.into(),
            created_at: Utc::now(),
        }
    }

    /// Build a push trigger from the repository's current HEAD
    pub async fn from_repository(runner: &dyn CommandRunner, repo: &Path) -> Result<Self> {
        let sha = runner
            .run(&CommandSpec::new("git", ["rev-parse", "HEAD"]).current_dir(repo))
            .await
            .context("Failed to run git")?;
        if !sha.success() {
            anyhow::bail!(
                "{} is not a git repository with commits: {}",
                repo.display(),
                sha.stderr.trim()
            );
        }

        // Detached HEAD has no symbolic ref
        let git_ref = runner
            .run(&CommandSpec::new("git", ["symbolic-ref", "-q", "HEAD"]).current_dir(repo))
            .await
            .context("Failed to run git")?;
        let git_ref = if git_ref.success() {
            git_ref.stdout.trim().to_string()
        } else {
            "HEAD".to_string()
        };

        Ok(Self::push(git_ref, sha.stdout.trim()))
    }

    /// Branch name for `refs/heads/*` refs
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }

    /// First 8 bytes of the sha; the whole sha when it is shorter or byte 8 splits a character
    pub fn short_sha(&self) -> &str {
        self.sha.get(..8).unwrap_or(&self.sha)
    }
}

/// Decides whether a trigger starts the pipeline
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    events: Vec<TriggerEvent>,
    branches: Vec<Regex>,
}

impl TriggerFilter {
    /// `branches` entries may use `*` as a wildcard; an empty list matches all
    pub fn new(events: Vec<TriggerEvent>, branches: &[String]) -> Result<Self> {
        let branches = branches
            .iter()
            .map(|pattern| {
                let escaped = regex::escape(pattern).replace(r"\*", ".*");
                Regex::new(&format!("^{}$", escaped))
                    .with_context(|| format!("Invalid branch pattern: {}", pattern))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { events, branches })
    }

    pub fn accepts(&self, trigger: &PipelineTrigger) -> bool {
        if !self.events.contains(&trigger.event) {
            return false;
        }
        if self.branches.is_empty() {
            return true;
        }
        let branch = trigger.branch().unwrap_or(&trigger.git_ref);
        self.branches.iter().any(|pattern| pattern.is_match(branch))
    }
}
