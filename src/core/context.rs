//! Job context - where a job runs and what its placeholders expand to

use crate::core::matrix::{MatrixCell, OsFamily, ToolchainVersion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Execution context for one platform job
///
/// Each job owns its working directory; nothing in here is shared with
/// sibling jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    pub job_id: String,
    pub os: OsFamily,
    pub toolchain: ToolchainVersion,

    /// Repository the checkout step copies from
    pub source: PathBuf,

    /// Private checkout for this job
    pub workdir: PathBuf,

    /// Commit to check out (None = the source's HEAD)
    pub revision: Option<String>,

    /// Pipeline and user-defined variables
    pub variables: HashMap<String, String>,
}

impl JobContext {
    /// Relative `source` and `work_root` are anchored at the current directory
    pub fn new(cell: &MatrixCell, source: &Path, work_root: &Path) -> Self {
        let job_id = cell.id();
        Self {
            workdir: absolute(work_root).join(&job_id),
            job_id,
            os: cell.os,
            toolchain: cell.toolchain.clone(),
            source: absolute(source),
            revision: None,
            variables: HashMap::new(),
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_variables(mut self, variables: &HashMap<String, String>) -> Self {
        self.variables.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Variables for `{{ }}` substitution; matrix values win over user variables
    pub fn rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("os".to_string(), self.os.to_string());
        vars.insert("runner".to_string(), self.os.runner_image().to_string());
        vars.insert("toolchain".to_string(), self.toolchain.to_string());
        vars.insert("job".to_string(), self.job_id.clone());
        vars.insert("workdir".to_string(), self.workdir.display().to_string());
        vars
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
