//! Build matrix: axes, cells and the cross-product expansion

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Operating-system family a job runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
    Macos,
}

impl OsFamily {
    pub const ALL: [OsFamily; 3] = [OsFamily::Linux, OsFamily::Windows, OsFamily::Macos];

    /// The family of the machine this process runs on
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(OsFamily::Linux)
        } else if cfg!(target_os = "windows") {
            Some(OsFamily::Windows)
        } else if cfg!(target_os = "macos") {
            Some(OsFamily::Macos)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Windows => "windows",
            OsFamily::Macos => "macos",
        }
    }

    /// Name of the hosted runner image for this family
    pub fn runner_image(&self) -> &'static str {
        match self {
            OsFamily::Linux => "ubuntu-latest",
            OsFamily::Windows => "windows-latest",
            OsFamily::Macos => "macos-latest",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" | "ubuntu" | "ubuntu-latest" => Ok(OsFamily::Linux),
            "windows" | "windows-latest" => Ok(OsFamily::Windows),
            "macos" | "macos-latest" | "darwin" => Ok(OsFamily::Macos),
            other => Err(format!("Unknown operating-system family: {}", other)),
        }
    }
}

/// A toolchain version: a release channel or a pinned version string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolchainVersion(String);

impl ToolchainVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the string looks like something rustup understands.
    ///
    /// An unrecognised string is not rejected here; it fails the owning job
    /// when provisioning runs.
    pub fn is_well_formed(&self) -> bool {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^(stable|beta|nightly(-\d{4}-\d{2}-\d{2})?|\d+\.\d+(\.\d+)?)(-[A-Za-z0-9_.-]+)?$")
                .expect("toolchain pattern is valid")
        });
        pattern.is_match(&self.0)
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolchainVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A named axis with its ordered values (for display and reporting)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

/// Matrix declaration: operating-system family × toolchain version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub os: Vec<OsFamily>,
    pub toolchain: Vec<ToolchainVersion>,
}

/// One combination of axis values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixCell {
    pub index: usize,
    pub os: OsFamily,
    pub toolchain: ToolchainVersion,
}

impl MatrixCell {
    /// Stable identifier used for job ids and working directories
    pub fn id(&self) -> String {
        let toolchain: String = self
            .toolchain
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{}-{}", self.os, toolchain)
    }
}

impl MatrixConfig {
    pub fn axes(&self) -> Vec<MatrixAxis> {
        vec![
            MatrixAxis {
                name: "os".to_string(),
                values: self.os.iter().map(|os| os.to_string()).collect(),
            },
            MatrixAxis {
                name: "toolchain".to_string(),
                values: self.toolchain.iter().map(|t| t.to_string()).collect(),
            },
        ]
    }

    /// Number of cells `expand` produces
    pub fn cell_count(&self) -> usize {
        self.os.len() * self.toolchain.len()
    }

    /// Cross product of the axes, os-major in declaration order.
    ///
    /// Expansion is total: there are no exclusions.
    pub fn expand(&self) -> Vec<MatrixCell> {
        self.os
            .iter()
            .flat_map(|os| self.toolchain.iter().map(move |toolchain| (*os, toolchain.clone())))
            .enumerate()
            .map(|(index, (os, toolchain))| MatrixCell { index, os, toolchain })
            .collect()
    }
}

/// Narrows which expanded cells actually run (empty lists select everything)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixSelection {
    pub os: Vec<OsFamily>,
    pub toolchain: Vec<ToolchainVersion>,
}

impl MatrixSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Select only jobs the current machine can run
    pub fn host_only() -> Self {
        Self {
            os: OsFamily::host().into_iter().collect(),
            toolchain: Vec::new(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.os.is_empty() && self.toolchain.is_empty()
    }

    pub fn includes(&self, cell: &MatrixCell) -> bool {
        (self.os.is_empty() || self.os.contains(&cell.os))
            && (self.toolchain.is_empty() || self.toolchain.contains(&cell.toolchain))
    }
}
