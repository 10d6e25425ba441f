//! Toolchain provisioner - installs and selects a job's toolchain

use crate::core::matrix::ToolchainVersion;
use crate::runner::CommandSpec;
use std::path::Path;

/// Produces the rustup commands that provision a job.
///
/// The provisioner only describes commands; the step executor runs them on
/// the job's own runner, so a provisioning failure stays inside that job.
#[derive(Debug, Clone)]
pub struct ToolchainProvisioner {
    rustup: String,
    profile: String,
}

impl Default for ToolchainProvisioner {
    fn default() -> Self {
        Self {
            rustup: "rustup".to_string(),
            profile: "minimal".to_string(),
        }
    }
}

impl ToolchainProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific rustup binary
    pub fn with_rustup(mut self, rustup: impl Into<String>) -> Self {
        self.rustup = rustup.into();
        self
    }

    /// Install `toolchain`, then make it the default for `workdir` when
    /// `override_default` is set
    pub fn install(
        &self,
        toolchain: &ToolchainVersion,
        workdir: &Path,
        override_default: bool,
    ) -> Vec<CommandSpec> {
        let mut commands = vec![CommandSpec::new(
            &self.rustup,
            [
                "toolchain",
                "install",
                toolchain.as_str(),
                "--profile",
                self.profile.as_str(),
                "--no-self-update",
            ],
        )];

        if override_default {
            commands.push(
                CommandSpec::new(&self.rustup, ["override", "set", toolchain.as_str()])
                    .current_dir(workdir),
            );
        }

        commands
    }

    /// Add a component (e.g. `clippy`) to `toolchain`
    pub fn add_component(&self, toolchain: &ToolchainVersion, component: &str) -> CommandSpec {
        CommandSpec::new(
            &self.rustup,
            ["component", "add", component, "--toolchain", toolchain.as_str()],
        )
    }
}
