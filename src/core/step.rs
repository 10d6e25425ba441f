//! Step domain model

use crate::core::{
    config::{ActionKind, StepConfig},
    matrix::OsFamily,
    state::{FailureKind, StepState},
};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A single step of a platform job
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// What the step does
    pub action: StepAction,

    /// Record a failure but let the job go on
    pub continue_on_failure: bool,

    /// Families this step applies to (empty = all)
    pub only_on: Vec<OsFamily>,

    /// How a failure of this step is classified
    pub failure_kind: FailureKind,

    /// Timeout in seconds (None = no limit)
    pub timeout_secs: Option<u64>,

    /// Extra environment for the step's commands
    pub env: HashMap<String, String>,

    /// Runtime state
    pub state: StepState,
}

/// The action a step performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Materialize the sources into the job's working directory
    Checkout,
    /// Install the job's toolchain, optionally selecting it as the default
    Toolchain { override_default: bool },
    /// Add a toolchain component (e.g. the linter)
    Component { name: String },
    /// Run a command line
    Run { command: String, lint: LintPolicy },
}

/// How lint diagnostics are treated by a `run` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LintPolicy {
    /// Leave the command's own defaults alone
    #[default]
    Default,
    /// Promote every warning to an error
    DenyWarnings,
}

impl LintPolicy {
    /// Apply the policy to a linter argument list.
    ///
    /// Idempotent: arguments that already deny warnings come back unchanged.
    pub fn apply(&self, args: &[String]) -> Vec<String> {
        let mut args = args.to_vec();
        if *self == LintPolicy::Default {
            return args;
        }

        let separator = args.iter().position(|a| a == "--");
        let already_denied = separator.is_some_and(|sep| {
            args[sep + 1..]
                .windows(2)
                .any(|pair| pair[0] == "-D" && pair[1] == "warnings")
                || args[sep + 1..].iter().any(|a| a == "-Dwarnings")
        });
        if already_denied {
            return args;
        }

        if separator.is_none() {
            args.push("--".to_string());
        }
        args.push("-D".to_string());
        args.push("warnings".to_string());
        args
    }
}

impl Step {
    /// Create a step template from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        let action = match config.action_kind() {
            ActionKind::Checkout => StepAction::Checkout,
            ActionKind::Toolchain => StepAction::Toolchain {
                override_default: config.with.override_default,
            },
            ActionKind::Component => StepAction::Component {
                name: config.with.component.clone().unwrap_or_default(),
            },
            ActionKind::Run => StepAction::Run {
                command: config.run.clone().unwrap_or_default(),
                lint: if config.deny_warnings {
                    LintPolicy::DenyWarnings
                } else {
                    LintPolicy::Default
                },
            },
        };

        let failure_kind = config.kind.unwrap_or_else(|| action.default_failure_kind());

        Step {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            action,
            continue_on_failure: config.continue_on_error,
            only_on: config.os.clone(),
            failure_kind,
            timeout_secs: config.timeout_secs.or(defaults.timeout_secs),
            env: config.env.clone(),
            state: StepState::Pending,
        }
    }

    /// Whether the step belongs in a job for this family
    pub fn applies_to(&self, os: OsFamily) -> bool {
        self.only_on.is_empty() || self.only_on.contains(&os)
    }

    /// Copy of this template with `{{ variable }}` placeholders filled in
    pub fn instantiate(&self, variables: &HashMap<String, String>) -> Step {
        let mut step = self.clone();
        if let StepAction::Run { command, .. } = &mut step.action {
            *command = render(command, variables);
        }
        if let StepAction::Component { name } = &mut step.action {
            *name = render(name, variables);
        }
        for value in step.env.values_mut() {
            *value = render(value, variables);
        }
        step.state = StepState::Pending;
        step
    }

    /// Argument vector of a `run` step with its lint policy applied
    pub fn command_line(&self) -> Option<Result<Vec<String>, shell_words::ParseError>> {
        match &self.action {
            StepAction::Run { command, lint } => Some(
                shell_words::split(command).map(|argv| lint.apply(&argv)),
            ),
            _ => None,
        }
    }

    pub fn is_lint(&self) -> bool {
        matches!(
            self.action,
            StepAction::Run {
                lint: LintPolicy::DenyWarnings,
                ..
            }
        )
    }
}

impl StepAction {
    fn default_failure_kind(&self) -> FailureKind {
        match self {
            StepAction::Checkout | StepAction::Toolchain { .. } | StepAction::Component { .. } => {
                FailureKind::Provisioning
            }
            StepAction::Run {
                lint: LintPolicy::DenyWarnings,
                ..
            } => FailureKind::Lint,
            StepAction::Run { .. } => FailureKind::Compile,
        }
    }
}

/// Replace `{{ name }}` placeholders in one pass over `template`.
///
/// Substituted values are never expanded again; unknown names are left as
/// written.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid"));

    placeholder
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct StepDefaults {
    pub timeout_secs: Option<u64>,
}
