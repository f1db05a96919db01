//! Error types for lrumap-core
//!
//! A missing key is never an error; lookups return `Option`. Errors cover
//! unusable arguments, configuration, scenario files and I/O. Each carries a
//! [`Remediation`] the CLI prints under the error line.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A command the user can run to diagnose or fix an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedCommand {
    pub label: String,
    pub command: String,
}

/// Recovery hint attached to an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Remediation {
    pub summary: String,
    pub commands: Vec<SuggestedCommand>,
    pub alternatives: Vec<String>,
}

impl Remediation {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(SuggestedCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    #[must_use]
    pub fn with_alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Multi-line text block starting with `To fix:`.
    #[must_use]
    pub fn render_plain(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "To fix:\n  {}", self.summary)?;
        if !self.commands.is_empty() {
            f.write_str("  Commands:\n")?;
            for SuggestedCommand { label, command } in &self.commands {
                writeln!(f, "    - {label}: {command}")?;
            }
        }
        if !self.alternatives.is_empty() {
            f.write_str("  Alternatives:\n")?;
            for alternative in &self.alternatives {
                writeln!(f, "    - {alternative}")?;
            }
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Zero capacity, or a `put` without a key.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scenario: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::InvalidArgument(_) => Remediation::new("Check the capacity and step keys.")
                .with_command("Capacity", "lrumap run --capacity <N> <scenario.yaml>")
                .with_alternative("Give every `put` step a `key`."),
            Self::Config(err) => err.remediation(),
            Self::Scenario(err) => err.remediation(),
            Self::Io(_) => Remediation::new("Make sure the file exists and is readable.")
                .with_command("Inspect", "ls -l <path>"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot read config file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed lrumap.toml: {0}")]
    ParseFailed(#[source] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    SerializeFailed(#[source] toml::ser::Error),

    #[error("invalid config value: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        let defaults = ("Compare with defaults", "lrumap config --print-default");
        match self {
            Self::FileNotFound(path) => {
                Remediation::new("Point --config or $LRUMAP_CONFIG at an existing file.")
                    .with_command("Inspect", format!("ls -l '{}'", path.display()))
                    .with_alternative("Unset LRUMAP_CONFIG to fall back to built-in defaults.")
            }
            Self::ReadFailed { path, .. } => {
                Remediation::new("The config file exists but could not be read.")
                    .with_command("Inspect", format!("ls -l '{}'", path.display()))
            }
            Self::ParseFailed(_) | Self::ValidationError(_) => {
                Remediation::new("Fix the reported field in lrumap.toml.")
                    .with_command(defaults.0, defaults.1)
            }
            Self::SerializeFailed(_) => Remediation::new("Report this as a bug."),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("malformed scenario YAML: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("scenario '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

impl ScenarioError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Parse(_) => Remediation::new("Fix the YAML; every step is a map with an `op`.")
                .with_alternative("Example step: `- { op: get, key: A, returns: 1 }`"),
            Self::Invalid { .. } => Remediation::new(
                "Fix the reported step. A step takes `returns` or `missing`, not both.",
            ),
        }
    }
}
