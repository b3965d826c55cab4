//! Error types for apisuite

use std::io;

use thiserror::Error;

/// Result type alias for apisuite
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// Only the configuration-stage variants (`Config`, `Combine`, `NoMatch`,
/// `Conflict`) abort a run. Everything raised while a test executes is
/// folded into that test's result tree by the runner.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad CLI input, missing files, malformed documents)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Suite documents could not be combined
    #[error("Combine error: {0}")]
    Combine(String),

    /// Tag filter matched no test
    #[error("No test matches the requested tags: {0}")]
    NoMatch(String),

    /// Action name already bound to a different source
    #[error("Action '{name}' already registered from {existing} (conflicting source: {incoming})")]
    Conflict {
        /// Action name
        name: String,
        /// Source of the registered action
        existing: String,
        /// Source that tried to register the same name
        incoming: String,
    },

    /// Action name is not registered
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action failed
    #[error("Action '{name}' failed: {source}")]
    Action {
        /// Action name
        name: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// MAC type other than `hmac` / `cmac`
    #[error("Unsupported MAC type: {0}")]
    UnsupportedMacType(String),

    /// Unsupported algorithm, encoding or option value
    #[error("Unsupported {what}: {value}")]
    Unsupported {
        /// What kind of option was rejected
        what: &'static str,
        /// The rejected value
        value: String,
    },

    /// Invalid action input (missing field, bad key, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Placeholder could not be resolved
    #[error("Unresolved variable: {0}")]
    UnresolvedVariable(String),

    /// Transport error (network, timeout, invalid URL)
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap an error raised by an action implementation
    pub fn action(name: impl Into<String>, source: Error) -> Self {
        Self::Action {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create an unsupported-option error
    pub fn unsupported(what: &'static str, value: impl Into<String>) -> Self {
        Self::Unsupported {
            what,
            value: value.into(),
        }
    }

    /// Whether this error must abort the run before any test executes
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Combine(_)
                | Self::NoMatch(_)
                | Self::Conflict { .. }
                | Self::Io(_)
                | Self::Yaml(_)
        )
    }
}
