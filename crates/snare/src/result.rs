//! Result and error types for Snare.

use thiserror::Error;

/// Result type for Snare operations
pub type SnareResult<T> = Result<T, SnareError>;

/// Errors that can occur in Snare
#[derive(Debug, Error)]
pub enum SnareError {
    /// No fixture with this name exists in any configured source
    #[error("Fixture not found: {name}")]
    FixtureNotFound {
        /// Fixture name as requested
        name: String,
    },

    /// Fixture name would escape the fixture root or is empty
    #[error("Invalid fixture name: {name:?}")]
    InvalidFixtureName {
        /// Offending name
        name: String,
    },

    /// Fixture file exists but could not be parsed
    #[error("Fixture '{name}' could not be parsed: {message}")]
    FixtureParse {
        /// Fixture name
        name: String,
        /// Parser error message
        message: String,
    },

    /// URL pattern failed to compile
    #[error("Invalid URL pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler error message
        message: String,
    },

    /// Request URL could not be parsed
    #[error("Invalid URL {url:?}: {message}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Parser error message
        message: String,
    },

    /// HTTP method string not recognised
    #[error("Invalid HTTP method: {method:?}")]
    InvalidMethod {
        /// Method as given
        method: String,
    },

    /// A request or reply hook returned an error
    #[error("Rewrite hook failed{}: {message}", alias_suffix(.alias))]
    RewriteFailure {
        /// Alias of the rule whose hook failed, if any
        alias: Option<String>,
        /// Hook error message
        message: String,
    },

    /// `wait_for` exceeded its budget
    #[error("Timed out after {ms}ms waiting for @{alias}")]
    Timeout {
        /// Alias being waited on
        alias: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// A generic condition wait exceeded its budget
    #[error("Timed out after {ms}ms waiting for {condition}")]
    ConditionTimeout {
        /// Description of the condition
        condition: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// The awaited exchange settled in the failed state
    #[error("Exchange @{alias} failed: {message}")]
    FailedExchange {
        /// Alias of the failed exchange
        alias: String,
        /// Failure message recorded on the exchange
        message: String,
    },

    /// Forwarding a request to the real network failed
    #[error("Upstream request failed: {message}")]
    Upstream {
        /// Error message
        message: String,
    },

    /// Assertion on a captured exchange or request failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// HTTP client error
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn alias_suffix(alias: &Option<String>) -> String {
    alias
        .as_ref()
        .map(|a| format!(" for @{a}"))
        .unwrap_or_default()
}

impl SnareError {
    /// Build an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Whether this error came from a hook
    #[must_use]
    pub const fn is_rewrite_failure(&self) -> bool {
        matches!(self, Self::RewriteFailure { .. })
    }

    /// Whether this error is one of the timeout kinds
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConditionTimeout { .. })
    }
}
