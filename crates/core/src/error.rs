//! Error taxonomy for loading, model construction, acquisition and plugins.
//!
//! Ambiguous matches are not errors; they are reported through
//! [`crate::matcher::Ambiguity`] as a regular output of a run.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for matcher-core operations.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// A declared input could not be found or its size/hash did not match.
    #[error("Input integrity error for {input}: {reason}")]
    InputIntegrity { input: String, reason: String },

    /// A class record or class file could not be parsed.
    #[error("Malformed class data in {origin}: {message}")]
    MalformedBinary { origin: String, message: String },

    /// A super type is missing from the input set, the shared set and the platform.
    ///
    /// Construction degrades the class to "unresolved" instead of failing.
    #[error("Unresolved hierarchy for {class}: missing super type {missing}")]
    UnresolvedHierarchy { class: String, missing: String },

    /// A plugin failed to load or declared an incompatible API version.
    #[error("Failed to load plugin {plugin}: {reason}")]
    PluginLoad { plugin: String, reason: String },

    /// Underlying filesystem error, tagged with the path involved.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An entity key did not resolve against the class environment.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

impl MatcherError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MatcherError::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        MatcherError::MalformedBinary { origin: origin.into(), message: message.into() }
    }

    pub(crate) fn integrity(input: impl Into<String>, reason: impl Into<String>) -> Self {
        MatcherError::InputIntegrity { input: input.into(), reason: reason.into() }
    }
}

/// Convenience result type for matcher-core operations.
pub type MatcherResult<T> = Result<T, MatcherError>;
