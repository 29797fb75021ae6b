//! Error types for questfix.
//!
//! Only configuration loading and journal startup can fail outright. Everything
//! that happens once monitoring is running (lookups, file writes, host actions)
//! degrades in place and is reported through the journal instead of `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or bootstrapping the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write default configuration {path}: {source}")]
    WriteDefault {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize default configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors raised while opening the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("No log directory could be determined")]
    NoLogDirectory,

    #[error("No log directory is writable (primary: {primary}, secondary: {secondary})")]
    NoWritableDirectory {
        primary: PathBuf,
        secondary: PathBuf,
    },
}

/// Top-level error type for questfix.
#[derive(Debug, Error)]
pub enum QuestFixError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl QuestFixError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a journal error.
    #[must_use]
    pub const fn is_journal(&self) -> bool {
        matches!(self, Self::Journal(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if startup can continue with defaults after this error.
    ///
    /// A broken configuration file falls back to built-in settings; losing
    /// every log directory does not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Journal(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for questfix operations.
pub type QuestFixResult<T> = Result<T, QuestFixError>;
