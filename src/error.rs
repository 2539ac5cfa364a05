//! Error types for injector operations

use std::io;
use thiserror::Error;

/// Invalid option combinations, detected before any fetch or file access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("multiple output formats are not supported")]
    MultipleOutputFormats,
    #[error("multiple key source formats are not supported")]
    MultipleKeySources,
    #[error("at least one key source format is required")]
    MissingKeySource,
}

/// Failure to decode a secret document.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("secret document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error(
        "secret document is not valid JSON or relaxed JSON: {message} at line {line} column {column}"
    )]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("secret document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure to start or wait on the child process.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to start command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for command '{command}' to complete: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// The main error type for injector operations
///
/// Every component returns this (or one of the enums it wraps) and the
/// CLI decides the exit behavior.
#[derive(Error, Debug)]
pub enum InjectError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(
        "Missing required option '{0}'.\n\nSet it with the command line flag, its INJECTOR_* environment variable, or the [defaults] table of the config file."
    )]
    MissingOption(&'static str),
    #[error("Failed to fetch secret '{secret}': {reason}")]
    Fetch { secret: String, reason: String },
    #[error("Invalid inline credential: {0}")]
    Credential(#[from] base64::DecodeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid line template '{0}': expected exactly two '%s' placeholders")]
    Template(String),
}

/// A type alias for `Result<T, InjectError>`
pub type Result<T> = std::result::Result<T, InjectError>;
