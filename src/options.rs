//! Resolved options and the checks that run before any I/O.

use crate::error::ConflictError;
use std::path::PathBuf;

/// Secret version fetched when none is given.
pub const LATEST_VERSION: &str = "latest";

/// The single output representation of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Fetched bytes, unmodified.
    Raw,
    /// Indented, ASCII-only JSON.
    Json,
    /// `KEY="VALUE"` lines.
    AshEnv,
    /// `export KEY="VALUE"` lines.
    BashEnv,
    /// Run the trailing command with the secrets in its environment.
    ProcessInject,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Raw => "raw",
            OutputMode::Json => "json",
            OutputMode::AshEnv => "ash",
            OutputMode::BashEnv => "bash",
            OutputMode::ProcessInject => "inject",
        }
    }
}

/// Where the service account key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Path to a JSON service account key.
    KeyFile(PathBuf),
    /// Base64 encoded JSON service account key.
    KeyValue(String),
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            CredentialSource::KeyValue(_) => f.debug_tuple("KeyValue").field(&"<REDACTED>").finish(),
        }
    }
}

/// Option set resolved from command line flags and environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub key_file: Option<String>,
    pub key_value: Option<String>,
    pub format_ash: bool,
    pub format_bash: bool,
    pub format_json: bool,
    pub format_raw: bool,
    pub preserve_env: bool,
    pub output_file: Option<String>,
    pub project: Option<String>,
    pub secret_name: Option<String>,
    pub secret_version: Option<String>,
    pub debug: bool,
    pub command: Vec<String>,
}

/// Returns `true` for `None` and for strings that are empty after trimming.
pub fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Returns the value unless it is blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Options {
    /// Rejects mutually exclusive option combinations.
    ///
    /// Pure: nothing is fetched, read or written, so a conflict is reported
    /// before any side effect.
    ///
    /// # Errors
    ///
    /// * [`ConflictError::MultipleOutputFormats`] when two or more of the
    ///   raw, json, ash and bash formats are requested
    /// * [`ConflictError::MultipleKeySources`] when both a key file and a key
    ///   value are given
    /// * [`ConflictError::MissingKeySource`] when neither is given
    pub fn validate(&self) -> Result<(), ConflictError> {
        let formats = [
            self.format_ash,
            self.format_bash,
            self.format_json,
            self.format_raw,
        ];
        if formats.iter().filter(|&&set| set).count() > 1 {
            return Err(ConflictError::MultipleOutputFormats);
        }

        match (
            is_blank(self.key_file.as_deref()),
            is_blank(self.key_value.as_deref()),
        ) {
            (false, false) => Err(ConflictError::MultipleKeySources),
            (true, true) => Err(ConflictError::MissingKeySource),
            _ => Ok(()),
        }
    }

    /// The requested output mode; process injection when no format is set.
    pub fn output_mode(&self) -> OutputMode {
        if self.format_json {
            OutputMode::Json
        } else if self.format_raw {
            OutputMode::Raw
        } else if self.format_ash {
            OutputMode::AshEnv
        } else if self.format_bash {
            OutputMode::BashEnv
        } else {
            OutputMode::ProcessInject
        }
    }

    /// The credential source, validated.
    pub fn credential_source(&self) -> Result<CredentialSource, ConflictError> {
        self.validate()?;
        if let Some(path) = non_blank(self.key_file.as_deref()) {
            return Ok(CredentialSource::KeyFile(PathBuf::from(path)));
        }
        match non_blank(self.key_value.as_deref()) {
            Some(value) => Ok(CredentialSource::KeyValue(value.trim().to_string())),
            None => Err(ConflictError::MissingKeySource),
        }
    }
}
