use crate::options::CredentialSource;
use crate::provider::{SecretFetcher, SecretRef};
use crate::{InjectError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::debug;

/// Environment variable overriding the `gcloud` executable.
pub const GCLOUD_ENV: &str = "INJECTOR_GCLOUD";

/// Points gcloud at a service account key for a single invocation.
const CREDENTIAL_FILE_OVERRIDE: &str = "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE";

/// Reads secrets from Google Cloud Secret Manager by running
/// `gcloud secrets versions access`.
#[derive(Debug, Clone)]
pub struct GcloudFetcher {
    program: PathBuf,
}

impl GcloudFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses `$INJECTOR_GCLOUD` when set, otherwise `gcloud` from `PATH`.
    pub fn from_env() -> Self {
        let program = env::var_os(GCLOUD_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("gcloud"));
        Self::new(program)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, secret: &SecretRef, key_file: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env(CREDENTIAL_FILE_OVERRIDE, key_file)
            .args(["secrets", "versions", "access", secret.version.as_str()])
            .arg("--secret")
            .arg(&secret.name)
            .arg("--project")
            .arg(&secret.project)
            .arg("--quiet")
            .stdin(Stdio::null());
        cmd
    }

    fn failure(secret: &SecretRef, reason: impl Into<String>) -> InjectError {
        InjectError::Fetch {
            secret: secret.resource_name(),
            reason: reason.into(),
        }
    }
}

impl Default for GcloudFetcher {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Decodes a base64 service account key into a private temporary file.
///
/// Whitespace inside the value is ignored so wrapped `base64` output works.
pub(crate) fn write_inline_key(encoded: &str) -> Result<NamedTempFile> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let decoded = STANDARD.decode(compact.as_bytes())?;

    let mut file = NamedTempFile::new()?;
    file.write_all(&decoded)?;
    file.flush()?;
    Ok(file)
}

impl SecretFetcher for GcloudFetcher {
    fn fetch(&self, secret: &SecretRef, credentials: &CredentialSource) -> Result<Vec<u8>> {
        // Must outlive the gcloud process.
        let inline_key;
        let key_file = match credentials {
            CredentialSource::KeyFile(path) => {
                if !path.is_file() {
                    return Err(Self::failure(
                        secret,
                        format!("key file '{}' does not exist", path.display()),
                    ));
                }
                path.as_path()
            }
            CredentialSource::KeyValue(encoded) => {
                inline_key = write_inline_key(encoded)?;
                inline_key.path()
            }
        };

        debug!(secret = %secret, program = %self.program.display(), "fetching secret");

        let output = match self.command(secret, key_file).output() {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Self::failure(
                    secret,
                    format!(
                        "Google Cloud CLI ({}) is not installed.\n\nTo install it, see https://cloud.google.com/sdk/docs/install\nor set {} to the path of the gcloud executable.",
                        self.program.display(),
                        GCLOUD_ENV
                    ),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.contains("PERMISSION_DENIED") {
                return Err(Self::failure(
                    secret,
                    format!(
                        "permission denied. The service account needs the 'Secret Manager Secret Accessor' role.\n\n{}",
                        stderr
                    ),
                ));
            }
            if stderr.is_empty() {
                return Err(Self::failure(
                    secret,
                    format!("{} exited with {}", self.program.display(), output.status),
                ));
            }
            return Err(Self::failure(secret, stderr));
        }

        debug!(secret = %secret, bytes = output.stdout.len(), "fetched secret");
        Ok(output.stdout)
    }

    fn name(&self) -> &'static str {
        "gcloud"
    }
}
