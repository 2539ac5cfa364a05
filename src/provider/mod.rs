//! # Secret providers
//!
//! A provider turns a [`SecretRef`] plus a [`CredentialSource`] into the raw
//! bytes of the stored document. The pipeline treats the result as opaque;
//! decoding happens later in [`crate::document`].
//!
//! ## Available Providers
//!
//! - [`GcloudFetcher`]: Google Cloud Secret Manager through the `gcloud` CLI

use crate::Result;
use crate::options::{CredentialSource, LATEST_VERSION};
use std::fmt;

pub mod gcloud;


pub use gcloud::GcloudFetcher;

/// Identifies one version of a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub project: String,
    pub name: String,
    pub version: String,
}

impl SecretRef {
    /// Creates a reference; a missing version means the latest one.
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            version: version.unwrap_or_else(|| LATEST_VERSION.to_string()),
        }
    }

    /// Full resource name, e.g. `projects/acme/secrets/api/versions/latest`.
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.name, self.version
        )
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

pub trait SecretFetcher {
    /// Returns the stored payload of `secret`, unmodified.
    fn fetch(&self, secret: &SecretRef, credentials: &CredentialSource) -> Result<Vec<u8>>;

    /// Returns the name of this provider for display purposes
    fn name(&self) -> &'static str;
}
