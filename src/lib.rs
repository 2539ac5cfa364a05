//! # injector
//!
//! Fetches a JSON (or JSON5) document from Google Cloud Secret Manager and
//! exposes it as environment variables.
//!
//! Nested keys are flattened into dotted names (`db.user`). The result is
//! either printed as shell assignments or JSON, copied through verbatim, or
//! injected into the environment of a child command whose exit code becomes
//! the exit code of the invocation.
//!
//! ```no_run
//! use injector::{Injector, Options};
//!
//! let options = Options {
//!     key_file: Some("service-account.json".to_string()),
//!     project: Some("acme-prod".to_string()),
//!     secret_name: Some("api-env".to_string()),
//!     format_bash: true,
//!     ..Default::default()
//! };
//! let exit_code = Injector::load(options)?.run()?;
//! assert_eq!(exit_code, 0);
//! # Ok::<(), injector::InjectError>(())
//! ```

pub mod build_info;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod flatten;
pub mod injector;
pub mod launcher;
pub mod options;
pub mod output;
pub mod provider;
mod relaxed;

pub use build_info::{BUILD_INFO, BuildInfo};
pub use config::{GlobalConfig, GlobalDefaults};
pub use document::{Document, Node, Scalar};
pub use error::{ConflictError, InjectError, LaunchError, ParseError, Result};
pub use flatten::{FlatEntry, LineTemplate, flatten};
pub use injector::Injector;
pub use options::{CredentialSource, Options, OutputMode};
pub use provider::{GcloudFetcher, SecretFetcher, SecretRef};
