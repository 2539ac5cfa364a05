//! Build metadata baked in at compile time.

use std::env::consts::{ARCH, OS};
use std::fmt;

const fn or(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => fallback,
    }
}

/// Version and provenance of the running binary.
///
/// The date, commit and branch come from `INJECTOR_BUILD_DATE`,
/// `INJECTOR_GIT_COMMIT` and `INJECTOR_GIT_BRANCH` in the build environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_date: &'static str,
    pub git_commit: &'static str,
    pub git_branch: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
}

/// Metadata for this build.
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    build_date: or(option_env!("INJECTOR_BUILD_DATE"), "unknown"),
    git_commit: or(option_env!("INJECTOR_GIT_COMMIT"), "dirty"),
    git_branch: or(option_env!("INJECTOR_GIT_BRANCH"), "dirty"),
    os: OS,
    arch: ARCH,
};

impl BuildInfo {
    pub fn platform(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }

    /// Text for `--version`, which clap prefixes with the binary name.
    pub fn long_version(&self) -> String {
        format!(
            "{}\nbuild date: {}\ncommit: {}\nbranch: {}\nplatform: {}",
            self.version,
            self.build_date,
            self.git_commit,
            self.git_branch,
            self.platform()
        )
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "  build date: {}", self.build_date)?;
        writeln!(f, "  commit: {}", self.git_commit)?;
        writeln!(f, "  branch: {}", self.git_branch)?;
        write!(f, "  platform: {}", self.platform())
    }
}
