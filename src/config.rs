//! User configuration file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "INJECTOR_CONFIG";

/// Global user configuration for injector.
///
/// Stored in the user's config directory. Supplies defaults for options that
/// were given neither as a flag nor as an environment variable. Credentials
/// are not configurable here.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

/// Default settings in the global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GlobalDefaults {
    /// GCP project id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Secret holding the environment document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    /// Secret version, `latest` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_version: Option<String>,
    /// Pass the parent environment through to the command
    #[serde(default)]
    pub preserve_env: bool,
}

impl GlobalConfig {
    /// Gets the path to the global configuration file.
    ///
    /// `$INJECTOR_CONFIG` when set, otherwise `config.toml` in the system's
    /// config directory, typically `~/.config/injector/config.toml` on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined
    pub fn path() -> io::Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        use directories::ProjectDirs;
        let dirs = ProjectDirs::from("", "", "injector").ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the global user configuration, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Option<Self>> {
        let path = match Self::path() {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::load_from(&path)
    }

    /// Loads the configuration at `path`, or `None` if the file is missing.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&content)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InjectError;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = GlobalConfig::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[defaults]
project = "acme-prod"
secret_name = "api-env"
preserve_env = true
"#,
        )
        .unwrap();

        let config = GlobalConfig::load_from(&path).unwrap().unwrap();
        assert_eq!(config.defaults.project.as_deref(), Some("acme-prod"));
        assert_eq!(config.defaults.secret_name.as_deref(), Some("api-env"));
        assert_eq!(config.defaults.secret_version, None);
        assert!(config.defaults.preserve_env);
    }

    #[test]
    fn test_credentials_are_not_configurable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[defaults]\nkey_file = \"/tmp/key.json\"\n").unwrap();

        let result = GlobalConfig::load_from(&path);
        assert!(matches!(result, Err(InjectError::Toml(_))));
    }

    #[test]
    #[serial]
    fn test_path_env_override() {
        unsafe { env::set_var(CONFIG_ENV, "/etc/injector/config.toml") };
        assert_eq!(
            GlobalConfig::path().unwrap(),
            PathBuf::from("/etc/injector/config.toml")
        );
        unsafe { env::remove_var(CONFIG_ENV) };
    }
}
