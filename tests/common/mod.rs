use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch directory holding a fake `gcloud`, a service account key and
/// a config path that does not exist.
pub struct TestFixture {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path().to_path_buf();
        fs::write(base_path.join("key.json"), r#"{"type":"service_account"}"#).unwrap();
        Self {
            _temp_dir: temp_dir,
            base_path,
        }
    }

    pub fn key_file(&self) -> PathBuf {
        self.base_path.join("key.json")
    }

    /// Arguments the fake `gcloud` was last called with, one per line.
    pub fn gcloud_args(&self) -> String {
        fs::read_to_string(self.base_path.join("args")).unwrap()
    }

    /// Installs a `gcloud` stand-in that prints `payload`, or fails with a
    /// NOT_FOUND error when `exit_code` is non-zero.
    #[cfg(unix)]
    pub fn gcloud(&self, payload: &str, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let payload_path = self.base_path.join("payload");
        fs::write(&payload_path, payload).unwrap();

        let script = format!(
            r#"#!/bin/sh
printf '%s\n' "$@" > "{dir}/args"
if [ {code} -ne 0 ]; then
    echo "ERROR: (gcloud.secrets.versions.access) NOT_FOUND: Secret not found" >&2
    exit {code}
fi
cat "{payload}"
"#,
            dir = self.base_path.display(),
            code = exit_code,
            payload = payload_path.display()
        );

        let path = self.base_path.join("gcloud");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// An `inject` command wired to a fake `gcloud` printing `payload`.
    #[cfg(unix)]
    pub fn inject(&self, payload: &str) -> Command {
        self.command(self.gcloud(payload, 0))
    }

    /// An `inject` command using `gcloud` and isolated from the caller's
    /// configuration.
    pub fn command(&self, gcloud: PathBuf) -> Command {
        let mut cmd = Command::cargo_bin("inject").unwrap();
        cmd.env("INJECTOR_GCLOUD", gcloud)
            .env("INJECTOR_CONFIG", self.base_path.join("no-config.toml"))
            .env_remove("INJECTOR_KEY_VALUE")
            .env_remove("INJECTOR_PROJECT")
            .env_remove("INJECTOR_SECRET_NAME")
            .env_remove("INJECTOR_SECRET_VERSION")
            .env_remove("RUST_LOG");
        cmd
    }
}
