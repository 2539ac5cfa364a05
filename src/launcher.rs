//! Running the target command with the secrets in its environment.

use crate::error::LaunchError;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Environment handed to the child, in assignment order.
///
/// Parent variables are kept as raw OS strings, so values that are not
/// UTF-8 reach the child unchanged. Keys are not deduplicated; when a key
/// appears twice the later value is the one the child sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnvironment {
    vars: Vec<(OsString, OsString)>,
}

impl ChildEnvironment {
    /// The parent's environment (when `preserve_parent` is set) followed by
    /// `assignments` in the order given.
    pub fn build<I>(assignments: I, preserve_parent: bool) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = Vec::new();
        if preserve_parent {
            vars.extend(env::vars_os());
        }
        vars.extend(
            assignments
                .into_iter()
                .map(|(key, value)| (OsString::from(key), OsString::from(value))),
        );
        Self { vars }
    }

    pub fn push(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.push((key.into(), value.into()));
    }

    pub fn vars(&self) -> &[(OsString, OsString)] {
        &self.vars
    }

    /// The value the child will see for `key`.
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        let key = key.as_ref();
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Spawns `command` with exactly `environment` and waits for it.
///
/// The child shares the parent's stdout and stderr, reads stdin from the
/// null device and runs in its own process group on Unix. An empty
/// `command` only logs a warning.
///
/// Returns the child's exit code; a child terminated by a signal reports
/// `128 + signal`.
///
/// TODO: forward SIGINT/SIGTERM received by the parent to the child's
/// process group.
pub fn launch(command: &[String], environment: &ChildEnvironment) -> Result<i32, LaunchError> {
    let Some((program, args)) = command.split_first() else {
        warn!("no command specified");
        return Ok(0);
    };

    let mut cmd = Command::new(resolve_program(program));
    cmd.args(args)
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for (key, value) in environment.vars() {
        cmd.env(key, value);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!(
        program = %program,
        args = args.len(),
        vars = environment.len(),
        "starting command"
    );

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        command: program.clone(),
        source,
    })?;

    let status = child.wait().map_err(|source| LaunchError::Wait {
        command: program.clone(),
        source,
    })?;

    debug!(program = %program, %status, "command finished");
    Ok(exit_code(status))
}

/// Looks a bare program name up in the parent's `PATH`, which the child may
/// not have.
fn resolve_program(program: &str) -> PathBuf {
    if Path::new(program).components().count() > 1 {
        return PathBuf::from(program);
    }
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::flatten::{FlatEntry, LineTemplate, ROOT_PREFIX, flatten};
    use serial_test::serial;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_build_without_parent_environment() {
        let doc = Document::parse(br#"{"FOO":"bar","db":{"port":5432}}"#).unwrap();
        let template = LineTemplate::ash();
        let entries = flatten(doc.root(), ROOT_PREFIX, &template);

        let environment =
            ChildEnvironment::build(entries.into_iter().map(FlatEntry::into_assignment), false);
        assert_eq!(
            environment.vars(),
            &[
                (OsString::from("FOO"), OsString::from("bar")),
                (OsString::from("db.port"), OsString::from("5432")),
            ]
        );
    }

    #[test]
    #[serial]
    fn test_build_with_parent_environment() {
        unsafe { env::set_var("INJECTOR_TEST_PARENT", "parent") };
        let doc = Document::parse(br#"{"INJECTOR_TEST_PARENT":"secret"}"#).unwrap();
        let template = LineTemplate::ash();
        let entries = flatten(doc.root(), ROOT_PREFIX, &template);

        let environment =
            ChildEnvironment::build(entries.into_iter().map(FlatEntry::into_assignment), true);
        let parent = (
            OsString::from("INJECTOR_TEST_PARENT"),
            OsString::from("parent"),
        );
        assert!(environment.vars().contains(&parent));
        assert_eq!(
            environment.vars().last(),
            Some(&(
                OsString::from("INJECTOR_TEST_PARENT"),
                OsString::from("secret")
            ))
        );
        assert_eq!(
            environment.get("INJECTOR_TEST_PARENT"),
            Some(OsStr::new("secret"))
        );
        unsafe { env::remove_var("INJECTOR_TEST_PARENT") };
    }

    #[test]
    #[serial]
    fn test_parent_environment_kept_byte_for_byte() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"a\xffb");
        unsafe { env::set_var("INJECTOR_TEST_RAW", raw) };

        let environment = ChildEnvironment::build(Vec::new(), true);
        assert_eq!(
            environment.get("INJECTOR_TEST_RAW").map(OsStr::as_bytes),
            Some(&b"a\xffb"[..])
        );

        let code = launch(
            &sh(r#"[ "$INJECTOR_TEST_RAW" = "$(printf 'a\377b')" ]"#),
            &environment,
        )
        .unwrap();
        unsafe { env::remove_var("INJECTOR_TEST_RAW") };
        assert_eq!(code, 0);
    }

    #[test]
    fn test_empty_command_is_noop() {
        let code = launch(&[], &ChildEnvironment::default()).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    #[serial]
    fn test_child_sees_only_injected_environment() {
        unsafe { env::set_var("INJECTOR_TEST_LEAK", "leaked") };
        let mut environment = ChildEnvironment::default();
        environment.push("FOO", "bar");

        let code = launch(
            &sh(r#"[ "$FOO" = bar ] && [ -z "${INJECTOR_TEST_LEAK+x}" ]"#),
            &environment,
        )
        .unwrap();
        assert_eq!(code, 0);
        unsafe { env::remove_var("INJECTOR_TEST_LEAK") };
    }

    #[test]
    #[serial]
    fn test_later_assignment_wins() {
        let mut environment = ChildEnvironment::default();
        environment.push("FOO", "first");
        environment.push("FOO", "second");

        let code = launch(&sh(r#"[ "$FOO" = second ]"#), &environment).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    #[serial]
    fn test_exit_code_is_propagated() {
        let code = launch(&sh("exit 7"), &ChildEnvironment::default()).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    #[serial]
    fn test_signal_exit_code() {
        let code = launch(&sh("kill -TERM $$"), &ChildEnvironment::default()).unwrap();
        assert_eq!(code, 128 + 15);
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_child_runs_in_own_process_group() {
        let mut environment = ChildEnvironment::default();
        environment.push("PATH", env::var("PATH").unwrap_or_default());

        // Field 5 of /proc/<pid>/stat is the process group id.
        let code = launch(
            &sh(r#"[ "$(cut -d' ' -f5 /proc/$$/stat)" = "$$" ]"#),
            &environment,
        )
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    #[serial]
    fn test_program_found_without_child_path() {
        let mut environment = ChildEnvironment::default();
        environment.push("FOO", "bar");
        assert!(environment.get("PATH").is_none());

        let code = launch(&["true".to_string()], &environment).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_spawn_failure() {
        let result = launch(
            &["/nonexistent/injector-test-binary".to_string()],
            &ChildEnvironment::default(),
        );
        match result {
            Err(LaunchError::Spawn { command, .. }) => {
                assert_eq!(command, "/nonexistent/injector-test-binary")
            }
            other => panic!("Expected Spawn error, got {:?}", other),
        }
    }
}
