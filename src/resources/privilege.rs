//! Credential handling for operations that must run through `sudo`.
//!
//! The password is held by a [`PrivilegeContext`] value injected by the
//! caller and only ever crosses the process boundary on the stdin of a
//! `sudo -S` child.  It never appears in `Debug` output, error messages or
//! logs.
use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::error::ExecutionError;
use crate::exec::{ExecResult, Executor};

/// How long a privileged file operation or setting may run before it is
/// killed.
///
/// Short on purpose: a wrong password makes `sudo` re-prompt on a pipe that
/// will never answer.
pub const DEFAULT_PRIVILEGE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long an elevated module script may run before it is killed.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Credential and timeouts for privileged subprocesses.
#[derive(Clone)]
pub struct PrivilegeContext {
    password: Option<String>,
    timeout: Duration,
    script_timeout: Duration,
}

impl fmt::Debug for PrivilegeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegeContext")
            .field(
                "password",
                &if self.password.is_some() {
                    "<redacted>"
                } else {
                    "<none>"
                },
            )
            .field("timeout", &self.timeout)
            .field("script_timeout", &self.script_timeout)
            .finish()
    }
}

impl Default for PrivilegeContext {
    fn default() -> Self {
        Self::none()
    }
}

impl PrivilegeContext {
    /// A context holding `password`.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            timeout: DEFAULT_PRIVILEGE_TIMEOUT,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }

    /// A context without a credential; every privileged call fails with
    /// [`ExecutionError::PrivilegeRequired`].
    #[must_use]
    pub const fn none() -> Self {
        Self {
            password: None,
            timeout: DEFAULT_PRIVILEGE_TIMEOUT,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }

    /// Override the communication timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the timeout of elevated scripts.
    #[must_use]
    pub const fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Whether a credential is available.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.password.is_some()
    }

    /// Run `program args...` through `sudo -S`, feeding the password on stdin.
    ///
    /// When `destination` is given and the child reports `File exists`, the
    /// failure surfaces as [`ExecutionError::DestinationAlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::PrivilegeRequired`] without a credential,
    /// [`ExecutionError::Spawn`] when `sudo` is not installed,
    /// [`ExecutionError::PrivilegedOperationTimedOut`] when the child was
    /// killed, and [`ExecutionError::PrivilegedOperationFailed`] for any other
    /// non-zero exit.
    pub fn run(
        &self,
        executor: &dyn Executor,
        program: &str,
        args: &[&str],
        destination: Option<&Path>,
    ) -> Result<ExecResult, ExecutionError> {
        let command = command_line(program, args);
        let result = self.sudo(executor, None, program, args, self.timeout)?;

        if let Some(dst) = destination
            && result.stderr.contains("File exists")
        {
            return Err(ExecutionError::DestinationAlreadyExists {
                destination: dst.to_path_buf(),
            });
        }
        if !result.success {
            return Err(ExecutionError::PrivilegedOperationFailed {
                command,
                code: result.code,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    /// Run `script` through `sudo -S` from `dir`, bounded by the script
    /// timeout.  The exit status is left for the caller to judge.
    ///
    /// # Errors
    ///
    /// The same as [`run`](Self::run), except that a non-zero exit is not
    /// an error.
    pub fn run_script(
        &self,
        executor: &dyn Executor,
        script: &Path,
        dir: &Path,
    ) -> Result<ExecResult, ExecutionError> {
        let program = script.to_string_lossy();
        self.sudo(executor, Some(dir), &program, &[], self.script_timeout)
    }

    fn sudo(
        &self,
        executor: &dyn Executor,
        dir: Option<&Path>,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ExecResult, ExecutionError> {
        let Some(password) = &self.password else {
            return Err(ExecutionError::PrivilegeRequired {
                operation: command_line(program, args),
            });
        };
        if !executor.which("sudo") {
            return Err(ExecutionError::Spawn {
                program: "sudo".to_string(),
                message: "not found on PATH".to_string(),
            });
        }

        let mut sudo_args = vec!["-S", "-p", "", program];
        sudo_args.extend_from_slice(args);
        let result = executor
            .run_with_input(dir, "sudo", &sudo_args, &format!("{password}\n"), timeout)
            .map_err(|e| ExecutionError::spawn("sudo", &e))?;

        if result.timed_out {
            return Err(ExecutionError::PrivilegedOperationTimedOut {
                command: command_line(program, args),
                timeout,
            });
        }
        Ok(result)
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// An executor paired with a credential, handed to resources that were
/// declared with `sudo`.
#[derive(Clone, Copy)]
pub struct Elevation<'a> {
    executor: &'a dyn Executor,
    privilege: &'a PrivilegeContext,
}

impl fmt::Debug for Elevation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elevation")
            .field("privilege", self.privilege)
            .finish_non_exhaustive()
    }
}

impl<'a> Elevation<'a> {
    /// Pair `executor` with `privilege`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor, privilege: &'a PrivilegeContext) -> Self {
        Self {
            executor,
            privilege,
        }
    }

    /// Run `program` through [`PrivilegeContext::run`].
    ///
    /// # Errors
    ///
    /// Propagates the privileged-operation errors of [`PrivilegeContext::run`].
    pub fn run(
        &self,
        program: &str,
        args: &[&str],
        destination: Option<&Path>,
    ) -> Result<ExecResult, ExecutionError> {
        self.privilege
            .run(self.executor, program, args, destination)
    }

    /// Run `script` through [`PrivilegeContext::run_script`].
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`PrivilegeContext::run_script`].
    pub fn run_script(&self, script: &Path, dir: &Path) -> Result<ExecResult, ExecutionError> {
        self.privilege.run_script(self.executor, script, dir)
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::MockExecutor;
    use std::path::PathBuf;

    #[test]
    fn debug_never_shows_password() {
        let ctx = PrivilegeContext::new("hunter2");
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
        assert!(debug.contains("<redacted>"));
        let elevation_debug = format!("{:?}", Elevation::new(&MockExecutor::ok(""), &ctx));
        assert!(!elevation_debug.contains("hunter2"));
    }

    #[test]
    fn missing_credential_is_reported_without_spawning() {
        let executor = MockExecutor::ok("");
        let err = PrivilegeContext::none()
            .run(&executor, "ln", &["-s", "a", "b"], None)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::PrivilegeRequired { ref operation } if operation == "ln -s a b"));
        assert_eq!(executor.call_count(), 0);
    }

    #[test]
    fn missing_sudo_is_reported_without_spawning() {
        let executor = MockExecutor::ok("").with_which(false);
        let err = PrivilegeContext::new("pw")
            .run(&executor, "cp", &["a", "b"], None)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to run 'sudo': not found on PATH");
        assert_eq!(executor.call_count(), 0);
    }

    #[test]
    fn password_is_fed_through_stdin_of_sudo() {
        let executor = MockExecutor::ok("");
        PrivilegeContext::new("pw")
            .run(&executor, "cp", &["-p", "a", "b"], None)
            .unwrap();
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "sudo");
        assert_eq!(calls[0].args, ["-S", "-p", "", "cp", "-p", "a", "b"]);
        assert_eq!(calls[0].input.as_deref(), Some("pw\n"));
        assert!(
            !calls[0].args.iter().any(|a| a.contains("pw")),
            "password must not appear in argv"
        );
    }

    #[test]
    fn file_exists_maps_to_destination_conflict() {
        let executor = MockExecutor::with_results(vec![ExecResult {
            stderr: "ln: /etc/x: File exists".to_string(),
            code: Some(1),
            ..ExecResult::default()
        }]);
        let err = PrivilegeContext::new("pw")
            .run(&executor, "ln", &["-s", "a", "/etc/x"], Some(Path::new("/etc/x")))
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::DestinationAlreadyExists { ref destination } if destination == &PathBuf::from("/etc/x")
        ));
    }

    #[test]
    fn non_zero_exit_is_privileged_failure() {
        let executor = MockExecutor::with_results(vec![ExecResult {
            stderr: "permission denied\n".to_string(),
            code: Some(1),
            ..ExecResult::default()
        }]);
        let err = PrivilegeContext::new("pw")
            .run(&executor, "rm", &["/etc/x"], Some(Path::new("/etc/x")))
            .unwrap_err();
        match err {
            ExecutionError::PrivilegedOperationFailed { command, code, stderr } => {
                assert_eq!(command, "rm /etc/x");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn file_operations_get_the_short_timeout() {
        let executor = MockExecutor::ok("");
        PrivilegeContext::new("pw")
            .run(&executor, "rm", &["/etc/x"], None)
            .unwrap();
        let calls = executor.calls();
        assert_eq!(calls[0].timeout, Some(DEFAULT_PRIVILEGE_TIMEOUT));
        assert_eq!(calls[0].dir, None);
    }

    #[test]
    fn scripts_get_their_own_timeout_and_directory() {
        let executor = MockExecutor::ok("");
        PrivilegeContext::new("pw")
            .run_script(&executor, Path::new("/m/vim/install.sh"), Path::new("/m/vim"))
            .unwrap();
        let calls = executor.calls();
        assert_eq!(calls[0].timeout, Some(DEFAULT_SCRIPT_TIMEOUT));
        assert_eq!(calls[0].dir.as_deref(), Some(Path::new("/m/vim")));
        assert_eq!(calls[0].args, ["-S", "-p", "", "/m/vim/install.sh"]);
    }

    #[test]
    fn failing_script_is_returned_not_mapped() {
        let executor = MockExecutor::with_results(vec![ExecResult {
            stdout: "half done\n".to_string(),
            code: Some(2),
            ..ExecResult::default()
        }]);
        let result = PrivilegeContext::new("pw")
            .run_script(&executor, Path::new("/m/post"), Path::new("/m"))
            .unwrap();
        assert_eq!(result.code, Some(2));
        assert!(!result.success);
    }

    #[test]
    fn script_timeout_is_reported_with_its_own_limit() {
        let executor = MockExecutor::with_results(vec![ExecResult {
            timed_out: true,
            ..ExecResult::default()
        }]);
        let err = PrivilegeContext::new("pw")
            .with_script_timeout(Duration::from_secs(90))
            .run_script(&executor, Path::new("/m/start"), Path::new("/m"))
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::PrivilegedOperationTimedOut { timeout, ref command }
                if timeout == Duration::from_secs(90) && command == "/m/start"
        ));
    }

    #[test]
    fn timeout_is_reported() {
        let executor = MockExecutor::with_results(vec![ExecResult {
            timed_out: true,
            ..ExecResult::default()
        }]);
        let err = PrivilegeContext::new("pw")
            .with_timeout(Duration::from_millis(50))
            .run(&executor, "mv", &["a", "b"], None)
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::PrivilegedOperationTimedOut { timeout, .. } if timeout == Duration::from_millis(50)
        ));
    }
}
