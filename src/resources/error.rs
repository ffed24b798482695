//! Typed error variants for applying and reverting module actions.
//!
//! Resources return [`ExecutionError`] directly; task code converts to
//! [`anyhow::Error`] via `?`.  The same variants are produced whether an
//! operation ran in-process or through `sudo`, so callers cannot tell the
//! privilege tier apart from the error alone.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that arise while checking or performing a file action or setting.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A filesystem check or mutation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being inspected or changed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The destination exists and does not match the requested state.
    #[error("destination already exists: {}", .destination.display())]
    DestinationAlreadyExists {
        /// The conflicting path.
        destination: PathBuf,
    },

    /// A script lacks the executable permission bit.
    #[error("script is not executable: {}", .path.display())]
    ScriptNotExecutable {
        /// The script path.
        path: PathBuf,
    },

    /// A script exited non-zero.
    #[error("script {} failed (exit {}): {output}", .path.display(), exit_label(.code.as_ref()))]
    ScriptExecutionFailed {
        /// The script path.
        path: PathBuf,
        /// Exit code, if the script exited normally.
        code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// A command run through `sudo` exited non-zero.
    #[error("privileged '{command}' failed (exit {}): {stderr}", exit_label(.code.as_ref()))]
    PrivilegedOperationFailed {
        /// The command that was elevated (never includes the credential).
        command: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// A command run through `sudo` did not finish in time and was killed.
    #[error("privileged '{command}' timed out after {}s", .timeout.as_secs_f32())]
    PrivilegedOperationTimedOut {
        /// The command that was elevated.
        command: String,
        /// The communication timeout that elapsed.
        timeout: Duration,
    },

    /// An operation needs `sudo` but no credential was supplied.
    #[error("'{operation}' requires sudo but no password was provided")]
    PrivilegeRequired {
        /// Description of the operation.
        operation: String,
    },

    /// A default setting's command exited non-zero.
    #[error("setting '{name}' failed (exit {}): {output}", exit_label(.code.as_ref()))]
    SettingFailed {
        /// Setting name.
        name: String,
        /// Exit code, if the command exited normally.
        code: Option<i32>,
        /// Combined output.
        output: String,
    },

    /// A subprocess could not be started.
    #[error("failed to run '{program}': {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error chain.
        message: String,
    },

    /// The requested operation is not supported for this resource type.
    #[error("operation '{operation}' is not supported for resource '{resource}'")]
    Unsupported {
        /// Name of the unsupported operation (e.g. `"remove"`).
        operation: String,
        /// Description of the resource.
        resource: String,
    },
}

impl ExecutionError {
    /// Shorthand for [`ExecutionError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`ExecutionError::Spawn`] from an executor failure.
    pub fn spawn(program: &str, err: &anyhow::Error) -> Self {
        Self::Spawn {
            program: program.to_string(),
            message: format!("{err:#}"),
        }
    }
}

fn exit_label(code: Option<&i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
