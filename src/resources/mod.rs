//! The file actions and settings a module applies, each a check followed
//! by an apply.
//!
//! Every resource re-reads the filesystem (or asks the host) for its state
//! on each call; nothing is remembered between runs.  A run interrupted
//! halfway is resumed by running it again.
pub mod copy;
pub mod error;
pub mod move_file;
pub mod privilege;
pub mod remove;
pub mod script;
pub mod setting;
pub mod symlink;

/// Filesystem predicates shared by the file-action resources.
pub mod helpers {
    pub mod fs;
}

use error::ExecutionError;

/// Something a module can apply, and possibly revert on uninstall.
pub trait Applicable {
    /// Short description used in log lines, e.g. `~/.vimrc -> vim/vimrc`.
    fn description(&self) -> String;

    /// Bring the resource into its desired state.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, a conflicting destination, a failing
    /// subprocess, or a privileged operation without a credential.
    fn apply(&self) -> Result<ResourceChange, ExecutionError>;

    /// Undo [`apply`](Self::apply).
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Unsupported`] unless the resource overrides
    /// this, and otherwise the same errors as `apply`.
    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        Err(ExecutionError::Unsupported {
            operation: "remove".to_string(),
            resource: self.description(),
        })
    }
}

/// What the idempotency check found.
///
/// # Examples
///
/// ```
/// use dotmodules::resources::ResourceState;
///
/// let linked = ResourceState::Correct;
/// let stale = ResourceState::Incorrect { current: "points to /old/vimrc".into() };
/// let gated = ResourceState::NotApplicable { reason: "requires mojave".into() };
///
/// assert_ne!(linked, stale);
/// assert_ne!(gated, ResourceState::Invalid { reason: "requires mojave".into() });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing at the destination yet.
    Missing,
    /// Already in the desired state; applying would be a no-op.
    Correct,
    /// Something else is in the way.
    Incorrect {
        /// What is there instead, for the log line.
        current: String,
    },
    /// Cannot be applied at all, e.g. its source disappeared.
    Invalid { reason: String },
    /// Excluded on this host, e.g. the macOS release is out of range.
    NotApplicable { reason: String },
}

/// What `apply` or `remove` did.
///
/// # Examples
///
/// ```
/// use dotmodules::resources::ResourceChange;
///
/// let skipped = ResourceChange::Skipped { reason: "removal cannot be undone".into() };
/// assert_ne!(ResourceChange::Applied, ResourceChange::AlreadyCorrect);
/// assert!(matches!(skipped, ResourceChange::Skipped { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// The filesystem or host was changed.
    Applied,
    /// Nothing to do; the check already passed.
    AlreadyCorrect,
    /// Deliberately left alone.
    Skipped { reason: String },
}

/// An [`Applicable`] with an idempotency check.
///
/// The processing loop asks for [`current_state`](Self::current_state)
/// first and only calls `apply` when [`needs_change`](Self::needs_change)
/// says so, which is what makes a second install a no-op.
pub trait Resource: Applicable {
    /// Inspect the live state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read, e.g. a metadata call
    /// fails or a check command cannot be spawned.
    fn current_state(&self) -> Result<ResourceState, ExecutionError>;

    /// `true` for [`ResourceState::Missing`] and
    /// [`ResourceState::Incorrect`] only.
    ///
    /// # Errors
    ///
    /// Propagates errors from `current_state()`.
    fn needs_change(&self) -> Result<bool, ExecutionError> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Missing | ResourceState::Incorrect { .. }
        ))
    }
}

/// Scripted stand-in for the real [`Executor`](crate::exec::Executor).
#[cfg(test)]
pub mod test_helpers {
    use crate::exec::{ExecResult, Executor};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// One command the code under test tried to run.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        pub program: String,
        pub args: Vec<String>,
        /// Working directory, for `run_in_unchecked` and `run_with_input`.
        pub dir: Option<PathBuf>,
        /// What was written to stdin, for `run_with_input`.
        pub input: Option<String>,
        /// Kill deadline, for `run_with_input`.
        pub timeout: Option<Duration>,
    }

    /// Replays canned [`ExecResult`]s in order and records every call.
    ///
    /// Once the queue is empty each call gets a failed result with stderr
    /// `"unexpected call"`.  Every program is reported as installed unless
    /// [`with_which`](Self::with_which) says otherwise.
    #[derive(Debug)]
    pub struct MockExecutor {
        results: Mutex<VecDeque<ExecResult>>,
        calls: Mutex<Vec<Call>>,
        installed: bool,
    }

    impl MockExecutor {
        /// One successful call printing `stdout`.
        #[must_use]
        pub fn ok(stdout: &str) -> Self {
            Self::with_results(vec![ExecResult {
                stdout: stdout.to_string(),
                success: true,
                code: Some(0),
                ..ExecResult::default()
            }])
        }

        /// One call exiting with status 1.
        #[must_use]
        pub fn fail() -> Self {
            Self::with_results(vec![failed("")])
        }

        #[must_use]
        pub fn with_results(results: Vec<ExecResult>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
                installed: true,
            }
        }

        /// Answer every [`Executor::which`] lookup with `installed`.
        #[must_use]
        pub const fn with_which(mut self, installed: bool) -> Self {
            self.installed = installed;
            self
        }

        #[must_use]
        pub fn call_count(&self) -> usize {
            self.calls().len()
        }

        #[must_use]
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        fn answer(&self, call: Call) -> ExecResult {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
            self.results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| failed("unexpected call"))
        }
    }

    fn failed(stderr: &str) -> ExecResult {
        ExecResult {
            stderr: stderr.to_string(),
            code: Some(1),
            ..ExecResult::default()
        }
    }

    fn call(program: &str, args: &[&str]) -> Call {
        Call {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            dir: None,
            input: None,
            timeout: None,
        }
    }

    impl Executor for MockExecutor {
        fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            let result = self.answer(call(program, args));
            anyhow::ensure!(result.success, "{program} exited with {:?}", result.code);
            Ok(result)
        }

        fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            Ok(self.answer(call(program, args)))
        }

        fn run_in_unchecked(
            &self,
            dir: &Path,
            program: &str,
            args: &[&str],
        ) -> anyhow::Result<ExecResult> {
            Ok(self.answer(Call {
                dir: Some(dir.to_path_buf()),
                ..call(program, args)
            }))
        }

        fn run_with_input(
            &self,
            dir: Option<&Path>,
            program: &str,
            args: &[&str],
            input: &str,
            timeout: Duration,
        ) -> anyhow::Result<ExecResult> {
            Ok(self.answer(Call {
                dir: dir.map(Path::to_path_buf),
                input: Some(input.to_string()),
                timeout: Some(timeout),
                ..call(program, args)
            }))
        }

        fn which(&self, _: &str) -> bool {
            self.installed
        }
    }
}
