//! Script resource: run an executable shipped inside a module.
use std::path::PathBuf;

use super::error::ExecutionError;
use super::helpers::fs::is_executable;
use super::privilege::Elevation;
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::exec::Executor;

/// An executable run with the module directory as working directory.
///
/// Scripts carry no idempotency check of their own; each run is expected to
/// be safe to repeat.
#[derive(Clone)]
pub struct ScriptResource<'a> {
    /// Script path.
    pub path: PathBuf,
    /// Working directory for the child.
    pub working_dir: PathBuf,
    executor: &'a dyn Executor,
    elevation: Option<Elevation<'a>>,
}

impl std::fmt::Debug for ScriptResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptResource")
            .field("path", &self.path)
            .field("working_dir", &self.working_dir)
            .field("elevated", &self.elevation.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> ScriptResource<'a> {
    /// Create a new script resource.
    #[must_use]
    pub fn new(path: PathBuf, executor: &'a dyn Executor) -> Self {
        let working_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf);
        Self {
            path,
            working_dir,
            executor,
            elevation: None,
        }
    }

    /// Run the script through `sudo`.
    #[must_use]
    pub const fn elevated(mut self, elevation: Elevation<'a>) -> Self {
        self.elevation = Some(elevation);
        self
    }
}

impl Applicable for ScriptResource<'_> {
    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        if !is_executable(&self.path) {
            return Err(ExecutionError::ScriptNotExecutable {
                path: self.path.clone(),
            });
        }

        let result = if let Some(elevation) = &self.elevation {
            elevation.run_script(&self.path, &self.working_dir)?
        } else {
            let program = self.path.to_string_lossy();
            self.executor
                .run_in_unchecked(&self.working_dir, &program, &[])
                .map_err(|e| ExecutionError::spawn(&program, &e))?
        };

        if !result.success {
            return Err(ExecutionError::ScriptExecutionFailed {
                path: self.path.clone(),
                code: result.code,
                output: result.combined_output(),
            });
        }
        let output = result.combined_output();
        if !output.is_empty() {
            tracing::debug!("{}: {output}", self.path.display());
        }
        Ok(ResourceChange::Applied)
    }
}

impl Resource for ScriptResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        Ok(ResourceState::Missing)
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
    use crate::exec::{ExecResult, SystemExecutor};
    use crate::resources::privilege::{DEFAULT_SCRIPT_TIMEOUT, PrivilegeContext};
    use crate::resources::test_helpers::MockExecutor;

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, name: &str, body: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn refuses_non_executable_script_without_chmod() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "start", "#!/bin/sh\n", 0o644);
        let executor = MockExecutor::ok("");

        let err = ScriptResource::new(path.clone(), &executor)
            .apply()
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ScriptNotExecutable { .. }));
        assert_eq!(executor.call_count(), 0);
        assert!(!is_executable(&path), "mode must be left untouched");
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_module_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "post", "#!/bin/sh\n", 0o755);
        let executor = MockExecutor::ok("done");

        let change = ScriptResource::new(path, &executor).apply().unwrap();
        assert_eq!(change, ResourceChange::Applied);
        assert_eq!(executor.calls()[0].dir.as_deref(), Some(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(
            dir.path(),
            "start",
            "#!/bin/sh\necho starting\necho broken >&2\nexit 3\n",
            0o755,
        );

        let err = ScriptResource::new(path, &SystemExecutor)
            .apply()
            .unwrap_err();
        match err {
            ExecutionError::ScriptExecutionFailed { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "starting\nbroken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn elevated_script_goes_through_sudo() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "start", "#!/bin/sh\n", 0o755);
        let executor = MockExecutor::with_results(vec![ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }]);
        let privilege = PrivilegeContext::new("pw");

        ScriptResource::new(path.clone(), &executor)
            .elevated(Elevation::new(&executor, &privilege))
            .apply()
            .unwrap();
        let calls = executor.calls();
        assert_eq!(calls[0].program, "sudo");
        assert_eq!(calls[0].args[3], path.to_string_lossy());
        assert_eq!(calls[0].dir.as_deref(), Some(dir.path()));
        assert_eq!(calls[0].timeout, Some(DEFAULT_SCRIPT_TIMEOUT));
    }

    #[cfg(unix)]
    #[test]
    fn elevated_non_zero_exit_is_a_script_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_script(dir.path(), "post", "#!/bin/sh\n", 0o755);
        let executor = MockExecutor::with_results(vec![ExecResult {
            stderr: "brew: not found\n".to_string(),
            code: Some(127),
            ..ExecResult::default()
        }]);
        let privilege = PrivilegeContext::new("pw");

        let err = ScriptResource::new(path, &executor)
            .elevated(Elevation::new(&executor, &privilege))
            .apply()
            .unwrap_err();
        match err {
            ExecutionError::ScriptExecutionFailed { code, output, .. } => {
                assert_eq!(code, Some(127));
                assert_eq!(output, "brew: not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn always_pending() {
        let executor = MockExecutor::ok("");
        let resource = ScriptResource::new(PathBuf::from("/m/start"), &executor);
        assert!(resource.needs_change().unwrap());
        assert!(resource.remove().is_err());
    }
}
