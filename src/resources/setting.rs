//! Default OS setting resource.
//!
//! A setting is gated by the host release before anything runs: a host
//! outside the setting's range yields [`ResourceState::NotApplicable`], which
//! callers report separately from "already in effect".
use super::error::ExecutionError;
use super::privilege::PrivilegeContext;
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::config::defaults::Setting;
use crate::exec::{ExecResult, Executor};
use crate::version::MacVersion;

/// A [`Setting`] bound to the host it is evaluated on.
pub struct SettingResource<'a> {
    setting: &'a Setting,
    executor: &'a dyn Executor,
    privilege: &'a PrivilegeContext,
    host: Option<MacVersion>,
}

impl std::fmt::Debug for SettingResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingResource")
            .field("setting", &self.setting.name)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl<'a> SettingResource<'a> {
    /// Bind `setting` to a host release (`None` when unknown).
    #[must_use]
    pub const fn new(
        setting: &'a Setting,
        executor: &'a dyn Executor,
        privilege: &'a PrivilegeContext,
        host: Option<MacVersion>,
    ) -> Self {
        Self {
            setting,
            executor,
            privilege,
            host,
        }
    }

    fn shell(&self, command: &str) -> Result<ExecResult, ExecutionError> {
        self.executor
            .run_unchecked("sh", &["-c", command])
            .map_err(|e| ExecutionError::spawn("sh", &e))
    }

    fn is_satisfied(&self, check_command: &str) -> Result<(bool, String), ExecutionError> {
        let result = self.shell(check_command)?;
        let observed = result.stdout.trim().to_string();
        let satisfied = match &self.setting.expected_check_state {
            Some(expected) => result.success && observed == expected.trim(),
            None => result.success,
        };
        Ok((satisfied, observed))
    }
}

impl Applicable for SettingResource<'_> {
    fn description(&self) -> String {
        if self.setting.description.is_empty() {
            self.setting.name.clone()
        } else {
            format!("{} ({})", self.setting.name, self.setting.description)
        }
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        let command = self.setting.command.as_str();
        let result = if self.setting.run_as_sudo {
            match self
                .privilege
                .run(self.executor, "sh", &["-c", command], None)
            {
                Ok(result) => result,
                Err(ExecutionError::PrivilegedOperationFailed { code, stderr, .. })
                    if !self.setting.check_output =>
                {
                    ExecResult {
                        stderr,
                        code,
                        ..ExecResult::default()
                    }
                }
                Err(e) => return Err(e),
            }
        } else {
            self.shell(command)?
        };

        if !result.success {
            if self.setting.check_output {
                return Err(ExecutionError::SettingFailed {
                    name: self.setting.name.clone(),
                    code: result.code,
                    output: result.combined_output(),
                });
            }
            tracing::debug!(
                "setting '{}' exited non-zero, ignored: {}",
                self.setting.name,
                result.combined_output()
            );
        }
        Ok(ResourceChange::Applied)
    }
}

impl Resource for SettingResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        if !self.setting.enabled {
            return Ok(ResourceState::Invalid {
                reason: "disabled".to_string(),
            });
        }
        let Some(host) = self.host else {
            return Ok(ResourceState::NotApplicable {
                reason: "host macOS release is unknown".to_string(),
            });
        };
        if !self.setting.range.is_in_range(host) {
            return Ok(ResourceState::NotApplicable {
                reason: format!("{host} is outside {}", self.setting.range),
            });
        }

        let Some(check) = &self.setting.check_command else {
            return Ok(ResourceState::Missing);
        };
        let (satisfied, observed) = self.is_satisfied(check)?;
        if satisfied {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect { current: observed })
        }
    }
}
