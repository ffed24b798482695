//! Remove resource: make sure a path in the target tree is gone.
use std::path::PathBuf;

use super::error::ExecutionError;
use super::helpers::fs::is_broken_link;
use super::privilege::Elevation;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A file that must not exist.
///
/// Only regular files (following symlinks) and dangling symlinks are
/// removed; directories are never touched.
#[derive(Debug, Clone)]
pub struct RemoveResource<'a> {
    /// Path to delete.
    pub target: PathBuf,
    elevation: Option<Elevation<'a>>,
}

impl<'a> RemoveResource<'a> {
    /// Create a new remove resource.
    #[must_use]
    pub const fn new(target: PathBuf) -> Self {
        Self {
            target,
            elevation: None,
        }
    }

    /// Perform mutations through `sudo`.
    #[must_use]
    pub const fn elevated(mut self, elevation: Elevation<'a>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    fn present(&self) -> bool {
        self.target.is_file() || is_broken_link(&self.target)
    }
}

impl Applicable for RemoveResource<'_> {
    fn description(&self) -> String {
        self.target.display().to_string()
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        if !self.present() {
            return Ok(ResourceChange::AlreadyCorrect);
        }

        if let Some(elevation) = &self.elevation {
            let dst = self.target.to_string_lossy();
            elevation.run("rm", &[&dst], None)?;
        } else {
            std::fs::remove_file(&self.target).map_err(|e| ExecutionError::io(&self.target, e))?;
        }
        Ok(ResourceChange::Applied)
    }

    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        Ok(ResourceChange::Skipped {
            reason: format!("removal of {} is irreversible", self.target.display()),
        })
    }
}

impl Resource for RemoveResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        if self.present() {
            Ok(ResourceState::Incorrect {
                current: "present".to_string(),
            })
        } else {
            Ok(ResourceState::Correct)
        }
    }
}
