//! Move resource: relocate a file inside the target tree.
use std::path::{Path, PathBuf};

use super::error::ExecutionError;
use super::helpers::fs::{ensure_parent_dir, entry_exists, is_moved};
use super::privilege::Elevation;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A file that should live at `target` instead of `source`.
#[derive(Debug, Clone)]
pub struct MoveResource<'a> {
    /// Original location.
    pub source: PathBuf,
    /// New location.
    pub target: PathBuf,
    elevation: Option<Elevation<'a>>,
}

impl<'a> MoveResource<'a> {
    /// Create a new move resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self {
            source,
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

    fn relocate(&self, from: &Path, to: &Path) -> Result<(), ExecutionError> {
        if entry_exists(to) {
            return Err(ExecutionError::DestinationAlreadyExists {
                destination: to.to_path_buf(),
            });
        }
        if let Some(elevation) = &self.elevation {
            let src = from.to_string_lossy();
            let dst = to.to_string_lossy();
            elevation.run("mv", &[&src, &dst], Some(to))?;
            return Ok(());
        }
        ensure_parent_dir(to)?;
        std::fs::rename(from, to).map_err(|e| ExecutionError::io(from, e))
    }
}

impl Applicable for MoveResource<'_> {
    fn description(&self) -> String {
        format!("{} -> {}", self.source.display(), self.target.display())
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        if is_moved(&self.source, &self.target) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        self.relocate(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }

    /// Move the file back to where it came from.
    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        if is_moved(&self.target, &self.source) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        if !entry_exists(&self.target) {
            return Ok(ResourceChange::Skipped {
                reason: format!("{} does not exist", self.target.display()),
            });
        }
        self.relocate(&self.target, &self.source)?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for MoveResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        if is_moved(&self.source, &self.target) {
            return Ok(ResourceState::Correct);
        }
        match (entry_exists(&self.source), entry_exists(&self.target)) {
            (false, false) => Ok(ResourceState::Invalid {
                reason: format!("neither {} nor {} exists", self.source.display(), self.target.display()),
            }),
            (true, true) => Ok(ResourceState::Incorrect {
                current: "destination already exists".to_string(),
            }),
            _ => Ok(ResourceState::Missing),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn moves_once_and_detects_prior_move() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join(".bashrc");
        let target = dir.path().join("backup").join(".bashrc.orig");
        std::fs::write(&source, "export A=1").unwrap();

        let resource = MoveResource::new(source.clone(), target.clone());
        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
        assert_eq!(resource.apply().unwrap(), ResourceChange::Applied);
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "export A=1");

        assert_eq!(resource.apply().unwrap(), ResourceChange::AlreadyCorrect);
        assert_eq!(resource.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn both_present_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a");
        let target = dir.path().join("b");
        std::fs::write(&source, "a").unwrap();
        std::fs::write(&target, "b").unwrap();

        let resource = MoveResource::new(source, target);
        assert!(matches!(
            resource.apply().unwrap_err(),
            ExecutionError::DestinationAlreadyExists { .. }
        ));
    }

    #[test]
    fn revert_moves_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a");
        let target = dir.path().join("b");
        std::fs::write(&source, "a").unwrap();

        let resource = MoveResource::new(source.clone(), target.clone());
        resource.apply().unwrap();
        assert_eq!(resource.remove().unwrap(), ResourceChange::Applied);
        assert!(source.exists());
        assert!(!target.exists());
        assert_eq!(resource.remove().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn neither_present_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let resource = MoveResource::new(dir.path().join("a"), dir.path().join("b"));
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Invalid { .. }
        ));
    }
}
