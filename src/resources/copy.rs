//! Copy resource.
use std::path::PathBuf;

use super::error::ExecutionError;
use super::helpers::fs::{copy_preserving_metadata, ensure_parent_dir, entry_exists, is_copied};
use super::privilege::Elevation;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A file copied from a module into the target tree, metadata preserved.
#[derive(Debug, Clone)]
pub struct CopyResource<'a> {
    /// File inside the module.
    pub source: PathBuf,
    /// Where the copy lives.
    pub target: PathBuf,
    elevation: Option<Elevation<'a>>,
}

impl<'a> CopyResource<'a> {
    /// Create a new copy resource.
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
}

impl Applicable for CopyResource<'_> {
    fn description(&self) -> String {
        format!("{} (copy of {})", self.target.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        if is_copied(&self.source, &self.target)? {
            return Ok(ResourceChange::AlreadyCorrect);
        }

        if let Some(elevation) = &self.elevation {
            let src = self.source.to_string_lossy();
            let dst = self.target.to_string_lossy();
            elevation.run("cp", &["-p", &src, &dst], None)?;
        } else {
            ensure_parent_dir(&self.target)?;
            copy_preserving_metadata(&self.source, &self.target)?;
        }
        Ok(ResourceChange::Applied)
    }

    /// Delete the copy, but only while it is still identical to the source;
    /// an edited copy is left for the user.
    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        if !entry_exists(&self.target) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        if !is_copied(&self.source, &self.target)? {
            return Ok(ResourceChange::Skipped {
                reason: "modified since install".to_string(),
            });
        }

        if let Some(elevation) = &self.elevation {
            let dst = self.target.to_string_lossy();
            elevation.run("rm", &[&dst], None)?;
        } else {
            std::fs::remove_file(&self.target).map_err(|e| ExecutionError::io(&self.target, e))?;
        }
        Ok(ResourceChange::Applied)
    }
}

impl Resource for CopyResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        if !self.source.is_file() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }
        if is_copied(&self.source, &self.target)? {
            Ok(ResourceState::Correct)
        } else if entry_exists(&self.target) {
            Ok(ResourceState::Incorrect {
                current: "differs from source".to_string(),
            })
        } else {
            Ok(ResourceState::Missing)
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::resources::privilege::PrivilegeContext;
    use crate::resources::test_helpers::MockExecutor;
    use filetime::FileTime;

    fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("module").join("gitconfig");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, vec![b'x'; 100]).unwrap();
        let target = dir.path().join("home").join(".gitconfig");
        (dir, source, target)
    }

    #[test]
    fn copies_missing_destination_then_short_circuits() {
        let (_dir, source, target) = fixture();
        let resource = CopyResource::new(source, target.clone());

        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
        assert_eq!(resource.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(std::fs::read(&target).unwrap().len(), 100);

        let mtime_before =
            FileTime::from_last_modification_time(&std::fs::metadata(&target).unwrap());
        assert_eq!(resource.apply().unwrap(), ResourceChange::AlreadyCorrect);
        let mtime_after =
            FileTime::from_last_modification_time(&std::fs::metadata(&target).unwrap());
        assert_eq!(mtime_before, mtime_after);
        assert_eq!(resource.current_state().unwrap(), ResourceState::Correct);
    }

    #[test]
    fn overwrites_a_differing_destination() {
        let (_dir, source, target) = fixture();
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "stale").unwrap();

        let resource = CopyResource::new(source.clone(), target.clone());
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Incorrect { .. }
        ));
        resource.apply().unwrap();
        assert_eq!(
            std::fs::read(&target).unwrap(),
            std::fs::read(&source).unwrap()
        );
    }

    #[test]
    fn remove_deletes_only_identical_copies() {
        let (_dir, source, target) = fixture();
        let resource = CopyResource::new(source.clone(), target.clone());
        resource.apply().unwrap();
        assert_eq!(resource.remove().unwrap(), ResourceChange::Applied);
        assert!(!target.exists());
        assert!(source.exists());

        assert_eq!(resource.remove().unwrap(), ResourceChange::AlreadyCorrect);

        std::fs::write(&target, "edited by user").unwrap();
        assert_eq!(
            resource.remove().unwrap(),
            ResourceChange::Skipped {
                reason: "modified since install".to_string()
            }
        );
        assert!(target.exists());
    }

    #[test]
    fn missing_source_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let resource = CopyResource::new(dir.path().join("nope"), dir.path().join("dst"));
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Invalid { .. }
        ));
    }

    #[test]
    fn elevated_copy_preserves_metadata_flag() {
        let (_dir, source, target) = fixture();
        let executor = MockExecutor::ok("");
        let privilege = PrivilegeContext::new("pw");
        let resource =
            CopyResource::new(source, target).elevated(Elevation::new(&executor, &privilege));

        resource.apply().unwrap();
        let calls = executor.calls();
        assert_eq!(calls[0].args[3], "cp");
        assert_eq!(calls[0].args[4], "-p");
    }
}
