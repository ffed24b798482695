//! Symlink resource.
use std::path::{Path, PathBuf};

use super::error::ExecutionError;
use super::helpers::fs::{ensure_parent_dir, entry_exists, is_linked};
use super::privilege::Elevation;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A symlink resource that can be checked, applied and reverted.
#[derive(Debug, Clone)]
pub struct SymlinkResource<'a> {
    /// File in the module (what the link points to).
    pub source: PathBuf,
    /// Path in the target tree where the link lives.
    pub target: PathBuf,
    elevation: Option<Elevation<'a>>,
}

impl<'a> SymlinkResource<'a> {
    /// Link `target` to `source`.
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

impl Applicable for SymlinkResource<'_> {
    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        if is_linked(&self.source, &self.target) {
            return Ok(ResourceChange::AlreadyCorrect);
        }

        if let Some(elevation) = &self.elevation {
            let src = self.source.to_string_lossy();
            let dst = self.target.to_string_lossy();
            elevation.run("ln", &["-s", &src, &dst], Some(&self.target))?;
            return Ok(ResourceChange::Applied);
        }

        ensure_parent_dir(&self.target)?;
        if entry_exists(&self.target) {
            return Err(ExecutionError::DestinationAlreadyExists {
                destination: self.target.clone(),
            });
        }
        create_symlink(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }

    /// Remove the link at `target`; the source is never touched.
    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        if !is_linked(&self.source, &self.target) {
            return Ok(ResourceChange::AlreadyCorrect);
        }

        if let Some(elevation) = &self.elevation {
            let dst = self.target.to_string_lossy();
            elevation.run("unlink", &[&dst], None)?;
        } else {
            remove_symlink(&self.target)?;
        }
        Ok(ResourceChange::Applied)
    }
}

impl Resource for SymlinkResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        if !self.source.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }

        if is_linked(&self.source, &self.target) {
            return Ok(ResourceState::Correct);
        }

        match std::fs::read_link(&self.target) {
            Ok(existing) => Ok(ResourceState::Incorrect {
                current: format!("points to {}", existing.display()),
            }),
            Err(_) if entry_exists(&self.target) => Ok(ResourceState::Incorrect {
                current: "target is not a symlink".to_string(),
            }),
            Err(_) => Ok(ResourceState::Missing),
        }
    }
}

/// `ln -s target link`, using the directory flavour on Windows when needed.
fn create_symlink(target: &Path, link: &Path) -> Result<(), ExecutionError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };

    result.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            ExecutionError::DestinationAlreadyExists {
                destination: link.to_path_buf(),
            }
        } else {
            ExecutionError::io(link, e)
        }
    })
}

/// Delete the link itself, never what it points to.
///
/// On Windows, directory symlinks must be removed with `remove_dir`; the raw
/// `FILE_ATTRIBUTE_DIRECTORY` flag tells them apart.
fn remove_symlink(path: &Path) -> Result<(), ExecutionError> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| ExecutionError::io(path, e))?;
    let result = if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| ExecutionError::io(path, e))
}

fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}
