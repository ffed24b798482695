//! Filesystem predicates shared by the file-action resources.
//!
//! Each predicate reflects filesystem truth at the moment it is called; no
//! state is cached between runs.
use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;
use sha2::{Digest as _, Sha256};

use crate::resources::error::ExecutionError;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), ExecutionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExecutionError::io(parent, e))?;
    }
    Ok(())
}

/// `true` if anything, including a dangling symlink, exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// `true` if `dst` is a symlink whose resolved path equals the resolved path
/// of `src`.
#[must_use]
pub fn is_linked(src: &Path, dst: &Path) -> bool {
    let is_link = dst
        .symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink());
    if !is_link {
        return false;
    }
    match (dunce::canonicalize(src), dunce::canonicalize(dst)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `true` if `path` is a symlink whose target does not exist.
#[must_use]
pub fn is_broken_link(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
        && !path.exists()
}

/// `true` if `path` is a regular file (not following symlinks).
#[must_use]
pub fn is_regular_file(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.file_type().is_file())
}

/// `true` if `dst` exists and `src` no longer does.
#[must_use]
pub fn is_moved(src: &Path, dst: &Path) -> bool {
    entry_exists(dst) && !entry_exists(src)
}

/// `true` if `dst` is a regular file with the same size, modification time
/// and content digest as `src`.
///
/// The cheap metadata checks run first; file contents are only read when
/// both size and mtime already match.
///
/// # Errors
///
/// Returns an error if `src` cannot be inspected or either file cannot be
/// read for hashing.
pub fn is_copied(src: &Path, dst: &Path) -> Result<bool, ExecutionError> {
    let Ok(dst_meta) = dst.symlink_metadata() else {
        return Ok(false);
    };
    if !dst_meta.file_type().is_file() {
        return Ok(false);
    }
    let src_meta = fs::metadata(src).map_err(|e| ExecutionError::io(src, e))?;
    if src_meta.len() != dst_meta.len() {
        return Ok(false);
    }
    if FileTime::from_last_modification_time(&src_meta)
        != FileTime::from_last_modification_time(&dst_meta)
    {
        return Ok(false);
    }
    Ok(file_digest(src)? == file_digest(dst)?)
}

/// SHA-256 digest of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn file_digest(path: &Path) -> Result<[u8; 32], ExecutionError> {
    let mut file = fs::File::open(path).map_err(|e| ExecutionError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| ExecutionError::io(path, e))?;
    Ok(hasher.finalize().into())
}

/// Copy `src` to `dst`, preserving permissions and modification time.
///
/// A symlink at `dst` is replaced rather than written through.
///
/// # Errors
///
/// Returns an error if any step of the copy fails.
pub fn copy_preserving_metadata(src: &Path, dst: &Path) -> Result<(), ExecutionError> {
    if dst
        .symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
    {
        fs::remove_file(dst).map_err(|e| ExecutionError::io(dst, e))?;
    }
    fs::copy(src, dst).map_err(|e| ExecutionError::io(dst, e))?;
    let meta = fs::metadata(src).map_err(|e| ExecutionError::io(src, e))?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(|e| ExecutionError::io(dst, e))
}

/// `true` if `path` has any executable permission bit set.
#[cfg(unix)]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// `true` if `path` is a regular file; Windows has no executable bit.
#[cfg(not(unix))]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
