//! Command: delete the settings cache or the local clone.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::{CleanTarget, GlobalOpts};
use crate::config::cache::{self, JsonSettingsCache, SettingsStore};
use crate::logging::Log;

/// Run the clean command.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed.
pub fn run(global: &GlobalOpts, target: CleanTarget, log: &dyn Log) -> Result<()> {
    let store = JsonSettingsCache::from_env();
    clean(&store, store.directory(), global, target, log)
}

/// Delete the cache directory or the local clone named by `store`.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read, the local
/// directory is not a git clone, or the removal fails.
pub fn clean(
    store: &dyn SettingsStore,
    cache_directory: &Path,
    global: &GlobalOpts,
    target: CleanTarget,
    log: &dyn Log,
) -> Result<()> {
    let directory = match target {
        CleanTarget::Cache => cache_directory.to_path_buf(),
        CleanTarget::Repo => cache::local_directory(store)?,
    };
    log.stage(&format!("Cleaning {}", directory.display()));
    if !directory.exists() {
        log.info("already clean");
        return Ok(());
    }
    if target == CleanTarget::Repo && !directory.join(".git").exists() {
        anyhow::bail!(
            "refusing to delete {}: not a git clone",
            directory.display()
        );
    }
    if global.dry_run {
        log.dry_run(&format!("would delete {}", directory.display()));
        return Ok(());
    }
    std::fs::remove_dir_all(&directory)
        .with_context(|| format!("failed to delete {}", directory.display()))?;
    log.info(&format!("deleted {}", directory.display()));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::cache::MockSettingsStore;
    use crate::logging::Logger;

    fn global(dry_run: bool) -> GlobalOpts {
        GlobalOpts {
            dry_run,
            target: None,
            parallel: true,
        }
    }

    fn store_pointing_at(dir: &Path) -> MockSettingsStore {
        let value = dir.to_string_lossy().into_owned();
        let mut store = MockSettingsStore::new();
        store
            .expect_get()
            .returning(move |_| Ok(Some(value.clone())));
        store
    }

    #[test]
    fn missing_cache_is_already_clean() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let store = MockSettingsStore::new();
        clean(&store, &cache_dir, &global(false), CleanTarget::Cache, &Logger::new("test")).unwrap();
    }

    #[test]
    fn cache_directory_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        std::fs::create_dir(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("config.json"), "{}").unwrap();
        let store = MockSettingsStore::new();
        clean(&store, &cache_dir, &global(false), CleanTarget::Cache, &Logger::new("test")).unwrap();
        assert!(!cache_dir.exists());
    }

    #[test]
    fn repo_without_git_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("dots");
        std::fs::create_dir(&repo).unwrap();
        let err = clean(
            &store_pointing_at(&repo),
            dir.path(),
            &global(false),
            CleanTarget::Repo,
            &Logger::new("test"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a git clone"));
        assert!(repo.exists());
    }

    #[test]
    fn dry_run_keeps_clone() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("dots");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        clean(
            &store_pointing_at(&repo),
            dir.path(),
            &global(true),
            CleanTarget::Repo,
            &Logger::new("test"),
        )
        .unwrap();
        assert!(repo.exists());

        clean(
            &store_pointing_at(&repo),
            dir.path(),
            &global(false),
            CleanTarget::Repo,
            &Logger::new("test"),
        )
        .unwrap();
        assert!(!repo.exists());
    }
}
