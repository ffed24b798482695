//! Command: fast-forward the dotfiles repository.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, RepoOpts};
use crate::config::cache::{JsonSettingsCache, SettingsStore};
use crate::git::{ConsoleProgress, Git2Vcs, PullOutcome, Vcs};
use crate::logging::Log;

use super::resolve_repo;

/// Run the update command.
///
/// # Errors
///
/// Returns an error if the pull fails.
pub fn run(global: &GlobalOpts, opts: &RepoOpts, log: &dyn Log) -> Result<()> {
    update(&Git2Vcs, &JsonSettingsCache::from_env(), global, opts, log)
}

/// Pull the effective local clone.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read or the pull fails.
pub fn update(
    vcs: &dyn Vcs,
    store: &dyn SettingsStore,
    global: &GlobalOpts,
    opts: &RepoOpts,
    log: &dyn Log,
) -> Result<()> {
    let (local, _) = resolve_repo(opts, store)?;
    log.stage(&format!("Updating {}", local.display()));
    if global.dry_run {
        log.dry_run("would pull from origin");
        return Ok(());
    }

    let progress = ConsoleProgress::new("Receiving objects");
    let result = vcs.pull(&local, &progress);
    progress.finish();
    match result.with_context(|| format!("failed to update {}", local.display()))? {
        PullOutcome::UpToDate => log.info("already up to date"),
        PullOutcome::Updated => log.info("updated to the latest commit"),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::cache::MockSettingsStore;
    use crate::git::{GitError, MockVcs};
    use crate::logging::Logger;
    use std::path::{Path, PathBuf};

    fn global() -> GlobalOpts {
        GlobalOpts {
            dry_run: false,
            target: None,
            parallel: true,
        }
    }

    fn cached_store() -> MockSettingsStore {
        let mut store = MockSettingsStore::new();
        store.expect_get().returning(|key| {
            Ok((key == crate::config::cache::LOCAL_DIRECTORY_KEY).then(|| "/srv/dots".to_string()))
        });
        store
    }

    #[test]
    fn pulls_cached_local_directory() {
        let mut vcs = MockVcs::new();
        vcs.expect_pull()
            .withf(|local, _| local == Path::new("/srv/dots"))
            .times(1)
            .returning(|_, _| Ok(PullOutcome::Updated));
        update(&vcs, &cached_store(), &global(), &RepoOpts::default(), &Logger::new("test"))
            .unwrap();
    }

    #[test]
    fn local_changes_give_a_friendly_reason() {
        let mut vcs = MockVcs::new();
        vcs.expect_pull().returning(|_, _| Err(GitError::LocalChanges));
        let opts = RepoOpts {
            local_directory: Some(PathBuf::from("/srv/dots")),
            remote_repo: None,
        };
        let mut store = MockSettingsStore::new();
        store.expect_get().returning(|_| Ok(None));
        let err = update(&vcs, &store, &global(), &opts, &Logger::new("test")).unwrap_err();
        insta::assert_snapshot!(format!("{err:#}"), @"failed to update /srv/dots: local changes would be overwritten by the update; commit or stash them first");
    }

    #[test]
    fn missing_clone_is_reported() {
        let mut vcs = MockVcs::new();
        vcs.expect_pull()
            .returning(|local, _| Err(GitError::NotCloned(local.to_path_buf())));
        let err = update(&vcs, &cached_store(), &global(), &RepoOpts::default(), &Logger::new("test"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::NotCloned(_))
        ));
    }
}
