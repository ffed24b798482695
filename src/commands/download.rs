//! Command: clone the dotfiles repository.
use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, RepoOpts};
use crate::config::cache::{JsonSettingsCache, SettingsStore};
use crate::git::{ConsoleProgress, Git2Vcs, GitError, Vcs};
use crate::logging::Log;

use super::resolve_repo;

/// Run the download command.
///
/// # Errors
///
/// Returns an error if the clone fails.
pub fn run(global: &GlobalOpts, opts: &RepoOpts, log: &dyn Log) -> Result<()> {
    download(&Git2Vcs, &JsonSettingsCache::from_env(), global, opts, log)
}

/// Clone the effective remote into the effective local directory.  An
/// existing clone is left alone.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read or the clone fails.
pub fn download(
    vcs: &dyn Vcs,
    store: &dyn SettingsStore,
    global: &GlobalOpts,
    opts: &RepoOpts,
    log: &dyn Log,
) -> Result<()> {
    let (local, remote) = resolve_repo(opts, store)?;
    log.stage(&format!("Downloading {remote}"));
    if global.dry_run {
        log.dry_run(&format!("would clone into {}", local.display()));
        return Ok(());
    }

    let progress = ConsoleProgress::new("Receiving objects");
    let result = vcs.clone_repo(&remote, &local, &progress);
    progress.finish();
    match result {
        Ok(()) => {
            log.info(&format!("cloned into {}", local.display()));
            Ok(())
        }
        Err(GitError::AlreadyCloned(path)) => {
            log.info(&format!(
                "{} is already cloned; use `dotmodules update` to pull changes",
                path.display()
            ));
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to clone {remote}")),
    }
}
