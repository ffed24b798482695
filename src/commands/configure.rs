//! Command: persist or show the local directory and remote repository.
use anyhow::Result;

use crate::cli::RepoOpts;
use crate::config::cache::{self, JsonSettingsCache, LOCAL_DIRECTORY_KEY, REMOTE_REPO_KEY, SettingsStore};
use crate::logging::Log;

/// Run the configure command.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read or written.
pub fn run(opts: &RepoOpts, log: &dyn Log) -> Result<()> {
    configure(&JsonSettingsCache::from_env(), opts, log)
}

/// Store the given values; with none given, show the effective ones.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read or written.
pub fn configure(store: &dyn SettingsStore, opts: &RepoOpts, log: &dyn Log) -> Result<()> {
    if opts.local_directory.is_none() && opts.remote_repo.is_none() {
        log.stage("Configuration");
        log.info(&format!(
            "{LOCAL_DIRECTORY_KEY}: {}",
            cache::local_directory(store)?.display()
        ));
        log.info(&format!("{REMOTE_REPO_KEY}: {}", cache::remote_repo(store)?));
        return Ok(());
    }

    log.stage("Saving configuration");
    if let Some(dir) = &opts.local_directory {
        let value = dir.to_string_lossy();
        store.set(LOCAL_DIRECTORY_KEY, &value)?;
        log.info(&format!("{LOCAL_DIRECTORY_KEY} = {value}"));
    }
    if let Some(url) = &opts.remote_repo {
        store.set(REMOTE_REPO_KEY, url)?;
        log.info(&format!("{REMOTE_REPO_KEY} = {url}"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::cache::MockSettingsStore;
    use crate::logging::Logger;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    #[test]
    fn stores_only_given_values() {
        let mut store = MockSettingsStore::new();
        store
            .expect_set()
            .with(eq(REMOTE_REPO_KEY), eq("git@example.com:me/dots.git"))
            .times(1)
            .returning(|_, _| Ok(()));
        let opts = RepoOpts {
            local_directory: None,
            remote_repo: Some("git@example.com:me/dots.git".to_string()),
        };
        configure(&store, &opts, &Logger::new("test")).unwrap();
    }

    #[test]
    fn no_flags_reads_without_writing() {
        let mut store = MockSettingsStore::new();
        store.expect_set().never();
        store.expect_get().times(2).returning(|key| {
            Ok(Some(if key == LOCAL_DIRECTORY_KEY {
                "/srv/dots".to_string()
            } else {
                "https://example.com/dots.git".to_string()
            }))
        });
        configure(&store, &RepoOpts::default(), &Logger::new("test")).unwrap();
    }

    #[test]
    fn round_trips_through_json_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsCache::new(dir.path());
        let opts = RepoOpts {
            local_directory: Some(PathBuf::from("/srv/dots")),
            remote_repo: None,
        };
        configure(&store, &opts, &Logger::new("test")).unwrap();
        assert_eq!(
            cache::local_directory(&store).unwrap(),
            PathBuf::from("/srv/dots")
        );
    }
}
