//! Command: validate every configuration document in a tree.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::ValidateOpts;
use crate::config::cache::{self, JsonSettingsCache, SettingsStore};
use crate::config::validation::validate_directory;
use crate::logging::Log;

/// Run the validate command.
///
/// # Errors
///
/// Returns an error if the directory is missing or any document is invalid.
pub fn run(opts: &ValidateOpts, log: &dyn Log) -> Result<()> {
    let directory = resolve_directory(opts, &JsonSettingsCache::from_env())?;
    validate(&directory, log)
}

/// `--directory`, else the configured local clone.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read.
pub fn resolve_directory(opts: &ValidateOpts, store: &dyn SettingsStore) -> Result<PathBuf> {
    match &opts.directory {
        Some(dir) => Ok(dir.clone()),
        None => Ok(cache::local_directory(store)?),
    }
}

/// Validate `directory`, logging the outcome.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn validate(directory: &Path, log: &dyn Log) -> Result<()> {
    log.stage(&format!("Validating {}", directory.display()));
    validate_directory(directory)
        .with_context(|| format!("validation failed under {}", directory.display()))?;
    log.info("all documents are valid");
    Ok(())
}
