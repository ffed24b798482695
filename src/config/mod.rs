//! Configuration documents, their validation, and persisted user settings.
pub mod cache;
pub mod defaults;
pub mod environments;
pub mod loader;
pub mod settings;
pub mod validation;

use std::path::{Path, PathBuf};

/// The user's home directory (`$HOME`, else `%USERPROFILE%`, else `.`).
#[must_use]
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
}

/// Replace a leading `~` or `~/` with [`home_dir`].
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    expand_home_in(path, &home_dir())
}

/// Replace a leading `~` or `~/` with `home`.
#[must_use]
pub fn expand_home_in(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    path.strip_prefix("~/")
        .map_or_else(|| PathBuf::from(path), |rest| home.join(rest))
}
