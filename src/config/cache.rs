//! Persisted user settings: a flat key-value JSON file.
//!
//! The file lives at `<cache dir>/config.json`, where the cache directory is
//! `$DOTMODULES_CACHE_DIRECTORY` or `~/.dotmodules`.  Reading a missing file
//! yields no values; writing creates the directory.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize as _;
use serde_json::Value;
use thiserror::Error;

use super::{expand_home, home_dir};

/// Environment variable overriding the cache directory.
pub const CACHE_DIRECTORY_ENV: &str = "DOTMODULES_CACHE_DIRECTORY";
/// Environment variable supplying the local clone when none is cached.
pub const LOCAL_DIRECTORY_ENV: &str = "DOTMODULES_LOCAL_DIRECTORY";
/// Environment variable supplying the remote when none is cached.
pub const REMOTE_REPO_ENV: &str = "DOTMODULES_REMOTE_REPO";

/// Cache key of the local clone directory.
pub const LOCAL_DIRECTORY_KEY: &str = "local_directory";
/// Cache key of the remote repository URL.
pub const REMOTE_REPO_KEY: &str = "remote_repo";

/// Starter repository used when nothing else is configured.
pub const DEFAULT_REMOTE_REPO: &str = "https://github.com/JasonYao/pydotfiles-basic.git";

const CACHE_FILE_NAME: &str = "config.json";

/// Errors reading or writing the settings cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache file or directory could not be accessed.
    #[error("settings cache I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The cache file is not a JSON object.
    #[error("settings cache {} is corrupt: {message}", .path.display())]
    Corrupt {
        /// The cache file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Key-value store for persisted settings.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    /// Value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// [`SettingsStore`] backed by `config.json` in a cache directory.
#[derive(Debug, Clone)]
pub struct JsonSettingsCache {
    directory: PathBuf,
}

impl JsonSettingsCache {
    /// Cache stored in `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Cache stored in [`cache_directory`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(cache_directory())
    }

    /// Directory holding the cache file.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Full path of the cache file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(CACHE_FILE_NAME)
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, CacheError> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    fn write_all(&self, values: &BTreeMap<String, Value>) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.directory).map_err(|source| CacheError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let path = self.path();
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut buf,
            serde_json::ser::PrettyFormatter::with_indent(b"    "),
        );
        values
            .serialize(&mut serializer)
            .map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
        std::fs::write(&path, buf).map_err(|source| CacheError::Io { path, source })
    }
}

impl SettingsStore for JsonSettingsCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read_all()?.get(key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&values)
    }
}

/// `$DOTMODULES_CACHE_DIRECTORY`, else `~/.dotmodules`.
#[must_use]
pub fn cache_directory() -> PathBuf {
    std::env::var(CACHE_DIRECTORY_ENV).map_or_else(
        |_| home_dir().join(".dotmodules"),
        |dir| expand_home(&dir),
    )
}

/// Effective local clone directory: cached value, else
/// `$DOTMODULES_LOCAL_DIRECTORY`, else `~/.dotfiles`.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn local_directory(store: &dyn SettingsStore) -> Result<PathBuf, CacheError> {
    let value = resolve(
        store.get(LOCAL_DIRECTORY_KEY)?,
        std::env::var(LOCAL_DIRECTORY_ENV).ok(),
        || home_dir().join(".dotfiles").to_string_lossy().into_owned(),
    );
    Ok(expand_home(&value))
}

/// Effective remote repository: cached value, else `$DOTMODULES_REMOTE_REPO`,
/// else [`DEFAULT_REMOTE_REPO`].
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn remote_repo(store: &dyn SettingsStore) -> Result<String, CacheError> {
    Ok(resolve(
        store.get(REMOTE_REPO_KEY)?,
        std::env::var(REMOTE_REPO_ENV).ok(),
        || DEFAULT_REMOTE_REPO.to_string(),
    ))
}

fn resolve(
    cached: Option<String>,
    env: Option<String>,
    default: impl FnOnce() -> String,
) -> String {
    cached
        .filter(|v| !v.is_empty())
        .or_else(|| env.filter(|v| !v.is_empty()))
        .unwrap_or_else(default)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonSettingsCache::new(dir.path().join("never-created"));
        assert_eq!(cache.get(LOCAL_DIRECTORY_KEY).unwrap(), None);
        assert!(!cache.directory().exists());
    }

    #[test]
    fn set_creates_directory_and_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonSettingsCache::new(dir.path().join("cache"));
        cache.set(REMOTE_REPO_KEY, "git@example.com:me/dots.git").unwrap();
        cache.set(LOCAL_DIRECTORY_KEY, "/home/me/dots").unwrap();

        let written = std::fs::read_to_string(cache.path()).unwrap();
        insta::assert_snapshot!(written, @r#"
        {
            "local_directory": "/home/me/dots",
            "remote_repo": "git@example.com:me/dots.git"
        }
        "#);
        assert_eq!(
            cache.get(LOCAL_DIRECTORY_KEY).unwrap().as_deref(),
            Some("/home/me/dots")
        );
    }

    #[test]
    fn set_replaces_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonSettingsCache::new(dir.path());
        cache.set("k", "one").unwrap();
        cache.set("k", "two").unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE_NAME), "[1, 2").unwrap();
        let cache = JsonSettingsCache::new(dir.path());
        assert!(matches!(
            cache.get("k").unwrap_err(),
            CacheError::Corrupt { .. }
        ));
    }

    #[test]
    fn resolution_prefers_cache_then_env_then_default() {
        assert_eq!(
            resolve(Some("cached".into()), Some("env".into()), || "default".into()),
            "cached"
        );
        assert_eq!(resolve(None, Some("env".into()), || "default".into()), "env");
        assert_eq!(resolve(None, None, || "default".into()), "default");
        assert_eq!(
            resolve(Some(String::new()), None, || "default".into()),
            "default"
        );
    }

    #[test]
    fn remote_repo_uses_cached_value() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get()
            .with(eq(REMOTE_REPO_KEY))
            .times(1)
            .returning(|_| Ok(Some("https://example.com/dots.git".to_string())));
        assert_eq!(remote_repo(&store).unwrap(), "https://example.com/dots.git");
    }

    #[test]
    fn local_directory_propagates_store_errors() {
        let mut store = MockSettingsStore::new();
        store.expect_get().returning(|_| {
            Err(CacheError::Corrupt {
                path: PathBuf::from("config.json"),
                message: "bad".to_string(),
            })
        });
        assert!(local_directory(&store).is_err());
    }
}
