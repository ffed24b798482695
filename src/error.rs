//! Domain-specific error types for the module engine.
//!
//! Library layers return the typed enums below; command handlers at the CLI
//! boundary convert them to [`anyhow::Error`] with `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! DotfilesError
//! ├── Load(LoadError)              module directories and their documents
//! ├── Validation(ValidationError)  schema, version and kind mismatches
//! ├── Version(VersionError)        release names, version strings, ranges
//! ├── Execution(ExecutionError)    applying or reverting file actions
//! ├── Git(GitError)                clone and pull of the dotfiles repository
//! └── Cache(CacheError)            the persisted key-value settings cache
//! ```
use std::path::PathBuf;

use thiserror::Error;

pub use crate::config::cache::CacheError;
pub use crate::git::GitError;
pub use crate::resources::error::ExecutionError;
pub use crate::schema::SchemaError;
use crate::version::MacVersion;

/// Top-level error type for the module engine.
#[derive(Error, Debug)]
pub enum DotfilesError {
    /// A module could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// A configuration document failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A release name, version string or range was rejected.
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// A file action or setting could not be applied.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// The dotfiles repository could not be cloned or updated.
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// The settings cache could not be read or written.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Errors from [`MacVersion`] and [`VersionRange`](crate::version::VersionRange)
/// construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The token names no known release.
    #[error("unknown macOS release name '{0}'")]
    UnknownVersionName(String),

    /// The string is not a dotted version of a known release.
    #[error("unsupported macOS version '{0}'")]
    UnsupportedVersionString(String),

    /// A range bound is not a release name.
    #[error("invalid version range bound '{0}'")]
    InvalidRangeBound(String),

    /// A range whose start comes after its end.
    #[error("version range starts at {start} but ends at {end}")]
    InvertedRange {
        /// Lower bound as given.
        start: MacVersion,
        /// Upper bound as given.
        end: MacVersion,
    },
}

/// Errors raised while validating configuration documents.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The `version` field is missing or names no supported schema generation.
    #[error("missing or unsupported schema version {}", found_label(.found.as_deref()))]
    MissingOrUnsupportedVersion {
        /// The value found, if the field was a string.
        found: Option<String>,
    },

    /// The `schema` field is missing or names no supported kind.
    #[error("missing or unsupported schema kind {}", found_label(.found.as_deref()))]
    MissingOrUnsupportedSchema {
        /// The value found, if the field was a string.
        found: Option<String>,
    },

    /// The document does not match the structure its schema requires.
    #[error("{pointer}: {message}")]
    Structure {
        /// JSON pointer to the offending field (`/` for the document root).
        pointer: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file extension is not a supported structured-data format.
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    /// The file content could not be parsed.
    #[error("malformed document {}: {message}", .path.display())]
    MalformedDocument {
        /// The file that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The directory does not exist or is not a directory.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A directory entry could not be read while walking the tree.
    #[error("failed to walk {}: {message}", .path.display())]
    Walk {
        /// Path being walked.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },

    /// A validation failure inside a specific file.
    #[error("{}: {source}", .path.display())]
    InDocument {
        /// The file that failed validation.
        path: PathBuf,
        /// The failure itself.
        source: Box<Self>,
    },

    /// The schema needed for validation could not be produced.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ValidationError {
    /// Strip any [`InDocument`](Self::InDocument) wrappers and return the
    /// underlying failure.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::InDocument { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Attach the file a failure was found in.
    #[must_use]
    pub fn in_document(self, path: impl Into<PathBuf>) -> Self {
        Self::InDocument {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

fn found_label(found: Option<&str>) -> String {
    found.map_or_else(|| "(missing)".to_string(), |f| format!("'{f}'"))
}

/// Errors raised while loading a module directory.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The module directory does not exist.
    #[error("module directory not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    /// A file or directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A document passed validation but could not be mapped to typed settings.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse {
        /// The document.
        path: PathBuf,
        /// Deserializer message.
        message: String,
    },

    /// A settings document failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A default setting declared an unusable version range.
    #[error("setting '{setting}': {source}")]
    Version {
        /// Name of the offending setting.
        setting: String,
        /// The range error.
        source: VersionError,
    },

    /// A declared action refers to a source that does not exist.
    #[error("{action} source does not exist: {}", .path.display())]
    MissingSource {
        /// Action kind (e.g. `symlink`).
        action: String,
        /// The missing path.
        path: PathBuf,
    },

    /// A destination resolves outside the target tree.
    #[error("destination escapes the target tree: {0}")]
    DestinationOutsideTarget(String),
}
