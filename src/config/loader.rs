//! Reading structured-data documents (JSON or YAML) into a common value tree.
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ValidationError;

/// A structured-data format recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl DocumentFormat {
    /// Format implied by the extension of `path`, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Parse `content` in this format.
    ///
    /// # Errors
    ///
    /// Returns the parser message when `content` is not well-formed.
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T, String> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// `true` if `path` has a structured-data extension.
#[must_use]
pub fn is_document(path: &Path) -> bool {
    DocumentFormat::from_path(path).is_some()
}

/// Read and parse a document.
///
/// # Errors
///
/// Returns [`ValidationError::FileNotFound`],
/// [`ValidationError::UnsupportedFileType`] or
/// [`ValidationError::MalformedDocument`].
pub fn read_document(path: &Path) -> Result<Value, ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::FileNotFound(path.to_path_buf()));
    }
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| ValidationError::UnsupportedFileType(path.to_path_buf()))?;
    let content =
        std::fs::read_to_string(path).map_err(|e| ValidationError::MalformedDocument {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    format
        .parse(&content)
        .map_err(|message| ValidationError::MalformedDocument {
            path: path.to_path_buf(),
            message,
        })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("settings.json")),
            Some(DocumentFormat::Json)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/b/defaults.YML")),
            Some(DocumentFormat::Yaml)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("vimrc.symlink")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("start")), None);
    }

    #[test]
    fn yaml_and_json_produce_the_same_tree() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("a.json");
        let yaml = dir.path().join("a.yaml");
        std::fs::write(&json, r#"{"version": "alpha", "n": [1, true]}"#).unwrap();
        std::fs::write(&yaml, "version: alpha\nn:\n  - 1\n  - true\n").unwrap();
        assert_eq!(read_document(&json).unwrap(), read_document(&yaml).unwrap());
    }

    #[test]
    fn missing_file() {
        let err = read_document(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, ValidationError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "a = 1").unwrap();
        assert!(matches!(
            read_document(&path).unwrap_err(),
            ValidationError::UnsupportedFileType(_)
        ));
    }

    #[test]
    fn malformed_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_document(&path).unwrap_err(),
            ValidationError::MalformedDocument { .. }
        ));
    }
}
