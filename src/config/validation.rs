//! Schema validation of configuration documents and directory trees.
//!
//! A document selects its schema through its own `version` and `schema`
//! fields; both are checked before any structural validation runs.
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use walkdir::WalkDir;

use super::loader::{is_document, read_document};
use crate::error::{SchemaError, ValidationError};
use crate::schema::{SchemaKind, SchemaRegistry, SchemaVersion};

/// Validate a parsed document against the schema it declares.
///
/// # Errors
///
/// Returns [`ValidationError::MissingOrUnsupportedVersion`] or
/// [`ValidationError::MissingOrUnsupportedSchema`] for a bad header, and
/// [`ValidationError::Structure`] with a JSON pointer to the first offending
/// field otherwise.
pub fn validate_data(document: &Value) -> Result<(), ValidationError> {
    validate_with(SchemaRegistry::global()?, document)
}

/// Like [`validate_data`] against an explicit registry.
///
/// # Errors
///
/// See [`validate_data`].
pub fn validate_with(registry: &SchemaRegistry, document: &Value) -> Result<(), ValidationError> {
    let (version, kind) = declared_schema(document)?;
    let schema = registry.get_schema(version, Some(kind))?;
    let compiled = JSONSchema::compile(schema).map_err(|e| SchemaError::Malformed {
        document: kind.tag().to_string(),
        message: e.to_string(),
    })?;

    if let Err(mut errors) = compiled.validate(document)
        && let Some(first) = errors.next()
    {
        let pointer = first.instance_path.to_string();
        return Err(ValidationError::Structure {
            pointer: if pointer.is_empty() {
                "/".to_string()
            } else {
                pointer
            },
            message: first.to_string(),
        });
    }
    Ok(())
}

/// Read the `version` and `schema` header of a document.
///
/// # Errors
///
/// Returns the header error for a missing or unknown field.
pub fn declared_schema(document: &Value) -> Result<(SchemaVersion, SchemaKind), ValidationError> {
    let field = |name: &str| document.get(name).and_then(Value::as_str);

    let version_tag = field("version");
    let version = version_tag.and_then(SchemaVersion::from_tag).ok_or_else(|| {
        ValidationError::MissingOrUnsupportedVersion {
            found: version_tag.map(str::to_string),
        }
    })?;

    let kind_tag = field("schema");
    let kind = kind_tag.and_then(SchemaKind::from_tag).ok_or_else(|| {
        ValidationError::MissingOrUnsupportedSchema {
            found: kind_tag.map(str::to_string),
        }
    })?;

    Ok((version, kind))
}

/// Parse and validate one file.
///
/// # Errors
///
/// Returns [`ValidationError::FileNotFound`],
/// [`ValidationError::UnsupportedFileType`] or
/// [`ValidationError::MalformedDocument`] before parsing succeeds, and any
/// [`validate_data`] failure wrapped in [`ValidationError::InDocument`].
pub fn validate_file(path: &Path) -> Result<(), ValidationError> {
    let document = read_document(path)?;
    validate_data(&document).map_err(|e| e.in_document(path))
}

/// Validate every structured-data document under `root`, depth first in
/// file-name order, stopping at the first failure.
///
/// `.git` directories are not descended into.  A tree with no documents
/// passes.
///
/// # Errors
///
/// Returns [`ValidationError::DirectoryNotFound`] if `root` is not a
/// directory, otherwise the first [`validate_file`] failure.
pub fn validate_directory(root: &Path) -> Result<(), ValidationError> {
    if !root.is_dir() {
        return Err(ValidationError::DirectoryNotFound(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    let mut checked = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| ValidationError::Walk {
            path: e
                .path()
                .map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_document(entry.path()) {
            tracing::debug!("validating {}", entry.path().display());
            validate_file(entry.path())?;
            checked += 1;
        }
    }
    tracing::debug!("{checked} document(s) valid under {}", root.display());
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_settings(start: &str) -> Value {
        json!({
            "version": "alpha",
            "schema": "default_settings",
            "default_settings": [
                {"name": "x", "command": "echo x", "start": start}
            ]
        })
    }

    #[test]
    fn minimal_default_settings_document_is_valid() {
        let doc = json!({
            "version": "alpha",
            "schema": "default_settings",
            "default_settings": [{"name": "x", "command": "echo x"}]
        });
        validate_data(&doc).unwrap();
    }

    #[test]
    fn bogus_kind_is_rejected() {
        let doc = json!({
            "version": "alpha",
            "schema": "bogus",
            "default_settings": [{"name": "x", "command": "echo x"}]
        });
        let err = validate_data(&doc).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingOrUnsupportedSchema { found: Some(ref f) } if f == "bogus"
        ));
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = validate_data(&json!({"schema": "core"})).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingOrUnsupportedVersion { found: None }
        ));
    }

    #[test]
    fn non_string_version_is_reported_as_missing() {
        let err = validate_data(&json!({"version": 1, "schema": "core"})).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingOrUnsupportedVersion { found: None }
        ));
    }

    #[test]
    fn unknown_release_points_at_the_field() {
        let err = validate_data(&default_settings("kodiak")).unwrap_err();
        match err {
            ValidationError::Structure { pointer, .. } => {
                assert_eq!(pointer, "/default_settings/0/start");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_points_at_the_parent() {
        let doc = json!({
            "version": "alpha",
            "schema": "default_settings",
            "default_settings": [{"name": "x"}]
        });
        match validate_data(&doc).unwrap_err() {
            ValidationError::Structure { pointer, message } => {
                assert_eq!(pointer, "/default_settings/0");
                assert!(message.contains("command"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn core_action_kinds_are_enumerated() {
        let doc = json!({
            "version": "alpha",
            "schema": "core",
            "os": {"name": "macos"},
            "actions": [{"action": "teleport", "files": ["a"]}]
        });
        assert!(matches!(
            validate_data(&doc).unwrap_err(),
            ValidationError::Structure { .. }
        ));
    }

    #[test]
    fn validate_file_wraps_failures_with_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.json");
        std::fs::write(&path, default_settings("kodiak").to_string()).unwrap();

        let err = validate_file(&path).unwrap_err();
        assert!(err.to_string().contains("defaults.json"), "{err}");
        assert!(matches!(err.root_cause(), ValidationError::Structure { .. }));
    }

    #[test]
    fn validate_file_reports_unsupported_type_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.ini");
        std::fs::write(&path, "[x]").unwrap();
        assert!(matches!(
            validate_file(&path).unwrap_err(),
            ValidationError::UnsupportedFileType(_)
        ));
    }

    #[test]
    fn directory_with_core_and_defaults_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("macos");
        std::fs::create_dir(&module).unwrap();
        std::fs::write(
            module.join("settings.json"),
            json!({
                "version": "alpha",
                "schema": "core",
                "os": {"name": "macos", "default_settings_file": "defaults.yaml"}
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            module.join("defaults.yaml"),
            "version: alpha\nschema: default_settings\ndefault_settings:\n  - name: x\n    command: echo x\n    start: sierra\n",
        )
        .unwrap();
        std::fs::write(module.join("vimrc.symlink"), "set nu").unwrap();

        validate_directory(dir.path()).unwrap();

        std::fs::write(
            module.join("defaults.yaml"),
            "version: alpha\nschema: default_settings\ndefault_settings:\n  - name: x\n    command: echo x\n    start: kodiak\n",
        )
        .unwrap();
        let err = validate_directory(dir.path()).unwrap_err();
        assert!(matches!(err.root_cause(), ValidationError::Structure { .. }));
    }

    #[test]
    fn git_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("broken.json"), "{").unwrap();
        validate_directory(dir.path()).unwrap();
    }

    #[test]
    fn empty_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        validate_directory(dir.path()).unwrap();
    }

    #[test]
    fn missing_directory_is_rejected() {
        let err = validate_directory(Path::new("/nonexistent/dotfiles")).unwrap_err();
        assert!(matches!(err, ValidationError::DirectoryNotFound(_)));
    }

    #[test]
    fn first_failure_stops_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{").unwrap();
        std::fs::write(dir.path().join("b.json"), json!({"schema": "core"}).to_string()).unwrap();
        let err = validate_directory(dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedDocument { ref path, .. } if path.ends_with("a.json")));
    }
}
