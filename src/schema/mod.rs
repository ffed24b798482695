//! Bundled structural schemas, keyed by schema generation and document kind.
//!
//! The registry is built once per process from the JSON files compiled into
//! the binary.  Cross-document references (`"$ref": "./common.json"` or
//! `"./common.json#/definitions/..."`) are inlined before a schema is handed
//! out, so validators never need to resolve anything themselves.
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde_json::Value;
use thiserror::Error;

/// Nesting limit for reference inlining; deeper chains are treated as cycles.
const MAX_REFERENCE_DEPTH: usize = 16;

const ALPHA_SOURCES: &[(&str, &str)] = &[
    ("common.json", include_str!("alpha/common.json")),
    ("core.json", include_str!("alpha/core.json")),
    ("default_settings.json", include_str!("alpha/default_settings.json")),
    (
        "developer_environments.json",
        include_str!("alpha/developer_environments.json"),
    ),
];

static REGISTRY: LazyLock<Result<SchemaRegistry, SchemaError>> =
    LazyLock::new(SchemaRegistry::bundled);

/// Errors raised while building or querying the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No schema is registered for the requested generation and kind.
    #[error("unsupported schema version '{version}' (kind: {kind})")]
    UnsupportedSchemaVersion {
        /// Requested generation tag.
        version: String,
        /// Requested kind, or `any` for the union schema.
        kind: String,
    },

    /// A `$ref` points at a fragment that is not bundled.
    #[error("cannot resolve schema reference '{reference}' in {document}")]
    UnresolvedReference {
        /// The reference as written.
        reference: String,
        /// Document containing the reference.
        document: String,
    },

    /// A bundled schema source is not valid JSON.
    #[error("schema {document} is not valid JSON: {message}")]
    Malformed {
        /// Source file name.
        document: String,
        /// Parser message.
        message: String,
    },
}

/// A schema generation tag, the `version` field of every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// The `alpha` generation.
    Alpha,
}

impl SchemaVersion {
    /// Parse a `version` tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "alpha" => Some(Self::Alpha),
            _ => None,
        }
    }

    /// The tag as written in documents.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The declared purpose of a document, its `schema` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// A module's `settings.json`/`settings.yaml`.
    Core,
    /// A list of default OS settings.
    DefaultSettings,
    /// A list of developer environments.
    DeveloperEnvironments,
}

impl SchemaKind {
    /// Every kind, in registry order.
    pub const ALL: [Self; 3] = [Self::Core, Self::DefaultSettings, Self::DeveloperEnvironments];

    /// Parse a `schema` tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    /// The tag as written in documents.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::DefaultSettings => "default_settings",
            Self::DeveloperEnvironments => "developer_environments",
        }
    }

    const fn file_name(self) -> &'static str {
        match self {
            Self::Core => "core.json",
            Self::DefaultSettings => "default_settings.json",
            Self::DeveloperEnvironments => "developer_environments.json",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Read-only map from `(generation, kind)` to a fully resolved schema.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<(SchemaVersion, SchemaKind), Value>,
    unions: HashMap<SchemaVersion, Value>,
}

impl SchemaRegistry {
    /// The process-wide registry built from the bundled schemas.
    ///
    /// # Errors
    ///
    /// Returns the error encountered while building the bundled registry.
    pub fn global() -> Result<&'static Self, SchemaError> {
        REGISTRY.as_ref().map_err(Clone::clone)
    }

    /// Build a registry from the schemas compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled schema is malformed or references a
    /// fragment that is not bundled.
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_sources(SchemaVersion::Alpha, ALPHA_SOURCES)
    }

    /// Build a registry for one generation from `(file name, JSON)` pairs.
    ///
    /// Kinds whose file is absent are simply not registered.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Malformed`] for unparsable sources and
    /// [`SchemaError::UnresolvedReference`] for dangling references.
    pub fn from_sources(version: SchemaVersion, sources: &[(&str, &str)]) -> Result<Self, SchemaError> {
        let documents = sources
            .iter()
            .map(|(name, text)| {
                serde_json::from_str::<Value>(text)
                    .map(|v| ((*name).to_string(), v))
                    .map_err(|e| SchemaError::Malformed {
                        document: (*name).to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut schemas = HashMap::new();
        let mut variants = Vec::new();
        for kind in SchemaKind::ALL {
            let Some(raw) = documents.get(kind.file_name()) else {
                continue;
            };
            let resolved = inline_references(raw, &documents, kind.file_name(), 0)?;
            variants.push(resolved.clone());
            schemas.insert((version, kind), resolved);
        }

        let mut unions = HashMap::new();
        if !variants.is_empty() {
            unions.insert(version, serde_json::json!({ "oneOf": variants }));
        }
        Ok(Self { schemas, unions })
    }

    /// The schema for `kind`, or the union of every kind when `kind` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnsupportedSchemaVersion`] if nothing is
    /// registered for the pair.
    pub fn get_schema(&self, version: SchemaVersion, kind: Option<SchemaKind>) -> Result<&Value, SchemaError> {
        let found = match kind {
            Some(k) => self.schemas.get(&(version, k)),
            None => self.unions.get(&version),
        };
        found.ok_or_else(|| SchemaError::UnsupportedSchemaVersion {
            version: version.tag().to_string(),
            kind: kind.map_or_else(|| "any".to_string(), |k| k.tag().to_string()),
        })
    }

    /// Like [`get_schema`](Self::get_schema) but keyed by raw tags.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnsupportedSchemaVersion`] for unknown tags.
    pub fn get_schema_by_tag(&self, version: &str, kind: Option<&str>) -> Result<&Value, SchemaError> {
        let unsupported = || SchemaError::UnsupportedSchemaVersion {
            version: version.to_string(),
            kind: kind.unwrap_or("any").to_string(),
        };
        let v = SchemaVersion::from_tag(version).ok_or_else(unsupported)?;
        let k = kind
            .map(|tag| SchemaKind::from_tag(tag).ok_or_else(unsupported))
            .transpose()?;
        self.get_schema(v, k)
    }
}

/// Replace every `./file.json[#/pointer]` reference in `value` with the
/// referenced fragment, recursively.
fn inline_references(
    value: &Value,
    documents: &HashMap<String, Value>,
    document: &str,
    depth: usize,
) -> Result<Value, SchemaError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref")
                && reference.starts_with("./")
            {
                let unresolved = || SchemaError::UnresolvedReference {
                    reference: reference.clone(),
                    document: document.to_string(),
                };
                if depth >= MAX_REFERENCE_DEPTH {
                    return Err(unresolved());
                }
                let (file, pointer) = reference
                    .trim_start_matches("./")
                    .split_once('#')
                    .map_or((reference.trim_start_matches("./"), ""), |(f, p)| (f, p));
                let target = documents
                    .get(file)
                    .and_then(|doc| if pointer.is_empty() { Some(doc) } else { doc.pointer(pointer) })
                    .ok_or_else(unresolved)?;
                return inline_references(target, documents, file, depth + 1);
            }
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                out.insert(key.clone(), inline_references(child, documents, document, depth)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|child| inline_references(child, documents, document, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn contains_reference(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_reference),
            Value::Array(items) => items.iter().any(contains_reference),
            _ => false,
        }
    }

    #[test]
    fn core_schema_declares_version_and_kind() {
        let registry = SchemaRegistry::global().unwrap();
        let schema = registry.get_schema(SchemaVersion::Alpha, Some(SchemaKind::Core)).unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["version"]["enum"][0], "alpha");
        assert_eq!(schema["properties"]["schema"]["enum"][0], "core");
    }

    #[test]
    fn bundled_schemas_have_no_dangling_references() {
        let registry = SchemaRegistry::bundled().unwrap();
        for kind in SchemaKind::ALL {
            let schema = registry.get_schema(SchemaVersion::Alpha, Some(kind)).unwrap();
            assert!(!contains_reference(schema), "{kind} still has a $ref");
        }
        let union = registry.get_schema(SchemaVersion::Alpha, None).unwrap();
        assert!(!contains_reference(union));
    }

    #[test]
    fn common_fragment_is_inlined_into_default_settings() {
        let registry = SchemaRegistry::global().unwrap();
        let schema = registry
            .get_schema(SchemaVersion::Alpha, Some(SchemaKind::DefaultSettings))
            .unwrap();
        assert_eq!(schema["allOf"][0]["title"], "common");
        let start = &schema["allOf"][1]["properties"]["default_settings"]["items"]["properties"]["start"];
        assert!(start["enum"].as_array().unwrap().contains(&Value::from("mojave")));
    }

    #[test]
    fn union_schema_lists_every_kind() {
        let registry = SchemaRegistry::global().unwrap();
        let union = registry.get_schema(SchemaVersion::Alpha, None).unwrap();
        assert_eq!(union["oneOf"].as_array().unwrap().len(), SchemaKind::ALL.len());
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        let registry = SchemaRegistry::global().unwrap();
        for (version, kind) in [("beta", Some("core")), ("alpha", Some("bogus")), ("", None)] {
            let err = registry.get_schema_by_tag(version, kind).unwrap_err();
            assert!(
                matches!(err, SchemaError::UnsupportedSchemaVersion { .. }),
                "{version}/{kind:?}: {err:?}"
            );
        }
        assert!(registry.get_schema_by_tag("alpha", Some("core")).is_ok());
    }

    #[test]
    fn missing_fragment_fails_resolution() {
        let sources = [("core.json", r#"{"properties": {"x": {"$ref": "./common.json"}}}"#)];
        let err = SchemaRegistry::from_sources(SchemaVersion::Alpha, &sources).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedReference {
                reference: "./common.json".to_string(),
                document: "core.json".to_string(),
            }
        );
    }

    #[test]
    fn missing_pointer_fails_resolution() {
        let sources = [
            ("common.json", r#"{"definitions": {}}"#),
            ("core.json", r##"{"$ref": "./common.json#/definitions/nope"}"##),
        ];
        let err = SchemaRegistry::from_sources(SchemaVersion::Alpha, &sources).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference { .. }));
    }

    #[test]
    fn self_reference_is_reported_not_looped() {
        let sources = [("core.json", r#"{"$ref": "./core.json"}"#)];
        let err = SchemaRegistry::from_sources(SchemaVersion::Alpha, &sources).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference { .. }));
    }

    #[test]
    fn absent_kind_is_unsupported() {
        let sources = [("core.json", r#"{"type": "object"}"#)];
        let registry = SchemaRegistry::from_sources(SchemaVersion::Alpha, &sources).unwrap();
        assert!(registry.get_schema(SchemaVersion::Alpha, Some(SchemaKind::Core)).is_ok());
        let err = registry
            .get_schema(SchemaVersion::Alpha, Some(SchemaKind::DefaultSettings))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedSchemaVersion { .. }));
    }

    #[test]
    fn malformed_source_is_reported() {
        let sources = [("core.json", "{not json")];
        let err = SchemaRegistry::from_sources(SchemaVersion::Alpha, &sources).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { ref document, .. } if document == "core.json"));
    }

    #[test]
    fn tags_round_trip() {
        for kind in SchemaKind::ALL {
            assert_eq!(SchemaKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(SchemaVersion::from_tag("alpha"), Some(SchemaVersion::Alpha));
        assert_eq!(SchemaVersion::from_tag("Alpha"), None);
    }
}
