//! The per-module settings document (`settings.json` / `settings.yaml`).
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use super::environments::DevelopmentEnvironment;

/// Body of a `core` document.
#[derive(Debug, Default, Deserialize)]
pub struct CoreDocument {
    /// Host OS block.
    #[serde(default)]
    pub os: Option<OsSpec>,
    /// Developer environments declared inline.
    #[serde(default)]
    pub environments: Vec<DevelopmentEnvironment>,
    /// Explicit file actions.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

/// The `os` block of a core document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OsSpec {
    /// OS the module targets (e.g. `macos`).
    pub name: String,
    /// Module-relative path of the default-settings document.
    #[serde(default)]
    pub default_settings_file: Option<String>,
}

/// Kind of an explicit file action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Link a module file into the target tree.
    Symlink,
    /// Copy a module file into the target tree.
    Copy,
    /// Move a file within the target tree.
    Move,
    /// Delete a file from the target tree.
    Remove,
    /// Run a module script.
    Script,
}

impl ActionKind {
    /// Lowercase name as written in documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Remove => "remove",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `actions` list.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    /// What to do.
    pub action: ActionKind,
    /// Which files.
    pub files: ActionFiles,
    /// Perform the action through `sudo`.
    #[serde(default)]
    pub sudo: bool,
}

/// The `files` of an action: bare paths or an origin-to-destination map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ActionFiles {
    /// Paths whose destination is derived by convention.
    List(Vec<String>),
    /// Explicit `origin -> destination` pairs.
    Map(BTreeMap<String, String>),
}

impl ActionFiles {
    /// `(origin, destination)` pairs; list entries have no destination.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, Option<&str>)> {
        match self {
            Self::List(items) => items.iter().map(|s| (s.as_str(), None)).collect(),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| (k.as_str(), Some(v.as_str())))
                .collect(),
        }
    }
}
