//! File classification by name, independent of the filesystem.
use std::fmt;

/// Lifecycle hook a script file provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleScript {
    /// `start`: runs before any file action.
    Start,
    /// `undo-start`: runs last on uninstall.
    UndoStart,
    /// `post`: runs after file actions and settings.
    Post,
    /// `undo-post`: runs first on uninstall.
    UndoPost,
}

impl LifecycleScript {
    /// File name of the hook.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::UndoStart => "undo-start",
            Self::Post => "post",
            Self::UndoPost => "undo-post",
        }
    }
}

impl fmt::Display for LifecycleScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// What a file directly under a module directory is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCategory {
    /// A lifecycle script.
    Lifecycle(LifecycleScript),
    /// The module's settings document.
    Settings,
    /// A symlink source; `stem` is the name without `.symlink`.
    Symlink {
        /// Destination base name.
        stem: String,
    },
    /// Any other structured-data document.
    Config,
    /// Everything else: copied into the target tree.
    Generic,
}

const SYMLINK_SUFFIX: &str = ".symlink";

/// Classify a bare file name.  Exactly one category applies.
#[must_use]
pub fn classify(file_name: &str) -> FileCategory {
    let lifecycle = [
        LifecycleScript::Start,
        LifecycleScript::UndoStart,
        LifecycleScript::Post,
        LifecycleScript::UndoPost,
    ];
    if let Some(script) = lifecycle.into_iter().find(|s| s.file_name() == file_name) {
        return FileCategory::Lifecycle(script);
    }

    if matches!(
        file_name,
        "settings.json" | "settings.yaml" | "settings.yml"
    ) {
        return FileCategory::Settings;
    }

    if let Some(stem) = file_name.strip_suffix(SYMLINK_SUFFIX)
        && !stem.is_empty()
    {
        return FileCategory::Symlink {
            stem: stem.to_string(),
        };
    }

    if crate::config::loader::is_document(std::path::Path::new(file_name)) {
        return FileCategory::Config;
    }
    FileCategory::Generic
}
