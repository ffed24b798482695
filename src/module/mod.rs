//! Module discovery and loading.
//!
//! A module is one directory of the dotfiles tree.  [`ModuleLoader::load`]
//! classifies every file directly inside it, validates its settings
//! documents, and produces a read-only [`Module`] whose file actions are
//! sorted by source path with at most one action per destination.
pub mod classify;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::defaults::{DefaultSettingsDocument, Setting};
use crate::config::environments::{DevelopmentEnvironment, DeveloperEnvironmentsDocument};
use crate::config::loader::read_document;
use crate::config::settings::{ActionKind, CoreDocument};
use crate::config::validation::{declared_schema, validate_data};
use crate::error::LoadError;
use crate::platform::Os;
use crate::schema::SchemaKind;
use classify::{FileCategory, LifecycleScript, classify};

/// One concrete filesystem action derived from a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    /// What to do.
    pub kind: ActionKind,
    /// Module file for symlink/copy/script; target-tree path for move/remove.
    pub source: PathBuf,
    /// Target-tree path for symlink/copy/move.
    pub destination: Option<PathBuf>,
    /// Script reverting a script action.
    pub undo: Option<PathBuf>,
    /// Perform through `sudo`.
    pub sudo: bool,
}

impl FileAction {
    /// Every target-tree path this action may create, change or delete.
    pub fn touched_paths(&self) -> impl Iterator<Item = &Path> {
        let source = matches!(self.kind, ActionKind::Move | ActionKind::Remove)
            .then_some(self.source.as_path());
        source.into_iter().chain(self.destination.as_deref())
    }
}

/// Lifecycle scripts present in a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleScripts {
    /// Runs before the file actions on install.
    pub start: Option<PathBuf>,
    /// Runs last on uninstall.
    pub undo_start: Option<PathBuf>,
    /// Runs after the default settings on install.
    pub post: Option<PathBuf>,
    /// Runs first on uninstall.
    pub undo_post: Option<PathBuf>,
}

impl LifecycleScripts {
    /// Path of `script`, if the module has it.
    #[must_use]
    pub fn get(&self, script: LifecycleScript) -> Option<&Path> {
        match script {
            LifecycleScript::Start => self.start.as_deref(),
            LifecycleScript::UndoStart => self.undo_start.as_deref(),
            LifecycleScript::Post => self.post.as_deref(),
            LifecycleScript::UndoPost => self.undo_post.as_deref(),
        }
    }

    fn set(&mut self, script: LifecycleScript, path: PathBuf) {
        let slot = match script {
            LifecycleScript::Start => &mut self.start,
            LifecycleScript::UndoStart => &mut self.undo_start,
            LifecycleScript::Post => &mut self.post,
            LifecycleScript::UndoPost => &mut self.undo_post,
        };
        *slot = Some(path);
    }
}

/// A loaded module.  Read-only once constructed.
#[derive(Debug, Clone)]
pub struct Module {
    /// Directory name, e.g. `vim`.
    pub name: String,
    /// Module directory inside the local clone.
    pub directory: PathBuf,
    /// OS declared by the settings document.
    pub os: Option<Os>,
    /// Lifecycle scripts found by name.
    pub scripts: LifecycleScripts,
    /// Default OS settings, in declaration order.
    pub settings: Vec<Setting>,
    /// Developer environments from the settings and environment documents.
    pub environments: Vec<DevelopmentEnvironment>,
    /// Structured-data files other than the settings document.
    pub config_files: Vec<PathBuf>,
    /// Scripts named by explicit `script` actions.
    pub script_files: Vec<PathBuf>,
    /// `*.symlink` files.
    pub symlink_files: Vec<PathBuf>,
    /// Files copied by convention.
    pub generic_files: Vec<PathBuf>,
    /// File actions, sorted by source path.
    pub actions: Vec<FileAction>,
}

impl Module {
    /// `true` if any enabled setting or any action needs `sudo`.
    #[must_use]
    pub fn is_sudo_used(&self) -> bool {
        self.actions.iter().any(|a| a.sudo)
            || self
                .settings
                .iter()
                .any(|s| s.enabled && s.run_as_sudo)
    }

    /// Every target-tree path this module's actions touch.
    pub fn touched_paths(&self) -> impl Iterator<Item = &Path> {
        self.actions.iter().flat_map(FileAction::touched_paths)
    }
}

/// Builds [`Module`]s whose destinations resolve inside `target`.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    target: PathBuf,
}

impl ModuleLoader {
    #[must_use]
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Target tree destinations resolve against.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Load the module in `directory`.
    ///
    /// Settings documents are validated before anything is constructed.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the directory is missing, a document fails
    /// validation or parsing, an action source is missing, or a destination
    /// escapes the target tree.
    pub fn load(&self, directory: &Path) -> Result<Module, LoadError> {
        if !directory.is_dir() {
            return Err(LoadError::ModuleNotFound(directory.to_path_buf()));
        }
        let name = directory
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

        let mut module = Module {
            name,
            directory: directory.to_path_buf(),
            os: None,
            scripts: LifecycleScripts::default(),
            settings: Vec::new(),
            environments: Vec::new(),
            config_files: Vec::new(),
            script_files: Vec::new(),
            symlink_files: Vec::new(),
            generic_files: Vec::new(),
            actions: Vec::new(),
        };
        let mut settings_document = None;

        for path in sorted_files(directory)? {
            let file_name = path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            match classify(&file_name) {
                FileCategory::Lifecycle(script) => module.scripts.set(script, path),
                FileCategory::Settings => settings_document = Some(path),
                FileCategory::Symlink { .. } => module.symlink_files.push(path),
                FileCategory::Config => module.config_files.push(path),
                FileCategory::Generic => module.generic_files.push(path),
            }
        }

        if let Some(path) = settings_document {
            self.apply_settings_document(&mut module, &path)?;
        }
        collect_environment_documents(&mut module)?;
        self.add_conventional_actions(&mut module);

        module.actions.sort_by(|a, b| a.source.cmp(&b.source));
        module.actions = dedupe_destinations(&module.name, std::mem::take(&mut module.actions));
        Ok(module)
    }

    fn apply_settings_document(&self, module: &mut Module, path: &Path) -> Result<(), LoadError> {
        let document = validated_document(path)?;
        let (_, kind) = declared_schema(&document).map_err(|e| e.in_document(path))?;
        match kind {
            SchemaKind::Core => {
                let core: CoreDocument = typed(path, document)?;
                self.apply_core(module, path, core)
            }
            SchemaKind::DefaultSettings => {
                let doc: DefaultSettingsDocument = typed(path, document)?;
                module.settings = doc.into_settings()?;
                Ok(())
            }
            SchemaKind::DeveloperEnvironments => {
                let doc: DeveloperEnvironmentsDocument = typed(path, document)?;
                module.environments.extend(doc.developer_environments);
                Ok(())
            }
        }
    }

    fn apply_core(
        &self,
        module: &mut Module,
        path: &Path,
        core: CoreDocument,
    ) -> Result<(), LoadError> {
        module.environments.extend(core.environments);

        if let Some(os) = core.os {
            module.os = Os::from_name(&os.name);
            if let Some(file) = os.default_settings_file {
                let defaults_path = module.directory.join(file);
                let document = validated_document(&defaults_path)?;
                let doc: DefaultSettingsDocument = typed(&defaults_path, document)?;
                module.settings = doc.into_settings()?;
                module.config_files.retain(|p| p != &defaults_path);
            }
        }

        for spec in core.actions {
            for (origin, destination) in spec.files.pairs() {
                let action = match spec.action {
                    ActionKind::Symlink | ActionKind::Copy => {
                        let source = module_file(module, spec.action, origin)?;
                        let destination = match destination {
                            Some(d) => self.resolve(d)?,
                            None => self.dotted(&base_name(origin)),
                        };
                        FileAction {
                            kind: spec.action,
                            source,
                            destination: Some(destination),
                            undo: None,
                            sudo: spec.sudo,
                        }
                    }
                    ActionKind::Move => {
                        let Some(destination) = destination else {
                            return Err(LoadError::Parse {
                                path: path.to_path_buf(),
                                message: format!("move of '{origin}' needs a destination"),
                            });
                        };
                        FileAction {
                            kind: ActionKind::Move,
                            source: self.resolve(origin)?,
                            destination: Some(self.resolve(destination)?),
                            undo: None,
                            sudo: spec.sudo,
                        }
                    }
                    ActionKind::Remove => FileAction {
                        kind: ActionKind::Remove,
                        source: self.resolve(origin)?,
                        destination: None,
                        undo: None,
                        sudo: spec.sudo,
                    },
                    ActionKind::Script => {
                        let source = module_file(module, ActionKind::Script, origin)?;
                        let undo = destination
                            .map(|u| module_file(module, ActionKind::Script, u))
                            .transpose()?;
                        module.script_files.push(source.clone());
                        module.script_files.extend(undo.iter().cloned());
                        FileAction {
                            kind: ActionKind::Script,
                            source,
                            destination: None,
                            undo,
                            sudo: spec.sudo,
                        }
                    }
                };
                module.actions.push(action);
            }
        }
        Ok(())
    }

    /// Link every `*.symlink` file and copy every generic file, except those
    /// an explicit action already claims.
    fn add_conventional_actions(&self, module: &mut Module) {
        let claimed: HashSet<PathBuf> = module
            .actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Symlink | ActionKind::Copy | ActionKind::Script))
            .flat_map(|a| std::iter::once(a.source.clone()).chain(a.undo.clone()))
            .collect();
        module.symlink_files.retain(|p| !claimed.contains(p));
        module.generic_files.retain(|p| !claimed.contains(p));

        for path in &module.symlink_files {
            let stem = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .and_then(|n| n.strip_suffix(".symlink").map(str::to_string))
                .unwrap_or_default();
            module.actions.push(FileAction {
                kind: ActionKind::Symlink,
                source: path.clone(),
                destination: Some(self.dotted(&stem)),
                undo: None,
                sudo: false,
            });
        }
        for path in &module.generic_files {
            module.actions.push(FileAction {
                kind: ActionKind::Copy,
                source: path.clone(),
                destination: Some(self.dotted(&base_name(&path.to_string_lossy()))),
                undo: None,
                sudo: false,
            });
        }
    }

    /// `<target>/.<name>`, without doubling a leading dot.
    fn dotted(&self, name: &str) -> PathBuf {
        if name.starts_with('.') {
            self.target.join(name)
        } else {
            self.target.join(format!(".{name}"))
        }
    }

    /// Resolve a target-relative path (`~/` allowed) and reject escapes.
    fn resolve(&self, raw: &str) -> Result<PathBuf, LoadError> {
        let joined = crate::config::expand_home_in(raw, &self.target);
        let joined = if joined.is_absolute() {
            joined
        } else {
            self.target.join(joined)
        };
        let normalized = normalize_lexically(&joined);
        if normalized.starts_with(normalize_lexically(&self.target)) {
            Ok(normalized)
        } else {
            Err(LoadError::DestinationOutsideTarget(raw.to_string()))
        }
    }
}

/// Structured-data files that declare developer environments contribute
/// them to the module.  A file that cannot be parsed is reported and
/// otherwise treated as plain configuration.
fn collect_environment_documents(module: &mut Module) -> Result<(), LoadError> {
    for path in &module.config_files {
        let document = match read_document(path) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("{}: not scanned for developer environments: {e}", module.name);
                continue;
            }
        };
        if !matches!(
            declared_schema(&document),
            Ok((_, SchemaKind::DeveloperEnvironments))
        ) {
            continue;
        }
        validate_data(&document).map_err(|e| e.in_document(path))?;
        let doc: DeveloperEnvironmentsDocument = typed(path, document)?;
        module.environments.extend(doc.developer_environments);
    }
    Ok(())
}

fn validated_document(path: &Path) -> Result<Value, LoadError> {
    let document = read_document(path)?;
    validate_data(&document).map_err(|e| e.in_document(path))?;
    Ok(document)
}

fn typed<T: DeserializeOwned>(path: &Path, document: Value) -> Result<T, LoadError> {
    serde_json::from_value(document).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn module_file(module: &Module, kind: ActionKind, relative: &str) -> Result<PathBuf, LoadError> {
    let path = module.directory.join(relative);
    if path.exists() {
        Ok(path)
    } else {
        Err(LoadError::MissingSource {
            action: kind.to_string(),
            path,
        })
    }
}

fn base_name(relative: &str) -> String {
    Path::new(relative)
        .file_name()
        .map_or_else(|| relative.to_string(), |n| n.to_string_lossy().into_owned())
}

fn sorted_files(directory: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: directory.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Keep the first action for each destination; later ones are dropped with
/// a warning.  `actions` must already be sorted.
fn dedupe_destinations(module: &str, actions: Vec<FileAction>) -> Vec<FileAction> {
    let mut seen = HashSet::new();
    actions
        .into_iter()
        .filter(|action| {
            let Some(dst) = &action.destination else {
                return true;
            };
            if seen.insert(dst.clone()) {
                true
            } else {
                tracing::warn!(
                    "{module}: {} also targets {}, skipped",
                    action.source.display(),
                    dst.display()
                );
                false
            }
        })
        .collect()
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Names of the modules under `root`: immediate subdirectories not starting
/// with `.`, sorted.
///
/// # Errors
///
/// Returns [`LoadError::ModuleNotFound`] if `root` is not a directory, or
/// [`LoadError::Io`] if it cannot be read.
pub fn get_module_names(root: &Path) -> Result<Vec<String>, LoadError> {
    if !root.is_dir() {
        return Err(LoadError::ModuleNotFound(root.to_path_buf()));
    }
    let io_err = |source| LoadError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
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
    use crate::error::ValidationError;

    struct Fixture {
        _dir: tempfile::TempDir,
        module: PathBuf,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("dotfiles").join("vim");
        let home = dir.path().join("home");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::create_dir_all(&home).unwrap();
        Fixture {
            _dir: dir,
            module,
            home,
        }
    }

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn classifies_each_file_once() {
        let f = fixture();
        write(&f.module.join("start"), "#!/bin/sh\n");
        write(&f.module.join("undo-post"), "#!/bin/sh\n");
        write(&f.module.join("vimrc.symlink"), "set nu");
        write(&f.module.join("gitignore"), "*.swp");
        write(&f.module.join("extra.yaml"), "a: 1");

        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        assert_eq!(module.name, "vim");
        assert!(module.scripts.start.is_some());
        assert!(module.scripts.undo_post.is_some());
        assert!(module.scripts.post.is_none());
        assert_eq!(module.symlink_files, [f.module.join("vimrc.symlink")]);
        assert_eq!(module.generic_files, [f.module.join("gitignore")]);
        assert_eq!(module.config_files, [f.module.join("extra.yaml")]);
        assert_eq!(module.actions.len(), 2);
        assert!(!module.is_sudo_used());
    }

    #[test]
    fn conventional_destinations_get_a_single_leading_dot() {
        let f = fixture();
        write(&f.module.join("vimrc.symlink"), "");
        write(&f.module.join(".editorconfig"), "");

        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        let destinations: Vec<_> = module
            .actions
            .iter()
            .map(|a| a.destination.clone().unwrap())
            .collect();
        assert_eq!(
            destinations,
            [f.home.join(".editorconfig"), f.home.join(".vimrc")]
        );
    }

    #[test]
    fn settings_are_validated_before_loading() {
        let f = fixture();
        write(
            &f.module.join("settings.json"),
            r#"{"version": "alpha", "schema": "bogus"}"#,
        );
        let err = ModuleLoader::new(&f.home).load(&f.module).unwrap_err();
        match err {
            LoadError::Validation(v) => assert!(matches!(
                v.root_cause(),
                ValidationError::MissingOrUnsupportedSchema { .. }
            )),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn default_settings_file_is_loaded_and_gated() {
        let f = fixture();
        write(
            &f.module.join("settings.yaml"),
            "version: alpha\nschema: core\nos:\n  name: macos\n  default_settings_file: defaults.yaml\n",
        );
        write(
            &f.module.join("defaults.yaml"),
            "version: alpha\nschema: default_settings\ndefault_settings:\n  - name: dock\n    command: defaults write x\n    sudo: true\n    start: mojave\n",
        );

        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        assert_eq!(module.os, Some(Os::MacOs));
        assert_eq!(module.settings.len(), 1);
        assert!(module.is_sudo_used());
        assert!(module.config_files.is_empty());
    }

    #[test]
    fn explicit_actions_resolve_per_kind() {
        let f = fixture();
        write(&f.module.join("hosts"), "127.0.0.1");
        write(&f.module.join("install.sh"), "#!/bin/sh\n");
        write(&f.module.join("uninstall.sh"), "#!/bin/sh\n");
        write(
            &f.module.join("settings.json"),
            r#"{
                "version": "alpha",
                "schema": "core",
                "actions": [
                    {"action": "copy", "files": {"hosts": "~/.config/hosts"}, "sudo": true},
                    {"action": "move", "files": {".bashrc": "~/.bashrc.orig"}},
                    {"action": "remove", "files": [".bash_history"]},
                    {"action": "script", "files": {"install.sh": "uninstall.sh"}}
                ]
            }"#,
        );

        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        let find = |kind| module.actions.iter().find(|a| a.kind == kind).unwrap();

        let copy = find(ActionKind::Copy);
        assert!(copy.sudo);
        assert_eq!(copy.destination, Some(f.home.join(".config/hosts")));

        let mv = find(ActionKind::Move);
        assert_eq!(mv.source, f.home.join(".bashrc"));
        assert_eq!(mv.destination, Some(f.home.join(".bashrc.orig")));

        assert_eq!(find(ActionKind::Remove).source, f.home.join(".bash_history"));
        assert_eq!(
            find(ActionKind::Script).undo,
            Some(f.module.join("uninstall.sh"))
        );
        assert!(module.is_sudo_used());
        assert_eq!(module.script_files.len(), 2);
    }

    #[test]
    fn escaping_destination_is_rejected() {
        let f = fixture();
        write(&f.module.join("hosts"), "");
        write(
            &f.module.join("settings.json"),
            r#"{"version": "alpha", "schema": "core",
                "actions": [{"action": "copy", "files": {"hosts": "../../etc/hosts"}}]}"#,
        );
        let err = ModuleLoader::new(&f.home).load(&f.module).unwrap_err();
        assert!(matches!(err, LoadError::DestinationOutsideTarget(ref d) if d == "../../etc/hosts"));
    }

    #[test]
    fn missing_action_source_is_rejected() {
        let f = fixture();
        write(
            &f.module.join("settings.json"),
            r#"{"version": "alpha", "schema": "core",
                "actions": [{"action": "symlink", "files": ["nope"]}]}"#,
        );
        assert!(matches!(
            ModuleLoader::new(&f.home).load(&f.module).unwrap_err(),
            LoadError::MissingSource { .. }
        ));
    }

    #[test]
    fn overlapping_destinations_keep_the_first_source() {
        let f = fixture();
        write(&f.module.join("a-vimrc"), "a");
        write(&f.module.join("vimrc.symlink"), "b");
        write(
            &f.module.join("settings.json"),
            r#"{"version": "alpha", "schema": "core",
                "actions": [{"action": "copy", "files": {"a-vimrc": "~/.vimrc"}}]}"#,
        );

        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        let vimrc: Vec<_> = module
            .actions
            .iter()
            .filter(|a| a.destination.as_deref() == Some(f.home.join(".vimrc").as_path()))
            .collect();
        assert_eq!(vimrc.len(), 1);
        assert_eq!(vimrc[0].source, f.module.join("a-vimrc"));
        assert_eq!(vimrc[0].kind, ActionKind::Copy);
    }

    #[test]
    fn environment_documents_are_collected() {
        let f = fixture();
        write(
            &f.module.join("python.yaml"),
            "version: alpha\nschema: developer_environments\ndeveloper_environments:\n  - language: python\n    versions: ['3.12.1']\n",
        );
        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        assert_eq!(module.environments.len(), 1);
        assert_eq!(module.environments[0].language, "python");
    }

    #[test]
    fn unparsable_config_document_is_reported() {
        let (log, _tmp, _guard) = crate::logging::isolated_logger();
        let f = fixture();
        write(
            &f.module.join("python.yaml"),
            "schema: developer_environments\ndeveloper_environments: [\n",
        );
        let module = ModuleLoader::new(&f.home).load(&f.module).unwrap();
        assert!(module.environments.is_empty());

        let contents = std::fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(
            contents.contains("[warn] vim: not scanned for developer environments"),
            "{contents}"
        );
        assert!(contents.contains("python.yaml"), "{contents}");
    }

    #[test]
    fn missing_module_directory() {
        let err = ModuleLoader::new("/tmp")
            .load(Path::new("/nonexistent/module"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ModuleNotFound(_)));
    }

    #[test]
    fn module_names_skip_hidden_directories_and_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zsh", "git", ".git", ".github"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        write(&dir.path().join("README.md"), "");
        assert_eq!(get_module_names(dir.path()).unwrap(), ["git", "zsh"]);
    }

    #[test]
    fn normalize_removes_parent_components() {
        assert_eq!(
            normalize_lexically(Path::new("/home/me/./a/../b")),
            PathBuf::from("/home/me/b")
        );
    }
}
