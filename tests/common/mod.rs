// Shared helpers for integration tests.
//
// Provides a temporary dotfiles tree, target tree and settings cache, plus a
// fluent builder for populating modules, so each integration test runs in an
// isolated environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotmodules::cli::{GlobalOpts, ModuleOpts};
use dotmodules::commands::{self, CommandSetup};
use dotmodules::config::cache::JsonSettingsCache;
use dotmodules::exec::SystemExecutor;
use dotmodules::logging::Logger;
use dotmodules::resources::privilege::PrivilegeContext;

/// An isolated dotfiles tree and target tree backed by
/// [`tempfile::TempDir`]s, deleted when dropped.
pub struct IntegrationTestContext {
    /// Directory of modules, standing in for the local clone.
    pub dotfiles: tempfile::TempDir,
    /// Target tree, standing in for `$HOME`.
    pub home: tempfile::TempDir,
    /// Settings cache directory.
    pub cache: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a context with empty trees.
    pub fn new() -> Self {
        Self {
            dotfiles: tempfile::tempdir().expect("create dotfiles dir"),
            home: tempfile::tempdir().expect("create home dir"),
            cache: tempfile::tempdir().expect("create cache dir"),
        }
    }

    pub fn dotfiles_path(&self) -> &Path {
        self.dotfiles.path()
    }

    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// `<home>/<relative>`.
    pub fn home_file(&self, relative: &str) -> PathBuf {
        self.home.path().join(relative)
    }

    /// `<dotfiles>/<module>/<name>`.
    pub fn module_file(&self, module: &str, name: &str) -> PathBuf {
        self.dotfiles.path().join(module).join(name)
    }

    /// Global options targeting this context's home tree.
    pub fn global(&self, dry_run: bool, parallel: bool) -> GlobalOpts {
        GlobalOpts {
            dry_run,
            target: Some(self.home.path().to_path_buf()),
            parallel,
        }
    }

    /// Command setup for the real system, reading modules from this
    /// context's dotfiles tree.
    pub fn setup(&self, global: &GlobalOpts) -> CommandSetup {
        CommandSetup::init(
            global,
            Some(self.dotfiles.path()),
            &JsonSettingsCache::new(self.cache.path()),
            Arc::new(SystemExecutor),
        )
        .expect("command setup")
    }

    /// Run `install` for `modules` (all when empty).
    pub fn install(&self, modules: &[&str], global: &GlobalOpts) -> anyhow::Result<Arc<Logger>> {
        let log = Arc::new(Logger::new("test"));
        commands::install::install(
            &self.setup(global),
            global,
            &module_opts(modules),
            PrivilegeContext::none(),
            &log,
        )?;
        Ok(log)
    }

    /// Run `uninstall` for `modules` (all when empty).
    pub fn uninstall(&self, modules: &[&str], global: &GlobalOpts) -> anyhow::Result<Arc<Logger>> {
        let log = Arc::new(Logger::new("test"));
        commands::uninstall::uninstall(
            &self.setup(global),
            global,
            &module_opts(modules),
            PrivilegeContext::none(),
            &log,
        )?;
        Ok(log)
    }
}

fn module_opts(modules: &[&str]) -> ModuleOpts {
    ModuleOpts {
        modules: modules.iter().map(ToString::to_string).collect(),
        password_stdin: false,
        local_directory: None,
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Write `content` to `<dotfiles>/<module>/<name>`.
    pub fn with_module_file(self, module: &str, name: &str, content: &str) -> Self {
        let path = self.ctx.module_file(module, name);
        std::fs::create_dir_all(path.parent().expect("module dir")).expect("create module dir");
        std::fs::write(&path, content).expect("write module file");
        self
    }

    /// Write the module's `settings.json`.
    pub fn with_settings(self, module: &str, json: &str) -> Self {
        self.with_module_file(module, "settings.json", json)
    }

    /// Write an executable shell script into a module.
    #[cfg(unix)]
    pub fn with_script(self, module: &str, name: &str, body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt as _;
        let this = self.with_module_file(module, name, &format!("#!/bin/sh\n{body}\n"));
        let path = this.ctx.module_file(module, name);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make script executable");
        this
    }

    /// Write `content` to `<home>/<relative>`.
    pub fn with_home_file(self, relative: &str, content: &str) -> Self {
        let path = self.ctx.home_file(relative);
        std::fs::create_dir_all(path.parent().expect("home parent")).expect("create home parent");
        std::fs::write(&path, content).expect("write home file");
        self
    }

    /// Path of the home tree, for embedding in scripts before `build`.
    pub fn home_path(&self) -> &Path {
        self.ctx.home_path()
    }

    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}
