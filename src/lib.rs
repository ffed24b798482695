//! Module-based dotfiles engine.
//!
//! A dotfiles repository is a directory of modules.  Each module is a
//! directory whose files are classified by name into lifecycle scripts,
//! symlinks, copies and structured settings documents, optionally extended
//! by explicit actions declared in `settings.json`/`settings.yaml`.
//! Documents are validated against bundled JSON schemas before anything is
//! built from them, and every action is idempotent so a run can be repeated
//! to resume after a failure.
//!
//! The public API is organised into layers:
//!
//! - **[`schema`]** and **[`config`]**: schema registry, validation, typed
//!   settings and the persisted settings cache
//! - **[`module`]**: file classification and module loading
//! - **[`resources`]**: idempotent `check + apply + revert` primitives
//! - **[`tasks`]**: per-module install and uninstall orchestration
//! - **[`commands`]**: top-level subcommands
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod logging;
pub mod module;
pub mod platform;
pub mod resources;
pub mod schema;
pub mod tasks;
pub mod version;

/// Build version: `DOTMODULES_VERSION` from the build script, else the
/// package version.
#[must_use]
pub fn version_string() -> &'static str {
    option_env!("DOTMODULES_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}
