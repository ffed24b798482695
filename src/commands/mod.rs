//! Subcommand handlers and the setup `install` and `uninstall` share.
pub mod clean;
pub mod configure;
pub mod download;
pub mod install;
mod scheduler;
pub mod uninstall;
pub mod update;
pub mod validate;
pub mod version;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, RepoOpts};
use crate::config::cache::{self, SettingsStore};
use crate::config::{expand_home, home_dir};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::module::{Module, ModuleLoader, get_module_names};
use crate::platform::Platform;
use crate::resources::privilege::PrivilegeContext;
use crate::tasks::{self, Context, Task};

pub use scheduler::{Overlap, find_overlap};

/// Shared state produced by the common setup of `install` and `uninstall`.
pub struct CommandSetup {
    /// Host the modules are installed on.
    pub platform: Platform,
    /// Local clone holding the modules.
    pub local_directory: PathBuf,
    /// Tree that module destinations resolve into.
    pub target: PathBuf,
    /// Runs every subprocess of the command.
    pub executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for CommandSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSetup")
            .field("platform", &self.platform)
            .field("local_directory", &self.local_directory)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CommandSetup {
    /// Resolve the local clone and target tree, and detect the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cache cannot be read.
    pub fn init(
        global: &GlobalOpts,
        local_override: Option<&Path>,
        store: &dyn SettingsStore,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let local_directory = match local_override {
            Some(dir) => expand_home(&dir.to_string_lossy()),
            None => cache::local_directory(store)?,
        };
        let target = global.target.clone().unwrap_or_else(home_dir);
        let platform = Platform::detect(executor.as_ref());
        Ok(Self {
            platform,
            local_directory,
            target,
            executor,
        })
    }

    /// Setup for the real system.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cache cannot be read.
    pub fn from_env(global: &GlobalOpts, local_override: Option<&Path>) -> Result<Self> {
        Self::init(
            global,
            local_override,
            &cache::JsonSettingsCache::from_env(),
            Arc::new(SystemExecutor),
        )
    }

    /// Task context for this setup.
    #[must_use]
    pub fn context(&self, global: &GlobalOpts, log: &Arc<Logger>) -> Context {
        Context::new(
            self.platform,
            Arc::clone(log) as Arc<dyn Log>,
            global.dry_run,
            self.target.clone(),
            Arc::clone(&self.executor),
            global.parallel,
        )
    }

    /// Load the `selected` modules (all modules when empty), in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if the local clone is missing, a selected module does
    /// not exist, or any module fails to load.
    pub fn load_modules(&self, selected: &[String], log: &dyn Log) -> Result<Vec<Module>> {
        log.stage("Loading modules");
        let names = get_module_names(&self.local_directory).with_context(|| {
            format!(
                "no dotfiles found at {}; run `dotmodules download` first",
                self.local_directory.display()
            )
        })?;
        let names = select_modules(names, selected)?;

        let loader = ModuleLoader::new(&self.target);
        let mut modules = Vec::with_capacity(names.len());
        for name in &names {
            let module = loader
                .load(&self.local_directory.join(name))
                .with_context(|| format!("failed to load module {name}"))?;
            log.debug(&format!(
                "{name}: {} action(s), {} setting(s)",
                module.actions.len(),
                module.settings.len()
            ));
            modules.push(module);
        }
        log.info(&format!("loaded {} module(s)", modules.len()));
        Ok(modules)
    }
}

/// Effective local clone and remote repository: `opts` overrides, else the
/// persisted or default values.
///
/// # Errors
///
/// Returns an error if the settings cache cannot be read.
pub fn resolve_repo(opts: &RepoOpts, store: &dyn SettingsStore) -> Result<(PathBuf, String)> {
    let local = match &opts.local_directory {
        Some(dir) => expand_home(&dir.to_string_lossy()),
        None => cache::local_directory(store)?,
    };
    let remote = match &opts.remote_repo {
        Some(url) => url.clone(),
        None => cache::remote_repo(store)?,
    };
    Ok((local, remote))
}

/// Restrict `available` to `selected`, keeping name order.
fn select_modules(available: Vec<String>, selected: &[String]) -> Result<Vec<String>> {
    if selected.is_empty() {
        return Ok(available);
    }
    let unknown: Vec<&str> = selected
        .iter()
        .filter(|s| !available.contains(*s))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!("unknown module(s): {}", unknown.join(", "));
    }
    Ok(available
        .into_iter()
        .filter(|name| selected.contains(name))
        .collect())
}

/// Read the sudo password from the first line of `input` when requested.
///
/// # Errors
///
/// Returns an error if `input` cannot be read or is empty.
pub fn read_privilege(password_stdin: bool, mut input: impl BufRead) -> Result<PrivilegeContext> {
    if !password_stdin {
        return Ok(PrivilegeContext::none());
    }
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("--password-stdin given but stdin was empty");
    }
    Ok(PrivilegeContext::new(password))
}

/// Run one task per module, in parallel when allowed and safe, then print
/// the summary.
///
/// # Errors
///
/// Returns an error if one or more tasks recorded a failure.
pub fn run_module_tasks(
    tasks: &[Box<dyn Task>],
    modules: &[Module],
    ctx: &Context,
    log: &Arc<Logger>,
) -> Result<()> {
    let refs: Vec<&dyn Task> = tasks.iter().map(AsRef::as_ref).collect();
    let parallel = ctx.parallel && refs.len() > 1;
    match find_overlap(modules) {
        Some(overlap) if parallel => {
            log.info(&format!(
                "{} and {} both touch {}; running modules one at a time",
                overlap.first,
                overlap.second,
                overlap.path.display()
            ));
            run_tasks_to_completion(refs, ctx, log)
        }
        None if parallel => {
            scheduler::run_tasks_parallel(&refs, ctx, log);
            finish(log)
        }
        _ => run_tasks_to_completion(refs, ctx, log),
    }
}

/// Execute every task in order, print the summary, and bail if any task failed.
///
/// # Errors
///
/// Returns an error if one or more tasks recorded a failure.
pub fn run_tasks_to_completion<'a>(
    tasks: impl IntoIterator<Item = &'a dyn Task>,
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    for task in tasks {
        tasks::execute(task, ctx);
    }
    finish(log)
}

fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} task(s) failed");
    }
    Ok(())
}
