//! `install`: apply every selected module to the target tree.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalOpts, ModuleOpts};
use crate::logging::Logger;
use crate::resources::privilege::PrivilegeContext;
use crate::tasks::Task;
use crate::tasks::module::InstallModule;

use super::{CommandSetup, read_privilege, run_module_tasks};

/// Run the install command.
///
/// # Errors
///
/// Returns an error if the modules cannot be loaded or any module fails to
/// install.
pub fn run(global: &GlobalOpts, opts: &ModuleOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::from_env(global, opts.local_directory.as_deref())?;
    let privilege = read_privilege(opts.password_stdin, std::io::stdin().lock())?;
    install(&setup, global, opts, privilege, log)
}

/// Install the selected modules described by `setup`.
///
/// # Errors
///
/// Returns an error if the modules cannot be loaded or any module fails to
/// install.
pub fn install(
    setup: &CommandSetup,
    global: &GlobalOpts,
    opts: &ModuleOpts,
    privilege: PrivilegeContext,
    log: &Arc<Logger>,
) -> Result<()> {
    log.info(&format!("dotmodules {}", crate::version_string()));
    log.info(&format!("dotfiles: {}", setup.local_directory.display()));
    log.info(&format!("target: {}", setup.target.display()));

    let modules = setup.load_modules(&opts.modules, log.as_ref())?;
    let ctx = setup.context(global, log).with_privilege(privilege);

    let tasks: Vec<Box<dyn Task>> = modules
        .iter()
        .cloned()
        .map(|m| Box::new(InstallModule::new(m)) as Box<dyn Task>)
        .collect();
    run_module_tasks(&tasks, &modules, &ctx, log)
}
