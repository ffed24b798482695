//! `uninstall`: revert selected modules in reverse order.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalOpts, ModuleOpts};
use crate::logging::Logger;
use crate::resources::privilege::PrivilegeContext;
use crate::tasks::Task;
use crate::tasks::module::UninstallModule;

use super::{CommandSetup, read_privilege, run_module_tasks};

/// Run the uninstall command.
///
/// # Errors
///
/// Returns an error if the modules cannot be loaded or any module fails to
/// uninstall.
pub fn run(global: &GlobalOpts, opts: &ModuleOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::from_env(global, opts.local_directory.as_deref())?;
    let privilege = read_privilege(opts.password_stdin, std::io::stdin().lock())?;
    uninstall(&setup, global, opts, privilege, log)
}

/// Uninstall the selected modules described by `setup`.  Modules are
/// reverted in reverse name order.
///
/// # Errors
///
/// Returns an error if the modules cannot be loaded or any module fails to
/// uninstall.
pub fn uninstall(
    setup: &CommandSetup,
    global: &GlobalOpts,
    opts: &ModuleOpts,
    privilege: PrivilegeContext,
    log: &Arc<Logger>,
) -> Result<()> {
    let mut modules = setup.load_modules(&opts.modules, log.as_ref())?;
    modules.reverse();
    let ctx = setup.context(global, log).with_privilege(privilege);

    let tasks: Vec<Box<dyn Task>> = modules
        .iter()
        .cloned()
        .map(|m| Box::new(UninstallModule::new(m)) as Box<dyn Task>)
        .collect();
    run_module_tasks(&tasks, &modules, &ctx, log)
}
