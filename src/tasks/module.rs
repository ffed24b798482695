//! Per-module install and uninstall tasks.
//!
//! Install runs `start`, the file actions, the default settings, then
//! `post`.  Uninstall runs `undo-post`, reverts the file actions in reverse
//! order, then runs `undo-start`.  A failing lifecycle script aborts the
//! rest of its module; any other failure is counted and the module carries
//! on.
use anyhow::{Context as _, Result};

use super::actions::{install_actions, uninstall_actions};
use super::{Context, ProcessOpts, Task, TaskResult, TaskStats, process_resources};
use crate::module::Module;
use crate::module::classify::LifecycleScript;
use crate::resources::script::ScriptResource;
use crate::resources::setting::SettingResource;

/// Install one module.
#[derive(Debug)]
pub struct InstallModule {
    name: String,
    module: Module,
}

impl InstallModule {
    #[must_use]
    pub fn new(module: Module) -> Self {
        Self {
            name: format!("Install {}", module.name),
            module,
        }
    }

    /// The module this task installs.
    #[must_use]
    pub const fn module(&self) -> &Module {
        &self.module
    }
}

impl Task for InstallModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_run(&self, ctx: &Context) -> bool {
        targets_host(&self.module, ctx)
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let module = &self.module;
        if is_empty(module) {
            return Ok(TaskResult::Skipped("nothing declared".to_string()));
        }
        warn_missing_credential(module, ctx);
        for env in &module.environments {
            ctx.log.debug(&format!(
                "developer environment: {} {}",
                env.language,
                env.versions.join(", ")
            ));
        }

        let mut stats = TaskStats::new();
        stats += run_lifecycle(ctx, module, LifecycleScript::Start)?;
        stats += install_actions(ctx, &module.actions)?;
        stats += apply_settings(ctx, module)?;
        stats += run_lifecycle(ctx, module, LifecycleScript::Post)?;
        stats.finish(ctx)
    }
}

/// Uninstall one module.
#[derive(Debug)]
pub struct UninstallModule {
    name: String,
    module: Module,
}

impl UninstallModule {
    #[must_use]
    pub fn new(module: Module) -> Self {
        Self {
            name: format!("Uninstall {}", module.name),
            module,
        }
    }

    /// The module this task uninstalls.
    #[must_use]
    pub const fn module(&self) -> &Module {
        &self.module
    }
}

impl Task for UninstallModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_run(&self, ctx: &Context) -> bool {
        targets_host(&self.module, ctx)
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let module = &self.module;
        if is_empty(module) {
            return Ok(TaskResult::Skipped("nothing declared".to_string()));
        }
        warn_missing_credential(module, ctx);

        let mut stats = TaskStats::new();
        stats += run_lifecycle(ctx, module, LifecycleScript::UndoPost)?;
        stats += uninstall_actions(ctx, &module.actions)?;
        stats += run_lifecycle(ctx, module, LifecycleScript::UndoStart)?;
        stats.finish(ctx)
    }
}

/// A module declaring an OS only runs on that OS.
fn targets_host(module: &Module, ctx: &Context) -> bool {
    module.os.is_none_or(|os| os == ctx.platform.os)
}

fn is_empty(module: &Module) -> bool {
    module.actions.is_empty()
        && module.settings.is_empty()
        && module.scripts == crate::module::LifecycleScripts::default()
}

fn warn_missing_credential(module: &Module, ctx: &Context) {
    if module.is_sudo_used() && !ctx.privilege.has_credential() {
        ctx.log.warn(&format!(
            "{} uses sudo but no password was provided; privileged steps will fail",
            module.name
        ));
    }
}

/// Run a lifecycle script if the module has one.  Errors are fatal.
fn run_lifecycle(ctx: &Context, module: &Module, script: LifecycleScript) -> Result<TaskStats> {
    let Some(path) = module.scripts.get(script) else {
        return Ok(TaskStats::new());
    };
    let resource = ScriptResource::new(path.to_path_buf(), ctx.executor.as_ref());
    process_resources(ctx, [resource], &ProcessOpts::apply_all("run"))
        .with_context(|| format!("{script} script failed, aborting {}", module.name))
}

fn apply_settings(ctx: &Context, module: &Module) -> Result<TaskStats> {
    let host = ctx.platform.mac_version;
    let resources = module.settings.iter().map(|setting| {
        SettingResource::new(setting, ctx.executor.as_ref(), &ctx.privilege, host)
    });
    process_resources(ctx, resources, &ProcessOpts::apply_all("apply").no_bail())
}
