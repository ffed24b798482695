//! Bind a module's [`FileAction`]s to the resources that perform them.
use std::path::PathBuf;

use anyhow::Result;

use super::{Context, ProcessOpts, TaskStats, process_resources, process_resources_remove};
use crate::config::settings::ActionKind;
use crate::module::FileAction;
use crate::resources::copy::CopyResource;
use crate::resources::error::ExecutionError;
use crate::resources::move_file::MoveResource;
use crate::resources::remove::RemoveResource;
use crate::resources::script::ScriptResource;
use crate::resources::symlink::SymlinkResource;
use crate::resources::{Applicable, Resource, ResourceChange, ResourceState};

/// One file action ready to be checked, applied, or reverted.
#[derive(Debug)]
pub enum ActionResource<'a> {
    Symlink(SymlinkResource<'a>),
    Copy(CopyResource<'a>),
    Move(MoveResource<'a>),
    Remove(RemoveResource<'a>),
    Script(ScriptResource<'a>),
}

impl<'a> ActionResource<'a> {
    /// Build the resource for `action`, elevated when the action asks for
    /// `sudo`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Unsupported`] if a symlink, copy, or move
    /// action has no destination.
    pub fn new(action: &FileAction, ctx: &'a Context) -> Result<Self, ExecutionError> {
        let source = action.source.clone();
        let resource = match action.kind {
            ActionKind::Symlink => Self::Symlink(SymlinkResource::new(source, destination(action)?)),
            ActionKind::Copy => Self::Copy(CopyResource::new(source, destination(action)?)),
            ActionKind::Move => Self::Move(MoveResource::new(source, destination(action)?)),
            ActionKind::Remove => Self::Remove(RemoveResource::new(source)),
            ActionKind::Script => Self::Script(ScriptResource::new(source, ctx.executor.as_ref())),
        };
        Ok(if action.sudo {
            resource.elevated(ctx)
        } else {
            resource
        })
    }

    fn elevated(self, ctx: &'a Context) -> Self {
        let elevation = ctx.elevation();
        match self {
            Self::Symlink(r) => Self::Symlink(r.elevated(elevation)),
            Self::Copy(r) => Self::Copy(r.elevated(elevation)),
            Self::Move(r) => Self::Move(r.elevated(elevation)),
            Self::Remove(r) => Self::Remove(r.elevated(elevation)),
            Self::Script(r) => Self::Script(r.elevated(elevation)),
        }
    }

    fn inner(&self) -> &dyn Resource {
        match self {
            Self::Symlink(r) => r,
            Self::Copy(r) => r,
            Self::Move(r) => r,
            Self::Remove(r) => r,
            Self::Script(r) => r,
        }
    }
}

fn destination(action: &FileAction) -> Result<PathBuf, ExecutionError> {
    action
        .destination
        .clone()
        .ok_or_else(|| ExecutionError::Unsupported {
            operation: format!("{} without a destination", action.kind),
            resource: action.source.display().to_string(),
        })
}

impl Applicable for ActionResource<'_> {
    fn description(&self) -> String {
        self.inner().description()
    }

    fn apply(&self) -> Result<ResourceChange, ExecutionError> {
        self.inner().apply()
    }

    fn remove(&self) -> Result<ResourceChange, ExecutionError> {
        self.inner().remove()
    }
}

impl Resource for ActionResource<'_> {
    fn current_state(&self) -> Result<ResourceState, ExecutionError> {
        self.inner().current_state()
    }
}

/// Apply `actions` in order.  A failing action is logged and counted; the
/// rest still run.
///
/// # Errors
///
/// Never fails for an individual action; the `Result` carries errors from
/// the processing loop itself.
pub fn install_actions(ctx: &Context, actions: &[FileAction]) -> Result<TaskStats> {
    let mut stats = TaskStats::new();
    let mut resources = Vec::with_capacity(actions.len());
    for action in actions {
        match ActionResource::new(action, ctx) {
            Ok(resource) => resources.push(resource),
            Err(e) => stats += unbuildable(ctx, action, &e),
        }
    }
    stats += process_resources(ctx, resources, &ProcessOpts::apply_all("install").no_bail())?;
    Ok(stats)
}

/// Revert `actions` in reverse order.
///
/// Symlinks are unlinked, copies still identical to their source are
/// deleted, moved files are moved back, and script actions run their undo
/// script when they declare one.  Removals cannot be undone and are reported
/// as skipped.
///
/// # Errors
///
/// Never fails for an individual action; the `Result` carries errors from
/// the processing loop itself.
pub fn uninstall_actions(ctx: &Context, actions: &[FileAction]) -> Result<TaskStats> {
    let mut stats = TaskStats::new();
    for action in actions.iter().rev() {
        if action.kind == ActionKind::Script {
            stats += undo_script(ctx, action)?;
            continue;
        }
        match ActionResource::new(action, ctx) {
            Ok(resource) => stats += process_resources_remove(ctx, [resource], "uninstall"),
            Err(e) => stats += unbuildable(ctx, action, &e),
        }
    }
    Ok(stats)
}

fn undo_script(ctx: &Context, action: &FileAction) -> Result<TaskStats> {
    let Some(undo) = &action.undo else {
        ctx.log.debug(&format!(
            "no undo script for {}",
            action.source.display()
        ));
        return Ok(TaskStats {
            skipped: 1,
            ..TaskStats::new()
        });
    };
    let mut script = ScriptResource::new(undo.clone(), ctx.executor.as_ref());
    if action.sudo {
        script = script.elevated(ctx.elevation());
    }
    process_resources(ctx, [script], &ProcessOpts::apply_all("undo").no_bail())
}

fn unbuildable(ctx: &Context, action: &FileAction, error: &ExecutionError) -> TaskStats {
    ctx.log.warn(&format!("cannot {} {}: {error}", action.kind, action.source.display()));
    TaskStats {
        failed: 1,
        ..TaskStats::new()
    }
}
