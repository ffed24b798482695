//! One resource at a time: act on its checked state and count the outcome.

use anyhow::{Context as _, Result};

use super::{ProcessOpts, TaskStats};
use crate::resources::error::ExecutionError;
use crate::resources::{Resource, ResourceChange, ResourceState};
use crate::tasks::Context;

/// Act on one resource whose state was just checked.
pub(super) fn process_single<R: Resource>(
    ctx: &Context,
    resource: &R,
    state: ResourceState,
    opts: &ProcessOpts,
) -> Result<TaskStats> {
    let desc = resource.description();
    let pending = match state {
        ResourceState::Correct => {
            ctx.log.debug(&format!("already in place: {desc}"));
            return Ok(TaskStats {
                already_ok: 1,
                ..TaskStats::new()
            });
        }
        ResourceState::NotApplicable { reason } => {
            ctx.log.debug(&format!("not applicable: {desc} ({reason})"));
            return Ok(TaskStats {
                not_applicable: 1,
                ..TaskStats::new()
            });
        }
        ResourceState::Invalid { reason } => {
            ctx.log.debug(&format!("skipping {desc}: {reason}"));
            return Ok(TaskStats {
                skipped: 1,
                ..TaskStats::new()
            });
        }
        ResourceState::Missing => None,
        ResourceState::Incorrect { current } => Some(current),
    };

    if ctx.dry_run {
        ctx.log.dry_run(&match pending {
            Some(current) => format!("would {} {desc} (currently {current})", opts.verb),
            None => format!("would {}: {desc}", opts.verb),
        });
        return Ok(TaskStats {
            changed: 1,
            ..TaskStats::new()
        });
    }

    match resource.apply() {
        Ok(change) => Ok(counted(ctx, opts.verb, &desc, change)),
        Err(e) if opts.bail_on_error => {
            Err(e).with_context(|| format!("failed to {} {desc}", opts.verb))
        }
        Err(e) => Ok(failure(ctx, opts.verb, &desc, &e)),
    }
}

/// A state check that errored: fatal with `bail_on_error`, else counted.
pub(super) fn check_failed<R: Resource>(
    ctx: &Context,
    resource: &R,
    error: ExecutionError,
    opts: &ProcessOpts,
) -> Result<TaskStats> {
    let desc = resource.description();
    if opts.bail_on_error {
        return Err(error).with_context(|| format!("failed to check {desc}"));
    }
    Ok(failure(ctx, opts.verb, &desc, &error))
}

/// Log a non-fatal failure and count it.
pub(super) fn failure(ctx: &Context, verb: &str, desc: &str, error: &ExecutionError) -> TaskStats {
    ctx.log.warn(&format!("failed to {verb} {desc}: {error}"));
    TaskStats {
        failed: 1,
        ..TaskStats::new()
    }
}

/// Revert one resource.  Only a resource found [`ResourceState::Correct`]
/// was put there by us.  A missing one has nothing left to undo; anything
/// else at the destination belongs to someone else and is left alone.
pub(super) fn remove_single<R: Resource>(
    ctx: &Context,
    resource: &R,
    state: &ResourceState,
    verb: &str,
) -> TaskStats {
    let desc = resource.description();
    match state {
        ResourceState::Correct if ctx.dry_run => {
            ctx.log.dry_run(&format!("would {verb}: {desc}"));
            TaskStats {
                changed: 1,
                ..TaskStats::new()
            }
        }
        ResourceState::Correct => match resource.remove() {
            Ok(change) => counted(ctx, verb, &desc, change),
            Err(e) => failure(ctx, verb, &desc, &e),
        },
        ResourceState::Missing => {
            ctx.log.debug(&format!("nothing to {verb}: {desc}"));
            TaskStats {
                already_ok: 1,
                ..TaskStats::new()
            }
        }
        ResourceState::NotApplicable { .. } => TaskStats {
            not_applicable: 1,
            ..TaskStats::new()
        },
        ResourceState::Incorrect { current: reason } | ResourceState::Invalid { reason } => {
            ctx.log.info(&format!("left {desc} in place: {reason}"));
            TaskStats {
                skipped: 1,
                ..TaskStats::new()
            }
        }
    }
}

fn counted(ctx: &Context, verb: &str, desc: &str, change: ResourceChange) -> TaskStats {
    let mut delta = TaskStats::new();
    match change {
        ResourceChange::Applied => {
            ctx.log.debug(&format!("{verb}: {desc}"));
            delta.changed = 1;
        }
        ResourceChange::AlreadyCorrect => delta.already_ok = 1,
        ResourceChange::Skipped { reason } => {
            ctx.log.info(&format!("skipped {desc}: {reason}"));
            delta.skipped = 1;
        }
    }
    delta
}
