//! The loop shared by every module step: check each resource, apply or
//! revert what is out of place, and count what happened.
//!
//! Single-resource handling lives in [`apply`]; this module owns the batch
//! loops and the counters they produce.

mod apply;

use anyhow::Result;

use super::Context;
use crate::resources::Resource;

/// How a module task ended, short of an error.
///
/// # Examples
///
/// ```
/// use dotmodules::tasks::TaskResult;
///
/// let ok = TaskResult::Ok;
/// let skipped = TaskResult::Skipped("nothing to do".into());
/// let dry = TaskResult::DryRun;
///
/// assert!(matches!(ok, TaskResult::Ok));
/// assert!(!matches!(TaskResult::Unchanged, TaskResult::Ok));
/// assert!(matches!(skipped, TaskResult::Skipped(_)));
/// assert!(matches!(dry, TaskResult::DryRun));
/// ```
#[derive(Debug, Clone)]
pub enum TaskResult {
    /// At least one item was applied.
    Ok,
    /// Every item was already in the desired state.
    Unchanged,
    /// Task was skipped.
    Skipped(String),
    /// Task ran in dry-run mode.
    DryRun,
}

/// Counters for tasks that process many resources.
///
/// "Already ok" and "not applicable" are kept apart so that a setting gated
/// out by the host release is never reported as satisfied.
///
/// # Examples
///
/// ```
/// use dotmodules::tasks::TaskStats;
///
/// let mut stats = TaskStats::new();
/// stats.changed = 3;
/// stats.already_ok = 10;
///
/// assert_eq!(stats.summary(false), "3 changed, 10 already ok");
/// assert_eq!(stats.summary(true), "3 would change, 10 already ok");
///
/// stats.not_applicable = 2;
/// stats.failed = 1;
/// assert_eq!(stats.summary(false), "3 changed, 10 already ok, 2 n/a, 1 failed");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    /// Items applied, or that would be in dry-run mode.
    pub changed: u32,
    /// Number of items already in the desired state.
    pub already_ok: u32,
    /// Number of items skipped (disabled, irreversible, invalid).
    pub skipped: u32,
    /// Number of items that do not apply to this host.
    pub not_applicable: u32,
    /// Number of items whose check or apply failed.
    pub failed: u32,
}

impl TaskStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One line for the log; zero counts past "already ok" are omitted.
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would change" } else { "changed" };
        let mut out = format!("{} {verb}, {} already ok", self.changed, self.already_ok);
        for (count, label) in [
            (self.skipped, "skipped"),
            (self.not_applicable, "n/a"),
            (self.failed, "failed"),
        ] {
            if count > 0 {
                out.push_str(&format!(", {count} {label}"));
            }
        }
        out
    }

    /// Log the summary and return the appropriate `TaskResult`: nothing
    /// changed is [`TaskResult::Unchanged`], in dry-run mode too.
    ///
    /// # Errors
    ///
    /// Returns an error when any item failed, so the task is recorded as
    /// failed even though the remaining items were processed.
    pub fn finish(self, ctx: &Context) -> Result<TaskResult> {
        ctx.log.info(&self.summary(ctx.dry_run));
        if self.failed > 0 {
            anyhow::bail!("{} item(s) failed", self.failed);
        }
        Ok(match (self.changed, ctx.dry_run) {
            (0, _) => TaskResult::Unchanged,
            (_, true) => TaskResult::DryRun,
            (_, false) => TaskResult::Ok,
        })
    }
}

impl std::ops::AddAssign for TaskStats {
    fn add_assign(&mut self, other: Self) {
        self.changed += other.changed;
        self.already_ok += other.already_ok;
        self.skipped += other.skipped;
        self.not_applicable += other.not_applicable;
        self.failed += other.failed;
    }
}

/// How [`process_resources`] treats errors, and the verb it logs.
///
/// # Examples
///
/// ```
/// use dotmodules::tasks::ProcessOpts;
///
/// // Stop at the first error (lifecycle scripts):
/// let opts = ProcessOpts::apply_all("run");
/// assert!(opts.bail_on_error);
///
/// // Record errors and keep going (file actions, settings):
/// let opts = ProcessOpts::apply_all("install").no_bail();
/// assert!(!opts.bail_on_error);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ProcessOpts<'a> {
    /// Verb for log messages (e.g., "install", "apply", "run").
    pub verb: &'a str,
    /// Propagate errors (bail). If `false`, warn and count as failed.
    pub bail_on_error: bool,
}

impl<'a> ProcessOpts<'a> {
    /// Stop at the first error.
    #[must_use]
    pub const fn apply_all(verb: &'a str) -> Self {
        Self {
            verb,
            bail_on_error: true,
        }
    }

    /// Count errors as failures and carry on.
    #[must_use]
    pub const fn no_bail(mut self) -> Self {
        self.bail_on_error = false;
        self
    }
}

/// Process resources sequentially by checking each one's current state and
/// applying as needed.
///
/// # Errors
///
/// With `bail_on_error`, returns the first state-check or apply error.
/// Otherwise errors are logged as warnings and counted in
/// [`TaskStats::failed`].
pub fn process_resources<R: Resource>(
    ctx: &Context,
    resources: impl IntoIterator<Item = R>,
    opts: &ProcessOpts,
) -> Result<TaskStats> {
    let mut stats = TaskStats::new();
    for resource in resources {
        match resource.current_state() {
            Ok(current) => stats += apply::process_single(ctx, &resource, current, opts)?,
            Err(e) => stats += apply::check_failed(ctx, &resource, e, opts)?,
        }
    }
    Ok(stats)
}

/// Revert resources, e.g. on uninstall.
///
/// Only resources in [`ResourceState::Correct`](crate::resources::ResourceState::Correct)
/// are removed (they are "ours"). Anything else is left alone.  Failures are
/// logged, counted, and the loop continues.
#[must_use]
pub fn process_resources_remove<R: Resource>(
    ctx: &Context,
    resources: impl IntoIterator<Item = R>,
    verb: &str,
) -> TaskStats {
    let mut stats = TaskStats::new();
    for resource in resources {
        match resource.current_state() {
            Ok(current) => stats += apply::remove_single(ctx, &resource, &current, verb),
            Err(e) => stats += apply::failure(ctx, verb, &resource.description(), &e),
        }
    }
    stats
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::resources::error::ExecutionError;
    use crate::resources::{Applicable, ResourceChange, ResourceState};
    use crate::tasks::test_helpers::make_static_context;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct MockResource {
        state_result: Result<ResourceState, String>,
        apply_result: Result<ResourceChange, String>,
        remove_result: Result<ResourceChange, String>,
        applied: AtomicU32,
        removed: AtomicU32,
    }

    impl MockResource {
        fn new(state: ResourceState) -> Self {
            Self {
                state_result: Ok(state),
                apply_result: Ok(ResourceChange::Applied),
                remove_result: Ok(ResourceChange::Applied),
                applied: AtomicU32::new(0),
                removed: AtomicU32::new(0),
            }
        }

        fn with_state_error(mut self, err: &str) -> Self {
            self.state_result = Err(err.to_string());
            self
        }

        fn with_apply(mut self, result: Result<ResourceChange, String>) -> Self {
            self.apply_result = result;
            self
        }

        fn with_remove(mut self, result: Result<ResourceChange, String>) -> Self {
            self.remove_result = result;
            self
        }
    }

    fn mock_error(message: &str) -> ExecutionError {
        ExecutionError::Spawn {
            program: "mock".to_string(),
            message: message.to_string(),
        }
    }

    impl Applicable for &MockResource {
        fn description(&self) -> String {
            "mock resource".to_string()
        }

        fn apply(&self) -> Result<ResourceChange, ExecutionError> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            self.apply_result.clone().map_err(|s| mock_error(&s))
        }

        fn remove(&self) -> Result<ResourceChange, ExecutionError> {
            self.removed.fetch_add(1, Ordering::SeqCst);
            self.remove_result.clone().map_err(|s| mock_error(&s))
        }
    }

    impl Resource for &MockResource {
        fn current_state(&self) -> Result<ResourceState, ExecutionError> {
            self.state_result.clone().map_err(|s| mock_error(&s))
        }
    }

    fn ctx() -> Context {
        make_static_context(PathBuf::from("/home/test")).0
    }

    fn dry_run_ctx() -> Context {
        let mut ctx = ctx();
        ctx.dry_run = true;
        ctx
    }

    // -----------------------------------------------------------------------
    // process_resources
    // -----------------------------------------------------------------------

    #[test]
    fn correct_resource_is_not_reapplied() {
        let r = MockResource::new(ResourceState::Correct);
        let stats = process_resources(&ctx(), [&r], &ProcessOpts::apply_all("install")).unwrap();
        assert_eq!(stats.already_ok, 1);
        assert_eq!(r.applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_and_incorrect_are_applied() {
        let missing = MockResource::new(ResourceState::Missing);
        let incorrect = MockResource::new(ResourceState::Incorrect {
            current: "other".to_string(),
        });
        let stats = process_resources(
            &ctx(),
            [&missing, &incorrect],
            &ProcessOpts::apply_all("install"),
        )
        .unwrap();
        assert_eq!(stats.changed, 2);
        assert_eq!(missing.applied.load(Ordering::SeqCst), 1);
        assert_eq!(incorrect.applied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_applicable_is_counted_apart_from_already_ok() {
        let gated = MockResource::new(ResourceState::NotApplicable {
            reason: "host is sierra".to_string(),
        });
        let stats = process_resources(&ctx(), [&gated], &ProcessOpts::apply_all("apply")).unwrap();
        assert_eq!(stats.not_applicable, 1);
        assert_eq!(stats.already_ok, 0);
        assert_eq!(gated.applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_is_skipped() {
        let r = MockResource::new(ResourceState::Invalid {
            reason: "disabled".to_string(),
        });
        let stats = process_resources(&ctx(), [&r], &ProcessOpts::apply_all("apply")).unwrap();
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn dry_run_counts_without_applying() {
        let r = MockResource::new(ResourceState::Missing);
        let stats =
            process_resources(&dry_run_ctx(), [&r], &ProcessOpts::apply_all("install")).unwrap();
        assert_eq!(stats.changed, 1);
        assert_eq!(r.applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn apply_error_bails_when_strict() {
        let r = MockResource::new(ResourceState::Missing).with_apply(Err("boom".to_string()));
        let err = process_resources(&ctx(), [&r], &ProcessOpts::apply_all("run")).unwrap_err();
        assert!(format!("{err:#}").contains("boom"), "{err:#}");
    }

    #[test]
    fn apply_error_is_counted_when_lenient() {
        let failing = MockResource::new(ResourceState::Missing).with_apply(Err("boom".to_string()));
        let next = MockResource::new(ResourceState::Missing);
        let stats = process_resources(
            &ctx(),
            [&failing, &next],
            &ProcessOpts::apply_all("install").no_bail(),
        )
        .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.changed, 1, "later resources still run");
    }

    #[test]
    fn state_error_is_counted_when_lenient() {
        let r = MockResource::new(ResourceState::Missing).with_state_error("unreadable");
        let stats = process_resources(&ctx(), [&r], &ProcessOpts::apply_all("install").no_bail())
            .unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(r.applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn already_correct_apply_counts_as_ok() {
        let r =
            MockResource::new(ResourceState::Missing).with_apply(Ok(ResourceChange::AlreadyCorrect));
        let stats = process_resources(&ctx(), [&r], &ProcessOpts::apply_all("install")).unwrap();
        assert_eq!(stats.already_ok, 1);
        assert_eq!(stats.changed, 0);
    }

    // -----------------------------------------------------------------------
    // process_resources_remove
    // -----------------------------------------------------------------------

    #[test]
    fn remove_only_touches_correct_resources() {
        let ours = MockResource::new(ResourceState::Correct);
        let foreign = MockResource::new(ResourceState::Incorrect {
            current: "user file".to_string(),
        });
        let absent = MockResource::new(ResourceState::Missing);
        let stats = process_resources_remove(&ctx(), [&ours, &foreign, &absent], "uninstall");
        assert_eq!(stats.changed, 1);
        assert_eq!(stats.skipped, 1, "foreign file is left alone");
        assert_eq!(stats.already_ok, 1, "absent destination needs nothing");
        assert_eq!(ours.removed.load(Ordering::SeqCst), 1);
        assert_eq!(foreign.removed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_leaves_invalid_resources_as_skipped() {
        let orphan = MockResource::new(ResourceState::Invalid {
            reason: "source does not exist".to_string(),
        });
        let gated = MockResource::new(ResourceState::NotApplicable {
            reason: "host is sierra".to_string(),
        });
        let stats = process_resources_remove(&ctx(), [&orphan, &gated], "uninstall");
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.not_applicable, 1);
        assert_eq!(stats.already_ok, 0);
        assert_eq!(orphan.removed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_reports_irreversible_as_skipped() {
        let r = MockResource::new(ResourceState::Correct).with_remove(Ok(ResourceChange::Skipped {
            reason: "irreversible".to_string(),
        }));
        let stats = process_resources_remove(&ctx(), [&r], "uninstall");
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn remove_failure_is_counted() {
        let r = MockResource::new(ResourceState::Correct).with_remove(Err("denied".to_string()));
        let stats = process_resources_remove(&ctx(), [&r], "uninstall");
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn dry_run_remove_does_not_remove() {
        let r = MockResource::new(ResourceState::Correct);
        let stats = process_resources_remove(&dry_run_ctx(), [&r], "uninstall");
        assert_eq!(stats.changed, 1);
        assert_eq!(r.removed.load(Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // TaskStats
    // -----------------------------------------------------------------------

    #[test]
    fn finish_fails_when_anything_failed() {
        let stats = TaskStats {
            failed: 2,
            ..TaskStats::new()
        };
        let err = stats.finish(&ctx()).unwrap_err();
        assert_eq!(err.to_string(), "2 item(s) failed");
    }

    #[test]
    fn finish_reports_dry_run() {
        let stats = TaskStats {
            changed: 1,
            ..TaskStats::new()
        };
        assert!(matches!(
            stats.finish(&dry_run_ctx()).unwrap(),
            TaskResult::DryRun
        ));
    }

    #[test]
    fn finish_without_changes_is_unchanged() {
        let stats = TaskStats {
            already_ok: 3,
            not_applicable: 1,
            ..TaskStats::new()
        };
        assert!(matches!(stats.finish(&ctx()).unwrap(), TaskResult::Unchanged));
        assert!(matches!(
            TaskStats::new().finish(&dry_run_ctx()).unwrap(),
            TaskResult::Unchanged
        ));
    }

    #[test]
    fn stats_accumulate() {
        let mut total = TaskStats {
            changed: 1,
            ..TaskStats::new()
        };
        total += TaskStats {
            changed: 2,
            not_applicable: 1,
            ..TaskStats::new()
        };
        assert_eq!(total.changed, 3);
        assert_eq!(total.not_applicable, 1);
    }
}
