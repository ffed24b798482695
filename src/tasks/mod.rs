//! Named tasks that orchestrate resource changes for one module at a time.
pub mod actions;
mod context;
pub mod module;
mod processing;

pub use context::Context;
pub use processing::{
    ProcessOpts, TaskResult, TaskStats, process_resources, process_resources_remove,
};

use anyhow::Result;

use crate::logging::TaskStatus;

/// A named, executable task.
pub trait Task: Send + Sync {
    /// Human-readable task name.
    fn name(&self) -> &str;

    /// Whether this task applies to the current platform.
    fn should_run(&self, ctx: &Context) -> bool;

    /// Execute the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails to execute, such as when a
    /// lifecycle script fails or any of its items could not be applied.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// Run `task` unless it targets another host, and record its outcome.
pub fn execute(task: &dyn Task, ctx: &Context) {
    if !task.should_run(ctx) {
        ctx.log
            .debug(&format!("{} does not apply to this host", task.name()));
        ctx.log
            .record_task(task.name(), TaskStatus::NotApplicable, None);
        return;
    }

    ctx.log.stage(task.name());

    match task.run(ctx) {
        Ok(TaskResult::Ok) => {
            ctx.log.record_task(task.name(), TaskStatus::Ok, None);
        }
        Ok(TaskResult::Unchanged) => {
            ctx.log.record_task(task.name(), TaskStatus::Unchanged, None);
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(&reason));
        }
        Ok(TaskResult::DryRun) => {
            ctx.log.record_task(task.name(), TaskStatus::DryRun, None);
        }
        Err(e) => {
            ctx.log.error(&format!("{}: {e:#}", task.name()));
            ctx.log
                .record_task(task.name(), TaskStatus::Failed, Some(&format!("{e:#}")));
        }
    }
}

/// Contexts for task unit tests.
#[cfg(test)]
#[allow(clippy::panic)]
pub mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::exec::{ExecResult, Executor};
    use crate::logging::Logger;
    use crate::platform::{Os, Platform};

    use super::Context;

    /// Executor for tests that must not spawn anything.
    #[derive(Debug, Default)]
    pub struct NoCommandExecutor;

    impl Executor for NoCommandExecutor {
        fn run(&self, _: &str, _: &[&str]) -> anyhow::Result<ExecResult> {
            panic!("unexpected executor call in test")
        }

        fn run_unchecked(&self, _: &str, _: &[&str]) -> anyhow::Result<ExecResult> {
            panic!("unexpected executor call in test")
        }

        fn run_in_unchecked(&self, _: &Path, _: &str, _: &[&str]) -> anyhow::Result<ExecResult> {
            panic!("unexpected executor call in test")
        }

        fn run_with_input(
            &self,
            _: Option<&Path>,
            _: &str,
            _: &[&str],
            _: &str,
            _: Duration,
        ) -> anyhow::Result<ExecResult> {
            panic!("unexpected executor call in test")
        }

        fn which(&self, _: &str) -> bool {
            false
        }
    }

    /// Build a [`Context`] whose executor refuses every command.
    #[must_use]
    pub fn make_static_context(target: PathBuf) -> (Context, Arc<Logger>) {
        make_context_with_executor(target, Arc::new(NoCommandExecutor))
    }

    /// Build a [`Context`] around `executor` on the current OS with an
    /// unknown macOS release.
    #[must_use]
    pub fn make_context_with_executor(
        target: PathBuf,
        executor: Arc<dyn Executor>,
    ) -> (Context, Arc<Logger>) {
        let log = Arc::new(Logger::new("test"));
        let ctx = Context::new(
            Platform::new(Os::current(), None),
            Arc::clone(&log) as Arc<dyn crate::logging::Log>,
            false,
            target,
            executor,
            false,
        );
        (ctx, log)
    }
}
