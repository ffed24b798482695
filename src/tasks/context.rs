//! Per-run state shared by every task.
use std::path::PathBuf;
use std::sync::Arc;

use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::Platform;
use crate::resources::privilege::{Elevation, PrivilegeContext};

/// Everything a module task needs besides the module itself.
///
/// Cheap to clone: the log, executor and credential are shared.
#[derive(Clone)]
pub struct Context {
    pub platform: Platform,
    pub log: Arc<dyn Log>,
    /// Report what would change without changing it.
    pub dry_run: bool,
    /// Tree that module destinations resolve into (normally `$HOME`).
    pub target: PathBuf,
    /// Runs scripts, settings and privileged commands.
    pub executor: Arc<dyn Executor>,
    /// Credential for operations that run through `sudo`.
    pub privilege: Arc<PrivilegeContext>,
    /// Whether independent modules may run concurrently.
    pub parallel: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("target", &self.target)
            .field("executor", &"<dyn Executor>")
            .field("privilege", &self.privilege)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl Context {
    /// A context without a sudo credential.
    #[must_use]
    pub fn new(
        platform: Platform,
        log: Arc<dyn Log>,
        dry_run: bool,
        target: PathBuf,
        executor: Arc<dyn Executor>,
        parallel: bool,
    ) -> Self {
        Self {
            platform,
            log,
            dry_run,
            target,
            executor,
            privilege: Arc::new(PrivilegeContext::none()),
            parallel,
        }
    }

    /// Attach the credential used for `sudo` operations.
    #[must_use]
    pub fn with_privilege(mut self, privilege: PrivilegeContext) -> Self {
        self.privilege = Arc::new(privilege);
        self
    }

    /// Elevation handle borrowing this context's executor and credential.
    #[must_use]
    pub fn elevation(&self) -> Elevation<'_> {
        Elevation::new(self.executor.as_ref(), &self.privilege)
    }

    /// The same context reporting to `log`; each parallel module gets its
    /// own buffered log this way.
    #[must_use]
    pub fn with_log(&self, log: Arc<dyn Log>) -> Self {
        Self { log, ..self.clone() }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::tasks::test_helpers::make_static_context;

    #[test]
    fn debug_redacts_credential() {
        let (ctx, _log) = make_static_context(PathBuf::from("/home/test"));
        let ctx = ctx.with_privilege(PrivilegeContext::new("hunter2"));
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("hunter2"), "password leaked: {rendered}");
        assert!(rendered.contains("/home/test"));
    }

    #[test]
    fn with_log_shares_privilege() {
        let (ctx, log) = make_static_context(PathBuf::from("/home/test"));
        let ctx = ctx.with_privilege(PrivilegeContext::new("pw"));
        let copy = ctx.with_log(log);
        assert!(Arc::ptr_eq(&ctx.privilege, &copy.privilege));
        assert!(copy.privilege.has_credential());
    }
}
