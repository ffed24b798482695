//! Task outcomes, the run summary and the [`Log`] trait.
use std::fmt;

/// Tracing target of stage headers.
pub(super) const STAGE_TARGET: &str = "dotmodules::stage";
/// Tracing target of "would ..." lines printed in dry-run mode.
pub(super) const DRY_RUN_TARGET: &str = "dotmodules::dry_run";

/// Outcome of one module task, as shown in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// At least one action or setting was applied.
    Ok,
    /// Everything was already in the desired state.
    Unchanged,
    /// The module targets another operating system.
    NotApplicable,
    /// The module declares nothing to do.
    Skipped,
    /// Changes were found but not applied.
    DryRun,
    /// A lifecycle script failed, or at least one item could not be applied.
    Failed,
}

impl TaskStatus {
    const fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::Unchanged => "=",
            Self::NotApplicable => "·",
            Self::Skipped => "○",
            Self::DryRun => "~",
            Self::Failed => "✗",
        }
    }

    const fn colour(self) -> &'static str {
        match self {
            Self::Ok => "\x1b[32m",
            Self::Unchanged | Self::NotApplicable => "\x1b[2m",
            Self::Skipped => "\x1b[33m",
            Self::DryRun => "\x1b[37m",
            Self::Failed => "\x1b[31m",
        }
    }

    /// One summary row: coloured icon, task name and optional detail.
    pub(super) fn row(self, name: &str, message: Option<&str>) -> String {
        let detail = message.map_or_else(String::new, |m| format!(" ({m})"));
        format!("{}{} {name}{detail}\x1b[0m", self.colour(), self.icon())
    }
}

/// Recorded outcome of one task.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub name: String,
    pub status: TaskStatus,
    /// Skip reason or error chain.
    pub message: Option<String>,
}

/// Per-status counts over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub ok: usize,
    pub unchanged: usize,
    pub not_applicable: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: usize,
}

impl Summary {
    /// Count `entries` by status.
    #[must_use]
    pub fn tally(entries: &[TaskEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut s, entry| {
            *match entry.status {
                TaskStatus::Ok => &mut s.ok,
                TaskStatus::Unchanged => &mut s.unchanged,
                TaskStatus::NotApplicable => &mut s.not_applicable,
                TaskStatus::Skipped => &mut s.skipped,
                TaskStatus::DryRun => &mut s.dry_run,
                TaskStatus::Failed => &mut s.failed,
            } += 1;
            s
        })
    }

    /// Number of recorded tasks.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ok + self.unchanged + self.not_applicable + self.skipped + self.dry_run + self.failed
    }
}

impl fmt::Display for Summary {
    /// `"4 tasks: 1 ok, 2 unchanged, 1 failed"`; zero counts are left out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tasks", self.total())?;
        let counts = [
            (self.ok, "ok"),
            (self.unchanged, "unchanged"),
            (self.not_applicable, "n/a"),
            (self.skipped, "skipped"),
            (self.dry_run, "dry-run"),
            (self.failed, "failed"),
        ];
        let mut sep = ": ";
        for (count, label) in counts.into_iter().filter(|(n, _)| *n > 0) {
            write!(f, "{sep}{count} {label}")?;
            sep = ", ";
        }
        Ok(())
    }
}

/// Kind of output line, shared by the live and buffered loggers and by the
/// subscriber layers that render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Line {
    Stage,
    Info,
    Debug,
    Warn,
    Error,
    DryRun,
}

impl Line {
    /// Emit `msg` as a tracing event of this kind.
    pub(super) fn emit(self, msg: &str) {
        match self {
            Self::Stage => tracing::info!(target: STAGE_TARGET, "{msg}"),
            Self::Info => tracing::info!("{msg}"),
            Self::Debug => tracing::debug!("{msg}"),
            Self::Warn => tracing::warn!("{msg}"),
            Self::Error => tracing::error!("{msg}"),
            Self::DryRun => tracing::info!(target: DRY_RUN_TARGET, "{msg}"),
        }
    }

    /// Recover the kind of an event from its level and target.
    pub(super) fn of(metadata: &tracing::Metadata<'_>) -> Self {
        match (*metadata.level(), metadata.target()) {
            (tracing::Level::ERROR, _) => Self::Error,
            (tracing::Level::WARN, _) => Self::Warn,
            (tracing::Level::INFO, STAGE_TARGET) => Self::Stage,
            (tracing::Level::INFO, DRY_RUN_TARGET) => Self::DryRun,
            (tracing::Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// Sink for everything a task reports.
///
/// [`Logger`](super::Logger) writes immediately; [`BufferedLog`](super::BufferedLog)
/// holds the lines of one module until it finishes so modules installed in
/// parallel do not interleave.
pub trait Log: Send + Sync {
    /// Section header, e.g. the name of the module being installed.
    fn stage(&self, msg: &str);
    fn info(&self, msg: &str);
    /// Hidden on the console unless `--verbose`; always in the log file.
    fn debug(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
    /// A change that would be made without `--dry-run`.
    fn dry_run(&self, msg: &str);
    /// Record a task outcome for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}
