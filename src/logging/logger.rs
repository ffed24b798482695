//! The immediate logger and the console status line of parallel runs.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{Line, Log, Summary, TaskEntry, TaskStatus};
use super::utils::{log_file_path, terminal_columns};

/// Names of the modules currently running in parallel, drawn as one
/// dimmed line below the regular output.
///
/// The line never wraps: it is cut to the terminal width so erasing it is a
/// carriage return plus clear-to-end-of-line.
#[derive(Debug, Default)]
pub(super) struct StatusLine {
    running: Vec<String>,
    drawn: bool,
}

impl StatusLine {
    /// Remove the line from the console if it is shown.
    #[allow(clippy::print_stdout)]
    pub(super) fn erase(&mut self) {
        if self.drawn {
            print!("\r\x1b[K");
            std::io::stdout().flush().ok();
            self.drawn = false;
        }
    }

    #[allow(clippy::print_stdout)]
    fn redraw(&mut self) {
        if self.running.is_empty() {
            return;
        }
        let names = fit(&self.running.join(", "), terminal_columns().saturating_sub(4));
        print!("  \x1b[2m▹ {names}\x1b[0m");
        std::io::stdout().flush().ok();
        self.drawn = true;
    }

    fn start(&mut self, name: &str) {
        self.erase();
        self.running.push(name.to_string());
        self.redraw();
    }

    /// Drop `name` from the line and redraw what is still running.
    pub(super) fn finish(&mut self, name: &str) {
        self.running.retain(|n| n != name);
        self.redraw();
    }

    #[cfg(test)]
    pub(super) fn running(&self) -> &[String] {
        &self.running
    }
}

/// Cut `text` to at most `width` characters, ending in `…` when shortened.
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Logger that writes every line as it is reported and collects task
/// outcomes for the closing summary.
///
/// Lines reach the console and `$XDG_CACHE_HOME/dotmodules/<command>.log`
/// through the subscriber installed by
/// [`init_subscriber`](super::init_subscriber); this type only remembers the
/// log path so the summary can point at it.
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
    status: Mutex<StatusLine>,
}

impl Logger {
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
            status: Mutex::new(StatusLine::default()),
        }
    }

    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Every task outcome recorded so far, in completion order.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts of the recorded outcomes.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::tally(&self.task_entries())
    }

    /// Number of tasks recorded as failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.summary().failed
    }

    pub fn stage(&self, msg: &str) {
        Line::Stage.emit(msg);
    }

    pub fn info(&self, msg: &str) {
        Line::Info.emit(msg);
    }

    pub fn debug(&self, msg: &str) {
        Line::Debug.emit(msg);
    }

    pub fn warn(&self, msg: &str) {
        Line::Warn.emit(msg);
    }

    pub fn error(&self, msg: &str) {
        Line::Error.emit(msg);
    }

    pub fn dry_run(&self, msg: &str) {
        Line::DryRun.emit(msg);
    }

    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }

    /// Print one row per task, the per-status counts and the log path.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let entries = self.task_entries();
        if entries.is_empty() {
            return;
        }
        println!();
        self.stage("Summary");
        for entry in &entries {
            self.info(&entry.status.row(&entry.name, entry.message.as_deref()));
        }
        println!();
        self.info(&Summary::tally(&entries).to_string());
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Show `name` on the status line while its module runs in parallel.
    pub fn notify_task_start(&self, name: &str) {
        self.status_line().start(name);
    }

    /// Exclusive access to the status line; held while a finished module's
    /// buffered lines are replayed.
    pub(super) fn status_line(&self) -> MutexGuard<'_, StatusLine> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        Self::stage(self, msg);
    }

    fn info(&self, msg: &str) {
        Self::info(self, msg);
    }

    fn debug(&self, msg: &str) {
        Self::debug(self, msg);
    }

    fn warn(&self, msg: &str) {
        Self::warn(self, msg);
    }

    fn error(&self, msg: &str) {
        Self::error(self, msg);
    }

    fn dry_run(&self, msg: &str) {
        Self::dry_run(self, msg);
    }

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        Self::record_task(self, name, status, message);
    }
}
