//! Per-module line buffer used while modules install in parallel.
use std::sync::{Arc, Mutex, PoisonError};

use super::logger::Logger;
use super::types::{Line, Log, TaskStatus};

/// Holds the lines one module reports until the module finishes, then
/// replays them as one uninterrupted block.
///
/// Task outcomes skip the buffer and go straight to the backing [`Logger`]
/// so the summary sees them in completion order.
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    lines: Mutex<Vec<(Line, String)>>,
}

impl BufferedLog {
    #[must_use]
    pub const fn new(inner: Arc<Logger>) -> Self {
        Self {
            inner,
            lines: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, line: Line, msg: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((line, msg.to_string()));
    }

    fn drain(&self) {
        let lines = std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner));
        for (line, msg) in &lines {
            line.emit(msg);
        }
    }

    /// Replay the buffered lines without touching the status line.
    #[cfg(test)]
    pub fn flush(&self) {
        self.drain();
    }

    /// Replay the buffered lines and take `task_name` off the status line.
    ///
    /// The status line stays locked for the whole replay, so two modules
    /// finishing at once print one block after the other.
    pub fn flush_and_complete(&self, task_name: &str) {
        let mut status = self.inner.status_line();
        status.erase();
        self.drain();
        status.finish(task_name);
    }
}

impl Log for BufferedLog {
    fn stage(&self, msg: &str) {
        self.push(Line::Stage, msg);
    }

    fn info(&self, msg: &str) {
        self.push(Line::Info, msg);
    }

    fn debug(&self, msg: &str) {
        self.push(Line::Debug, msg);
    }

    fn warn(&self, msg: &str) {
        self.push(Line::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Line::Error, msg);
    }

    fn dry_run(&self, msg: &str) {
        self.push(Line::DryRun, msg);
    }

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.inner.record_task(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    fn buffered() -> (Arc<Logger>, BufferedLog, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
        let (log, tmp, guard) = isolated_logger();
        let log = Arc::new(log);
        let buf = BufferedLog::new(Arc::clone(&log));
        (log, buf, tmp, guard)
    }

    fn file_contents(log: &Logger) -> String {
        fs::read_to_string(log.log_path().expect("log path")).unwrap()
    }

    #[test]
    fn outcomes_bypass_the_buffer() {
        let (log, buf, _tmp, _guard) = buffered();
        buf.record_task("Install vim", TaskStatus::Unchanged, None);
        assert_eq!(log.task_entries()[0].status, TaskStatus::Unchanged);
    }

    #[test]
    fn nothing_is_written_before_flush() {
        let (log, buf, _tmp, _guard) = buffered();
        let marker = format!("held-{}", std::process::id());
        buf.info(&marker);
        assert!(!file_contents(&log).contains(&marker));
        buf.flush();
        assert!(file_contents(&log).contains(&marker));
    }

    #[test]
    fn replay_keeps_order_and_kind() {
        let (log, buf, _tmp, _guard) = buffered();
        buf.stage("Install vim");
        buf.dry_run("would link ~/.vimrc");
        buf.warn("no sudo password given");
        buf.error("start script failed");
        buf.flush();
        let contents = file_contents(&log);
        let stage = contents.find("==> Install vim").expect("stage");
        let dry = contents.find("[dry run] would link").expect("dry run");
        let warn = contents.find("[warn] no sudo").expect("warn");
        let error = contents.find("[error] start script").expect("error");
        assert!(stage < dry && dry < warn && warn < error);
    }

    #[test]
    fn flushing_twice_replays_once() {
        let (log, buf, _tmp, _guard) = buffered();
        buf.info("copied ~/.gitconfig");
        buf.flush();
        buf.flush();
        assert_eq!(file_contents(&log).matches("copied ~/.gitconfig").count(), 1);
    }

    #[test]
    #[allow(clippy::significant_drop_tightening)]
    fn completion_leaves_other_modules_on_the_status_line() {
        let (log, buf, _tmp, _guard) = buffered();
        log.notify_task_start("Install vim");
        log.notify_task_start("Install zsh");
        buf.flush_and_complete("Install vim");
        let status = log.status_line();
        assert_eq!(status.running(), ["Install zsh".to_string()]);
    }
}
