//! Subprocess execution behind an injectable [`Executor`] seam.
use anyhow::{Context as _, Result, anyhow, bail};
use std::io::{self, Read, Write as _};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt as _;

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Whether the process was killed after exceeding its timeout.
    pub timed_out: bool,
}

impl ExecResult {
    /// Standard output followed by standard error, trimmed.
    #[must_use]
    pub fn combined_output(&self) -> String {
        let out = self.stdout.trim_end();
        let err = self.stderr.trim_end();
        match (out.is_empty(), err.is_empty()) {
            (_, true) => out.to_string(),
            (true, false) => err.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
            timed_out: false,
        }
    }
}

/// Abstraction over process spawning so resources can be tested without
/// touching the host.
pub trait Executor: Send + Sync {
    /// Run a command, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command and return its result whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Like [`run_unchecked`](Self::run_unchecked) with `dir` as the working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in `dir` (or the current directory), write `input` to
    /// its stdin, and kill it with its whole process group if it has not
    /// exited after `timeout`.  The exit status is not checked; a timed-out
    /// result carries no output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or its pipes fail.
    /// The child is killed and reaped before any error is returned.
    fn run_with_input(
        &self,
        dir: Option<&Path>,
        program: &str,
        args: &[&str],
        input: &str,
        timeout: Duration,
    ) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn run_in_unchecked(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .output()
            .with_context(|| format!("failed to execute: {program} in {}", dir.display()))?;
        Ok(ExecResult::from(output))
    }

    fn run_with_input(
        &self,
        dir: Option<&Path>,
        program: &str,
        args: &[&str],
        input: &str,
        timeout: Duration,
    ) -> Result<ExecResult> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            command.process_group(0);
        }
        let mut child = Reaper::new(
            command
                .spawn()
                .with_context(|| format!("failed to execute: {program}"))?,
        );

        let stdout = child
            .get()
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .get()
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let stdout_handle = thread::spawn(move || read_stream(stdout));
        let stderr_handle = thread::spawn(move || read_stream(stderr));

        feed_stdin(child.get(), input).with_context(|| format!("write stdin of {program}"))?;

        let waited = child
            .get()
            .wait_timeout(timeout)
            .with_context(|| format!("wait for {program}"))?;
        let Some(status) = waited else {
            let status = child
                .kill()
                .with_context(|| format!("wait for {program} after kill"))?;
            // A descendant that left the group can keep the pipes open, so
            // the readers are detached rather than joined.
            drop((stdout_handle, stderr_handle));
            return Ok(ExecResult {
                code: status.code(),
                timed_out: true,
                ..ExecResult::default()
            });
        };
        child.reaped();

        let stdout = join_output(stdout_handle)?;
        let stderr = join_output(stderr_handle)?;
        Ok(ExecResult {
            stdout,
            stderr,
            success: status.success(),
            code: status.code(),
            timed_out: false,
        })
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn read_stream(mut stream: impl Read) -> Result<String> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).context("read child output")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn join_output(handle: thread::JoinHandle<Result<String>>) -> Result<String> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

/// Write `input` and close stdin so a prompt asking again sees EOF.
///
/// A child that exits without reading closes the pipe first; its exit
/// status reports what went wrong, so the broken pipe is not an error.
fn feed_stdin(child: &mut Child, input: &str) -> io::Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Owns a spawned child until it has been waited on.
///
/// Dropping it before [`reaped`](Self::reaped) kills the child's process
/// group and waits for the leader, so no early return leaves a process
/// behind.
struct Reaper {
    child: Child,
    done: bool,
}

impl Reaper {
    const fn new(child: Child) -> Self {
        Self { child, done: false }
    }

    const fn get(&mut self) -> &mut Child {
        &mut self.child
    }

    /// The child was waited on elsewhere.
    const fn reaped(&mut self) {
        self.done = true;
    }

    fn kill(&mut self) -> io::Result<ExitStatus> {
        kill_group(&self.child);
        // Fails only when the leader already exited; `wait` still reaps it.
        let _ = self.child.kill();
        self.done = true;
        self.child.wait()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.kill();
        }
    }
}

/// SIGKILL every process in the child's group.
///
/// Members running as another user (the command behind `sudo`) refuse the
/// signal; the leader is still killed by [`Child::kill`].
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
const fn kill_group(_: &Child) {}
