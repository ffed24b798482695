//! Clone and fast-forward the dotfiles repository.
//!
//! [`Vcs`] is the seam the `download` and `update` commands talk to;
//! [`Git2Vcs`] implements it with libgit2.  Transfer progress is reported to
//! a [`ProgressSink`] as `(received, total)` object counts that never move
//! backwards.
use std::cell::Cell;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{ErrorClass, ErrorCode, FetchOptions, RemoteCallbacks, Repository};
use thiserror::Error;

/// Errors from cloning or updating the dotfiles repository.
#[derive(Error, Debug)]
pub enum GitError {
    /// Local edits would be overwritten by the incoming changes.
    #[error("local changes would be overwritten by the update; commit or stash them first")]
    LocalChanges,

    /// The remote could not be contacted.
    #[error("remote repository is unreachable: {message}")]
    RemoteUnreachable {
        /// libgit2 message.
        message: String,
    },

    /// The local directory already holds a repository.
    #[error("{} is already cloned", .0.display())]
    AlreadyCloned(PathBuf),

    /// The local directory holds no repository.
    #[error("{} is not a clone; run `dotmodules download` first", .0.display())]
    NotCloned(PathBuf),

    /// The local branch has commits the remote does not.
    #[error("local branch '{0}' has diverged from its remote and cannot be fast-forwarded")]
    Diverged(String),

    /// Any other libgit2 failure.
    #[error("git error: {message}")]
    Git {
        /// libgit2 message.
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(e: git2::Error) -> Self {
        let message = e.message().to_string();
        match (e.class(), e.code()) {
            (_, ErrorCode::Conflict) | (ErrorClass::Checkout, ErrorCode::Modified) => {
                Self::LocalChanges
            }
            (ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh | ErrorClass::Ssl, _)
            | (_, ErrorCode::Auth | ErrorCode::Certificate) => Self::RemoteUnreachable { message },
            _ => Self::Git { message },
        }
    }
}

/// Receives transfer progress as `(current, total)` counts.
pub trait ProgressSink {
    /// Report that `current` of `total` objects have been received.
    fn progress(&self, current: usize, total: usize);
}

/// Result of a successful pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The local branch already matched the remote.
    UpToDate,
    /// The local branch was fast-forwarded.
    Updated,
}

/// Version-control operations on the dotfiles repository.
#[cfg_attr(test, mockall::automock)]
pub trait Vcs {
    /// Clone `remote` into `local`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::AlreadyCloned`] if `local` already holds a
    /// repository, or the mapped libgit2 failure.
    fn clone_repo(&self, remote: &str, local: &Path, sink: &dyn ProgressSink) -> Result<(), GitError>;

    /// Fast-forward the current branch of `local` to its remote.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::NotCloned`] if `local` holds no repository,
    /// [`GitError::LocalChanges`] if the checkout would clobber edits, or
    /// the mapped libgit2 failure.
    fn pull(&self, local: &Path, sink: &dyn ProgressSink) -> Result<PullOutcome, GitError>;
}

/// [`Vcs`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Vcs;

impl Vcs for Git2Vcs {
    fn clone_repo(&self, remote: &str, local: &Path, sink: &dyn ProgressSink) -> Result<(), GitError> {
        if Repository::open(local).is_ok() {
            return Err(GitError::AlreadyCloned(local.to_path_buf()));
        }
        let progress = Monotonic::new(sink);
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options(&progress));
        builder.clone(remote, local)?;
        tracing::debug!("cloned {remote} into {}", local.display());
        Ok(())
    }

    fn pull(&self, local: &Path, sink: &dyn ProgressSink) -> Result<PullOutcome, GitError> {
        let repo =
            Repository::open(local).map_err(|_| GitError::NotCloned(local.to_path_buf()))?;
        let head = repo.head()?;
        let branch = head
            .shorthand()
            .filter(|_| head.is_branch())
            .ok_or_else(|| GitError::Git {
                message: "HEAD is detached".to_string(),
            })?
            .to_string();

        let progress = Monotonic::new(sink);
        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&[branch.as_str()], Some(&mut fetch_options(&progress)), None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let incoming = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&incoming])?;
        if analysis.is_up_to_date() {
            return Ok(PullOutcome::UpToDate);
        }
        if !analysis.is_fast_forward() {
            return Err(GitError::Diverged(branch));
        }

        let target = repo.find_object(incoming.id(), None)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        let refname = format!("refs/heads/{branch}");
        repo.find_reference(&refname)?
            .set_target(incoming.id(), "dotmodules: fast-forward")?;
        repo.set_head(&refname)?;
        tracing::debug!("fast-forwarded {branch} to {}", incoming.id());
        Ok(PullOutcome::Updated)
    }
}

fn fetch_options<'a>(progress: &'a Monotonic<'a>) -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |stats| {
        progress.report(stats.received_objects(), stats.total_objects());
        true
    });
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

/// Forwards only reports that do not move backwards.
pub struct Monotonic<'a> {
    sink: &'a dyn ProgressSink,
    last: Cell<Option<(usize, usize)>>,
}

impl<'a> Monotonic<'a> {
    /// Wrap `sink`.
    #[must_use]
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: Cell::new(None),
        }
    }

    /// Forward `(current, total)` unless it repeats or regresses the last
    /// forwarded report.
    pub fn report(&self, current: usize, total: usize) {
        let advanced = self
            .last
            .get()
            .is_none_or(|(c, t)| current >= c && total >= t && (current, total) != (c, t));
        if advanced {
            self.last.set(Some((current, total)));
            self.sink.progress(current, total);
        }
    }
}

impl std::fmt::Debug for Monotonic<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monotonic")
            .field("last", &self.last.get())
            .finish_non_exhaustive()
    }
}

/// Single rewritten terminal line showing transfer progress.
#[derive(Debug)]
pub struct ConsoleProgress {
    label: String,
    drawn: Cell<bool>,
}

impl ConsoleProgress {
    /// Progress line prefixed with `label`.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            drawn: Cell::new(false),
        }
    }

    /// End the progress line, if one was drawn.
    pub fn finish(&self) {
        if self.drawn.replace(false) {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out);
            let _ = out.flush();
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn progress(&self, current: usize, total: usize) {
        let line = render_progress(&self.label, current, total);
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{line}");
        let _ = out.flush();
        self.drawn.set(true);
    }
}

/// `label [#####     ] 50% (5/10)`, sized to the terminal.
fn render_progress(label: &str, current: usize, total: usize) -> String {
    let percent = if total == 0 {
        0
    } else {
        current.min(total).saturating_mul(100) / total
    };
    let counts = format!("{percent:>3}% ({current}/{total})");
    let room = crate::logging::terminal_columns()
        .saturating_sub(label.len() + counts.len() + 4)
        .min(40);
    let filled = room.saturating_mul(percent) / 100;
    format!(
        "{label} [{}{}] {counts}",
        "#".repeat(filled),
        " ".repeat(room - filled)
    )
}
