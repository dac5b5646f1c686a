//! Turns a completed plan task into a git commit.
//!
//! Committing is best effort. Every problem comes back as a
//! [`CommitOutcome`] instead of an error so task bookkeeping and loop
//! advancement never depend on it.

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::commit_message::{CommitMessage, task_commit_message};
use crate::error::LoopError;
use crate::io::git::Git;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { message: CommitMessage },
    /// A precondition did not hold (not a repository, nothing to commit).
    Skipped { reason: String },
    /// Staging or committing failed.
    Failed { error: LoopError },
}

impl CommitOutcome {
    /// One-line notice for the host.
    pub fn describe(&self) -> String {
        match self {
            Self::Committed { message } => format!("Committed: {}", message.subject),
            Self::Skipped { reason } => format!("Could not commit: {reason}"),
            Self::Failed { error } => format!("Could not commit: {error}"),
        }
    }
}

/// Stage everything and commit it as task `number`.
///
/// Preconditions, in order: `root` is inside a git work tree; the tree has
/// pending changes.
#[instrument(skip_all, fields(number))]
pub fn commit_task(
    root: &Path,
    scope: &str,
    number: usize,
    raw_title: &str,
    timeout: Duration,
) -> CommitOutcome {
    let git = Git::new(root, timeout);

    match git.is_work_tree() {
        Ok(true) => {}
        Ok(false) => {
            return skipped(
                LoopError::NotAVersionControlledTree {
                    path: root.to_path_buf(),
                }
                .to_string(),
            );
        }
        Err(err) => return skipped(format!("{err:#}")),
    }
    match git.has_changes() {
        Ok(true) => {}
        Ok(false) => return skipped("no changes to commit".to_string()),
        Err(err) => return skipped(format!("{err:#}")),
    }

    let message = task_commit_message(scope, number, raw_title);
    if let Err(err) = git.add_all() {
        return failed(format!("{err:#}"));
    }
    if let Err(err) = git.commit(&message) {
        return failed(format!("{err:#}"));
    }
    let sha = git.head_short_sha(8).ok();
    info!(subject = %message.subject, sha = ?sha, "task committed");
    CommitOutcome::Committed { message }
}

fn skipped(reason: String) -> CommitOutcome {
    warn!(%reason, "task commit skipped");
    CommitOutcome::Skipped { reason }
}

fn failed(message: String) -> CommitOutcome {
    warn!(error = %message, "task commit failed");
    CommitOutcome::Failed {
        error: LoopError::CommitFailed { message },
    }
}
