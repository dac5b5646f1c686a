//! Domain errors surfaced by loop controller operations.
//!
//! Plumbing failures (I/O, serialization, process spawn) travel as
//! `anyhow::Error`. The variants here are the outcomes callers care about and
//! recover them with `err.downcast_ref::<LoopError>()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("plan file not found: {}", path.display())]
    PlanNotFound { path: PathBuf },

    #[error("no tasks found in {} (expected lines like `- [ ] Task title`)", path.display())]
    NoTasksInPlan { path: PathBuf },

    #[error("all {total} tasks in {} are already complete", path.display())]
    AllTasksComplete { path: PathBuf, total: usize },

    #[error("task '{selector}' not found in plan")]
    TaskNotFound { selector: String },

    #[error("task {number} ('{title}') is already completed")]
    TaskAlreadyCompleted { number: usize, title: String },

    #[error("a loop is already active (iteration {iteration}); cancel it first")]
    LoopAlreadyActive { iteration: u32 },

    /// Non-terminal: the next idle signal carrying an id can proceed.
    #[error("no session identifier on the idle event and none persisted")]
    NoSessionIdentifier,

    #[error("commit failed: {message}")]
    CommitFailed { message: String },

    #[error("{} is not inside a git work tree", path.display())]
    NotAVersionControlledTree { path: PathBuf },

    #[error("state file {} is unreadable: {reason}", path.display())]
    StateFileUnreadable { path: PathBuf, reason: String },
}

impl LoopError {
    /// Exit code used by the CLI when this error ends a command.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LoopAlreadyActive { .. }
            | Self::AllTasksComplete { .. }
            | Self::TaskAlreadyCompleted { .. } => exit_codes::REJECTED,
            _ => exit_codes::INVALID,
        }
    }
}

/// Map any command error to an exit code, looking through `anyhow` context.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<LoopError>()
        .map(LoopError::exit_code)
        .unwrap_or(exit_codes::INVALID)
}
