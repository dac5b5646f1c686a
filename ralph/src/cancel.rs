//! Cancelling the active loop.
//!
//! Cancellation is deletion of the state file. An idle signal that arrives
//! afterwards finds no state and does nothing.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::types::LoopState;
use crate::io::paths::RalphPaths;
use crate::io::state_store::{delete_state, load_state};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The loop described by `state` was stopped.
    Cancelled { state: Box<LoopState> },
    /// No loop was active. Not an error.
    NothingToCancel,
}

/// Stop the active loop, if any. Safe to call repeatedly.
///
/// An unreadable state file is removed too, and reported as nothing to
/// cancel.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn cancel_loop(root: &Path) -> Result<CancelOutcome> {
    let paths = RalphPaths::new(root);
    let state = load_state(&paths.state_path);
    let removed = delete_state(&paths.state_path)?;
    match state {
        Some(state) => {
            info!(
                mode = state.mode.as_str(),
                iteration = state.iteration,
                "loop cancelled"
            );
            Ok(CancelOutcome::Cancelled {
                state: Box::new(state),
            })
        }
        None => {
            info!(removed, "no active loop to cancel");
            Ok(CancelOutcome::NothingToCancel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::start::{StartOptions, start_plan_loop};
    use crate::test_support::TestProject;

    #[test]
    fn cancel_removes_state_and_is_idempotent() {
        let project = TestProject::new().expect("project");
        project.write_plan("- [ ] one\n- [ ] two\n").expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");

        match cancel_loop(project.root()).expect("cancel") {
            CancelOutcome::Cancelled { state } => assert_eq!(state.current_task_num, Some(1)),
            other => panic!("expected cancel, got {other:?}"),
        }
        assert!(!project.paths().state_path.exists());
        assert_eq!(
            cancel_loop(project.root()).expect("cancel again"),
            CancelOutcome::NothingToCancel
        );
        assert_eq!(
            project.read("PLAN.md").expect("plan"),
            "- [ ] one\n- [ ] two\n"
        );
    }

    #[test]
    fn corrupt_state_is_cleared() {
        let project = TestProject::new().expect("project");
        project
            .write(".ralph/state/loop.json", "garbage")
            .expect("state");
        assert_eq!(
            cancel_loop(project.root()).expect("cancel"),
            CancelOutcome::NothingToCancel
        );
        assert!(!project.paths().state_path.exists());
    }
}
