//! Read-only view of the active loop for `ralph status`.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use crate::core::plan::Progress;
use crate::core::types::{LoopMode, LoopState};
use crate::io::paths::RalphPaths;
use crate::io::plan_store::read_plan;
use crate::io::state_store::load_state;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: LoopState,
    /// Plan progress; `None` in direct mode or when the plan cannot be read.
    pub progress: Option<Progress>,
    pub current_task_title: Option<String>,
}

/// Describe the active loop, or `None` when no loop is active.
pub fn loop_status(root: &Path) -> Result<Option<StatusReport>> {
    let paths = RalphPaths::new(root);
    let Some(state) = load_state(&paths.state_path) else {
        return Ok(None);
    };

    let mut report = StatusReport {
        progress: None,
        current_task_title: None,
        state,
    };
    if let Some(plan_file) = &report.state.plan_file {
        match read_plan(&paths.resolve(plan_file)) {
            Ok(plan) => {
                report.progress = Some(plan.progress());
                report.current_task_title = report
                    .state
                    .current_task_num
                    .and_then(|number| plan.task_by_number(number))
                    .map(|task| task.plain_title());
            }
            Err(err) => warn!(error = %format!("{err:#}"), "plan unreadable; status without progress"),
        }
    }
    Ok(Some(report))
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.state;
        writeln!(f, "mode: {}", state.mode.as_str())?;
        if state.max_iterations > 0 {
            writeln!(f, "iteration: {}/{}", state.iteration, state.max_iterations)?;
        } else {
            writeln!(f, "iteration: {} (unlimited)", state.iteration)?;
        }
        if let Some(plan_file) = &state.plan_file {
            writeln!(f, "plan: {}", plan_file.display())?;
        }
        if let Some(number) = state.current_task_num {
            match &self.current_task_title {
                Some(title) => writeln!(f, "task: {number} - {title}")?,
                None => writeln!(f, "task: {number}")?,
            }
        }
        if let Some(progress) = self.progress {
            writeln!(f, "progress: {progress}")?;
        }
        if let Some(promise) = &state.completion_promise {
            writeln!(f, "promise: {promise}")?;
        }
        if state.mode == LoopMode::LegacyDirect {
            writeln!(f, "prompt: {}", state.prompt)?;
        }
        if let Some(session) = &state.session_id {
            writeln!(f, "session: {session}")?;
        }
        write!(f, "started: {}", state.started_at.to_rfc3339())
    }
}
