//! Tool-facing task commands: marking a task done by hand and checking a
//! piece of agent output for the completion promise.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::plan::{Progress, TaskSelector, TaskStatus, find_task};
use crate::core::promise::{extract_promise, is_satisfied};
use crate::error::LoopError;
use crate::io::paths::RalphPaths;
use crate::io::plan_store::{read_plan, set_task_status};
use crate::io::state_store::load_state;
use crate::start::project_config;

/// Result of `mark-complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOutcome {
    pub number: usize,
    pub title: String,
    /// False when the task was already checked.
    pub changed: bool,
    pub progress: Progress,
}

/// Check the box of the selected task in the plan file.
///
/// The plan defaults to the active loop's plan, then to the configured one.
#[instrument(skip_all, fields(root = %root.display(), %selector))]
pub fn mark_complete(
    root: &Path,
    plan_file: Option<&Path>,
    selector: &TaskSelector,
) -> Result<MarkOutcome> {
    let paths = RalphPaths::new(root);
    let plan_path = match plan_file {
        Some(plan_file) => paths.resolve(plan_file),
        None => match load_state(&paths.state_path).and_then(|state| state.plan_file) {
            Some(active) => paths.resolve(&active),
            None => paths.resolve(&project_config(&paths)?.plan_file),
        },
    };

    let plan = read_plan(&plan_path)?;
    let task = find_task(&plan.tasks, selector).ok_or_else(|| LoopError::TaskNotFound {
        selector: selector.to_string(),
    })?;
    let number = task.number;
    let title = task.plain_title();

    let changed = set_task_status(&plan_path, number, TaskStatus::Completed)?.is_some();
    let progress = read_plan(&plan_path)?.progress();
    info!(number, changed, %progress, "task marked complete");
    Ok(MarkOutcome {
        number,
        title,
        changed,
        progress,
    })
}

/// Result of `check-completion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCheck {
    /// The phrase checked against; `None` when no promise is configured.
    pub promise: Option<String>,
    /// The first `<promise>` payload found in the text.
    pub found: Option<String>,
    pub satisfied: bool,
}

/// Check `text` for the completion promise.
///
/// `promise` defaults to the active loop's promise.
pub fn check_completion(root: &Path, text: &str, promise: Option<&str>) -> CompletionCheck {
    let promise = promise.map(str::to_string).or_else(|| {
        load_state(&RalphPaths::new(root).state_path).and_then(|state| state.completion_promise)
    });
    let satisfied = promise
        .as_deref()
        .is_some_and(|target| is_satisfied(text, target));
    CompletionCheck {
        found: extract_promise(text),
        promise,
        satisfied,
    }
}
