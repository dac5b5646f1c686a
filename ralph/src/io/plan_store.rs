//! Reading plan files and writing checkbox changes back.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::plan::{PlanDocument, TaskStatus, parse, update_status};
use crate::error::LoopError;

/// Read and parse a plan file. A missing file is [`LoopError::PlanNotFound`].
pub fn read_plan(path: &Path) -> Result<PlanDocument> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let plan = parse(&contents);
            debug!(
                path = %path.display(),
                tasks = plan.tasks.len(),
                completed = plan.progress().completed,
                "plan parsed"
            );
            Ok(plan)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Err(LoopError::PlanNotFound {
            path: path.to_path_buf(),
        }
        .into()),
        Err(err) => Err(err).with_context(|| format!("read plan {}", path.display())),
    }
}

/// Set the status of task `number` in the plan file on disk.
///
/// Re-reads the file so hand edits made while the agent worked are kept.
/// Returns the task's id when the file changed, `None` when the task was
/// already in that state or no longer exists.
pub fn set_task_status(path: &Path, number: usize, status: TaskStatus) -> Result<Option<String>> {
    let plan = read_plan(path)?;
    let Some(task) = plan.task_by_number(number) else {
        warn!(path = %path.display(), number, "task no longer present in plan");
        return Ok(None);
    };
    if task.status == status {
        debug!(task_id = %task.id, status = status.as_str(), "task already in requested state");
        return Ok(None);
    }
    let updated = update_status(&plan.raw_content, &task.id, &plan.tasks, status);
    fs::write(path, &updated).with_context(|| format!("write plan {}", path.display()))?;
    debug!(task_id = %task.id, status = status.as_str(), "task status written");
    Ok(Some(task.id.clone()))
}
