//! Orchestration for starting a loop.
//!
//! Every start refuses to run while a readable loop state exists. The check
//! and the write that follows are not atomic across processes: two starts
//! racing in the same project can both succeed, and the last write wins.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::core::plan::{PlanDocument, Task, TaskSelector, find_task};
use crate::core::types::{LoopMode, LoopState};
use crate::error::LoopError;
use crate::io::config::{RalphConfig, load_config};
use crate::io::paths::RalphPaths;
use crate::io::plan_store::read_plan;
use crate::io::project::detect_verify_command;
use crate::io::prompt::{TaskPromptInputs, render_task_prompt};
use crate::io::state_store::{load_state, write_state};

/// Caller overrides for a plan-driven start. `None` falls back to config or
/// to the plan itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub plan_file: Option<PathBuf>,
    pub max_iterations: Option<u32>,
    /// Overrides the plan's own completion promise.
    pub completion_promise: Option<String>,
    pub session_id: Option<String>,
}

/// Options for a legacy-direct start: a literal prompt resent verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectOptions {
    pub prompt: String,
    pub max_iterations: Option<u32>,
    pub completion_promise: Option<String>,
    pub session_id: Option<String>,
}

/// A freshly persisted loop and the first prompt to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub state: LoopState,
    pub prompt: String,
}

/// Start working through every pending task of the plan.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn start_plan_loop(root: &Path, opts: &StartOptions) -> Result<StartOutcome> {
    let paths = RalphPaths::new(root);
    ensure_inactive(&paths)?;
    let config = project_config(&paths)?;

    let plan_file = opts
        .plan_file
        .clone()
        .unwrap_or_else(|| config.plan_file.clone());
    let plan = load_plan_with_tasks(&paths, &plan_file)?;
    let Some(task) = plan.next_pending() else {
        return Err(all_complete(&paths, &plan_file, &plan).into());
    };

    let completion_promise = opts
        .completion_promise
        .clone()
        .or_else(|| plan.completion_promise.clone())
        .filter(|promise| !promise.trim().is_empty());

    let mut state = LoopState::new(LoopMode::Loop, Utc::now());
    state.max_iterations = opts.max_iterations.unwrap_or(config.max_iterations);
    state.completion_promise = completion_promise;
    state.session_id = opts.session_id.clone();
    state.plan_file = Some(plan_file.clone());
    state.set_current_task(task.number);

    let prompt = task_prompt(&paths, &plan, task, &state, &plan_file)?;
    ensure_ralph_gitignore(&paths.ralph_dir.join(".gitignore"))?;
    write_state(&paths.state_path, &state)?;
    info!(
        task = task.number,
        max_iterations = state.max_iterations,
        promise = ?state.completion_promise,
        "plan loop started"
    );
    Ok(StartOutcome { state, prompt })
}

/// Start a single-task run: one task, no commit, no auto-advance.
#[instrument(skip_all, fields(root = %root.display(), %selector))]
pub fn start_single_task(
    root: &Path,
    selector: &TaskSelector,
    plan_file: Option<&Path>,
    session_id: Option<&str>,
) -> Result<StartOutcome> {
    let paths = RalphPaths::new(root);
    ensure_inactive(&paths)?;
    let config = project_config(&paths)?;

    let plan_file = plan_file.map_or_else(|| config.plan_file.clone(), Path::to_path_buf);
    let plan = load_plan_with_tasks(&paths, &plan_file)?;
    let task = find_task(&plan.tasks, selector).ok_or_else(|| LoopError::TaskNotFound {
        selector: selector.to_string(),
    })?;
    if task.is_completed() {
        return Err(LoopError::TaskAlreadyCompleted {
            number: task.number,
            title: task.plain_title(),
        }
        .into());
    }

    let mut state = LoopState::new(LoopMode::SingleTask, Utc::now());
    state.max_iterations = 1;
    state.session_id = session_id.map(str::to_string);
    state.plan_file = Some(plan_file.clone());
    state.set_current_task(task.number);

    let prompt = task_prompt(&paths, &plan, task, &state, &plan_file)?;
    ensure_ralph_gitignore(&paths.ralph_dir.join(".gitignore"))?;
    write_state(&paths.state_path, &state)?;
    info!(task = task.number, "single-task run started");
    Ok(StartOutcome { state, prompt })
}

/// Start a legacy-direct loop that resends `opts.prompt` on every idle signal.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn start_direct(root: &Path, opts: &DirectOptions) -> Result<StartOutcome> {
    let paths = RalphPaths::new(root);
    ensure_inactive(&paths)?;
    let config = project_config(&paths)?;

    let mut state = LoopState::new(LoopMode::LegacyDirect, Utc::now());
    state.max_iterations = opts.max_iterations.unwrap_or(config.max_iterations);
    state.completion_promise = opts
        .completion_promise
        .clone()
        .filter(|promise| !promise.trim().is_empty());
    state.prompt = opts.prompt.clone();
    state.session_id = opts.session_id.clone();

    ensure_ralph_gitignore(&paths.ralph_dir.join(".gitignore"))?;
    write_state(&paths.state_path, &state)?;
    info!(max_iterations = state.max_iterations, "direct loop started");
    Ok(StartOutcome {
        prompt: state.prompt.clone(),
        state,
    })
}

/// Refuse to start while a readable loop state exists. An unreadable state
/// file counts as no loop and is overwritten by the new one.
fn ensure_inactive(paths: &RalphPaths) -> Result<()> {
    if let Some(existing) = load_state(&paths.state_path) {
        debug!(mode = existing.mode.as_str(), "loop already active");
        return Err(LoopError::LoopAlreadyActive {
            iteration: existing.iteration,
        }
        .into());
    }
    Ok(())
}

/// Keep loop state out of task commits: `.ralph/.gitignore` lists `state/`.
/// Existing entries are kept.
fn ensure_ralph_gitignore(path: &Path) -> Result<()> {
    const REQUIRED: &str = "state/";

    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    if existing.lines().any(|line| line.trim() == REQUIRED) {
        return Ok(());
    }

    let mut out = existing;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(REQUIRED);
    out.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, out).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), "ralph gitignore updated");
    Ok(())
}

fn load_plan_with_tasks(paths: &RalphPaths, plan_file: &Path) -> Result<PlanDocument> {
    let path = paths.resolve(plan_file);
    let plan = read_plan(&path)?;
    if plan.tasks.is_empty() {
        return Err(LoopError::NoTasksInPlan { path }.into());
    }
    Ok(plan)
}

fn all_complete(paths: &RalphPaths, plan_file: &Path, plan: &PlanDocument) -> LoopError {
    LoopError::AllTasksComplete {
        path: paths.resolve(plan_file),
        total: plan.tasks.len(),
    }
}

/// Render the prompt for `task` under the mode and promise recorded in `state`.
pub(crate) fn task_prompt(
    paths: &RalphPaths,
    plan: &PlanDocument,
    task: &Task,
    state: &LoopState,
    plan_file: &Path,
) -> Result<String> {
    let verify_command = detect_verify_command(&paths.root);
    render_task_prompt(&TaskPromptInputs {
        plan,
        task,
        plan_file,
        single_task: state.mode == LoopMode::SingleTask,
        completion_promise: state.completion_promise.as_deref(),
        verify_command: verify_command.as_deref(),
    })
    .with_context(|| format!("render prompt for task {}", task.number))
}

/// Config with a readable error when `.ralph/config.toml` is malformed.
pub(crate) fn project_config(paths: &RalphPaths) -> Result<RalphConfig> {
    load_config(&paths.config_path)
        .with_context(|| format!("load config {}", paths.config_path.display()))
}
