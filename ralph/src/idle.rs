//! Orchestration for the host's "session idle" signal.
//!
//! One call handles one signal to completion:
//!
//! 1. Load the persisted state; no state means no loop and nothing to do.
//! 2. Resolve the session id and persist a newly observed one.
//! 3. Gather observations for the active mode (mark the current task
//!    complete, commit, re-parse the plan, scan the transcript).
//! 4. Ask `core::machine` for a [`Decision`] and apply it: delete the state
//!    and notify on stop; persist the advanced state and send the next prompt
//!    otherwise.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::core::machine::{
    Decision, NextPrompt, StopReason, decide_direct, decide_plan, decide_single_task,
    resolve_session,
};
use crate::core::plan::{PlanDocument, TaskStatus};
use crate::core::promise::scan_recent;
use crate::core::types::{LoopMode, LoopState, NoticeLevel};
use crate::error::LoopError;
use crate::io::committer::{CommitOutcome, commit_task};
use crate::io::config::RalphConfig;
use crate::io::host::Host;
use crate::io::paths::RalphPaths;
use crate::io::plan_store::{read_plan, set_task_status};
use crate::io::state_store::{delete_state, load_state, write_state};
use crate::start::{project_config, task_prompt};

/// What an idle signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleOutcome {
    /// No loop was active.
    Inactive,
    /// The loop ended and its state was deleted.
    Stopped(StopReason),
    /// The loop continues at `iteration`; the next prompt was sent.
    Continued { iteration: u32, next: NextPrompt },
}

struct IdleContext<'a, H: Host> {
    paths: RalphPaths,
    config: RalphConfig,
    session_id: String,
    host: &'a H,
}

/// Handle one idle signal for the project at `root`.
///
/// `event_session` is the session id carried by the signal, if any. Without
/// one and without a persisted id the signal fails with
/// [`LoopError::NoSessionIdentifier`] and the state stays as it was, so a
/// later signal that carries an id can proceed.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn handle_idle(root: &Path, event_session: Option<&str>, host: &impl Host) -> Result<IdleOutcome> {
    let paths = RalphPaths::new(root);
    let Some(mut state) = load_state(&paths.state_path) else {
        debug!("no active loop; ignoring idle signal");
        return Ok(IdleOutcome::Inactive);
    };

    let Some(session_id) = resolve_session(event_session, &state) else {
        error!(
            mode = state.mode.as_str(),
            iteration = state.iteration,
            "idle signal without a session id; loop left active"
        );
        return Err(LoopError::NoSessionIdentifier.into());
    };
    if state.session_id.as_deref() != Some(session_id.as_str()) {
        debug!(session_id = %session_id, "recording session id");
        state.session_id = Some(session_id.clone());
        write_state(&paths.state_path, &state)?;
    }

    let config = project_config(&paths)?;
    let ctx = IdleContext {
        paths,
        config,
        session_id,
        host,
    };
    info!(
        mode = state.mode.as_str(),
        iteration = state.iteration,
        "handling idle signal"
    );

    match state.mode {
        LoopMode::SingleTask => idle_single_task(&ctx, &state),
        LoopMode::Loop => idle_plan_loop(&ctx, &state),
        LoopMode::LegacyDirect => idle_direct(&ctx, &state),
    }
}

/// Mark the task done without committing; always terminal.
fn idle_single_task<H: Host>(ctx: &IdleContext<'_, H>, state: &LoopState) -> Result<IdleOutcome> {
    if let Some(number) = state.current_task_num {
        let plan_path = plan_path(ctx, state);
        if let Err(err) = set_task_status(&plan_path, number, TaskStatus::Completed) {
            warn!(error = %format!("{err:#}"), "could not mark single task complete");
        }
    }
    apply(ctx, decide_single_task(state), None)
}

fn idle_plan_loop<H: Host>(ctx: &IdleContext<'_, H>, state: &LoopState) -> Result<IdleOutcome> {
    let plan_path = plan_path(ctx, state);

    if let Some(number) = state.current_task_num {
        set_task_status(&plan_path, number, TaskStatus::Completed)?;
    }
    let plan = read_plan(&plan_path)?;

    if let Some(number) = state.current_task_num
        && ctx.config.commit.enabled
    {
        match plan.task_by_number(number) {
            Some(task) => {
                let outcome = commit_task(
                    &ctx.paths.root,
                    &ctx.config.commit.scope,
                    number,
                    &task.title,
                    Duration::from_secs(ctx.config.commit.timeout_secs),
                );
                let level = match outcome {
                    CommitOutcome::Committed { .. } => NoticeLevel::Info,
                    CommitOutcome::Skipped { .. } | CommitOutcome::Failed { .. } => {
                        NoticeLevel::Warn
                    }
                };
                ctx.host.notify(level, &outcome.describe())?;
            }
            None => warn!(number, "current task missing from plan; not committing"),
        }
    }

    let satisfied = promise_satisfied(ctx, state);
    apply(ctx, decide_plan(state, &plan, satisfied), Some(&plan))
}

fn idle_direct<H: Host>(ctx: &IdleContext<'_, H>, state: &LoopState) -> Result<IdleOutcome> {
    let satisfied = promise_satisfied(ctx, state);
    apply(ctx, decide_direct(state, satisfied), None)
}

/// Whether the loop's promise appears in the recent transcript. A transcript
/// that cannot be fetched counts as not satisfied.
fn promise_satisfied<H: Host>(ctx: &IdleContext<'_, H>, state: &LoopState) -> bool {
    let Some(promise) = state.completion_promise.as_deref() else {
        return false;
    };
    match ctx.host.messages(&ctx.session_id) {
        Ok(messages) => {
            let found = scan_recent(&messages, promise, ctx.config.transcript_window);
            debug!(promise, found = ?found, "scanned transcript for promise");
            found.is_some()
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "could not read session messages; promise not checked");
            false
        }
    }
}

fn apply<H: Host>(
    ctx: &IdleContext<'_, H>,
    decision: Decision,
    plan: Option<&PlanDocument>,
) -> Result<IdleOutcome> {
    match decision {
        Decision::Stop(reason) => {
            delete_state(&ctx.paths.state_path)?;
            info!(success = reason.is_success(), reason = %reason.message(), "loop stopped");
            ctx.host.notify(reason.notice_level(), &reason.message())?;
            Ok(IdleOutcome::Stopped(reason))
        }
        Decision::Continue { state, next } => {
            let (notice, text) = match next {
                NextPrompt::Task(number) => {
                    let plan = plan.context("plan required to prompt for the next task")?;
                    let task = plan
                        .task_by_number(number)
                        .with_context(|| format!("task {number} missing from plan"))?;
                    let plan_file = state
                        .plan_file
                        .clone()
                        .unwrap_or_else(|| ctx.config.plan_file.clone());
                    let text = task_prompt(&ctx.paths, plan, task, &state, &plan_file)?;
                    let progress = plan.progress();
                    let notice = format!(
                        "Task {number}/{}: {} ({progress} complete)",
                        progress.total,
                        task.plain_title()
                    );
                    (notice, text)
                }
                NextPrompt::Resend => (iteration_notice(&state), state.prompt.clone()),
            };

            write_state(&ctx.paths.state_path, &state)?;
            info!(iteration = state.iteration, next = ?next, "loop continues");
            ctx.host.notify(NoticeLevel::Info, &notice)?;
            ctx.host.send_prompt(&ctx.session_id, &text)?;
            Ok(IdleOutcome::Continued {
                iteration: state.iteration,
                next,
            })
        }
    }
}

fn iteration_notice(state: &LoopState) -> String {
    if state.max_iterations > 0 {
        format!("Iteration {}/{}", state.iteration, state.max_iterations)
    } else {
        format!("Iteration {}", state.iteration)
    }
}

fn plan_path<H: Host>(ctx: &IdleContext<'_, H>, state: &LoopState) -> PathBuf {
    let plan_file = state.plan_file.as_deref().unwrap_or(&ctx.config.plan_file);
    ctx.paths.resolve(plan_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Message;
    use crate::io::host::HostCommand;
    use crate::io::state_store::read_state;
    use crate::start::{DirectOptions, StartOptions, start_direct, start_plan_loop, start_single_task};
    use crate::test_support::{RecordingHost, TestProject};

    const PLAN: &str = "\
# Plan
- [ ] A
- [x] B
- [ ] C
";

    fn state_of(project: &TestProject) -> Option<LoopState> {
        read_state(&project.paths().state_path).expect("read state")
    }

    #[test]
    fn inactive_is_a_no_op() {
        let project = TestProject::new().expect("project");
        let host = RecordingHost::new();
        let outcome = handle_idle(project.root(), Some("ses_1"), &host).expect("idle");
        assert_eq!(outcome, IdleOutcome::Inactive);
        assert!(host.commands().is_empty());
    }

    #[test]
    fn missing_session_leaves_state_active() {
        let project = TestProject::new().expect("project");
        project.write_plan(PLAN).expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        let before = project.read(".ralph/state/loop.json").expect("state");
        let host = RecordingHost::new();

        let err = handle_idle(project.root(), None, &host).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LoopError>(),
            Some(&LoopError::NoSessionIdentifier)
        );
        assert_eq!(project.read(".ralph/state/loop.json").expect("state"), before);
        assert_eq!(project.read("PLAN.md").expect("plan"), PLAN);
        assert!(host.commands().is_empty());

        // A later signal that carries the id proceeds and records it.
        let outcome = handle_idle(project.root(), Some("ses_7"), &host).expect("idle");
        assert!(matches!(outcome, IdleOutcome::Continued { iteration: 2, .. }));
        assert_eq!(
            state_of(&project).and_then(|s| s.session_id).as_deref(),
            Some("ses_7")
        );
    }

    #[test]
    fn persisted_session_is_used_when_event_has_none() {
        let project = TestProject::new().expect("project");
        project.write_plan(PLAN).expect("plan");
        let opts = StartOptions {
            session_id: Some("ses_start".to_string()),
            ..StartOptions::default()
        };
        start_plan_loop(project.root(), &opts).expect("start");
        let host = RecordingHost::new();

        handle_idle(project.root(), None, &host).expect("idle");
        let prompts = host.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "ses_start");
        assert!(prompts[0].1.contains("<task number=\"3\" of=\"3\">"));
    }

    #[test]
    fn single_task_marks_done_without_commit_and_stops() {
        let project = TestProject::with_git().expect("project");
        project.write_plan(PLAN).expect("plan");
        project.git(&["add", "-A"]).expect("add");
        project.git(&["commit", "-q", "-m", "plan"]).expect("commit");
        start_single_task(project.root(), &"C".parse().expect("selector"), None, Some("s"))
            .expect("start");
        let host = RecordingHost::new();

        let outcome = handle_idle(project.root(), None, &host).expect("idle");
        assert_eq!(
            outcome,
            IdleOutcome::Stopped(StopReason::SingleTaskComplete { task_num: Some(3) })
        );
        assert_eq!(
            project.read("PLAN.md").expect("plan"),
            "# Plan\n- [ ] A\n- [x] B\n- [x] C\n"
        );
        assert!(state_of(&project).is_none());
        assert_eq!(
            project.git_output(&["log", "--pretty=%s"]).lines().count(),
            2,
            "single-task mode never commits"
        );
        assert_eq!(
            host.commands(),
            vec![HostCommand::Notice {
                level: NoticeLevel::Info,
                message: "Task 3 complete. Single-task run finished.".to_string(),
            }]
        );
    }

    #[test]
    fn loop_commits_and_advances_past_checked_tasks() {
        let project = TestProject::with_git().expect("project");
        project.write_plan(PLAN).expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        project.write("src/a.rs", "// a\n").expect("work");
        let host = RecordingHost::new();

        let outcome = handle_idle(project.root(), Some("ses_1"), &host).expect("idle");
        assert_eq!(
            outcome,
            IdleOutcome::Continued {
                iteration: 2,
                next: NextPrompt::Task(3)
            }
        );
        assert_eq!(
            project.git_output(&["log", "-1", "--pretty=%s"]).trim(),
            "ralph: task 1 - A"
        );
        let state = state_of(&project).expect("state");
        assert_eq!(state.current_task_num, Some(3));
        assert_eq!(state.current_task_id.as_deref(), Some("task-3"));

        let notices = host.notices();
        assert_eq!(notices[0], (NoticeLevel::Info, "Committed: ralph: task 1 - A".to_string()));
        assert_eq!(notices[1], (NoticeLevel::Info, "Task 3/3: C (2/3 complete)".to_string()));
    }

    #[test]
    fn commit_problems_do_not_block_advancement() {
        let project = TestProject::new().expect("project");
        project.write_plan(PLAN).expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        let host = RecordingHost::new();

        let outcome = handle_idle(project.root(), Some("ses_1"), &host).expect("idle");
        assert!(matches!(outcome, IdleOutcome::Continued { iteration: 2, .. }));
        let (level, message) = &host.notices()[0];
        assert_eq!(*level, NoticeLevel::Warn);
        assert!(message.starts_with("Could not commit:"), "{message}");
    }

    #[test]
    fn disabled_commits_send_no_commit_notice() {
        let project = TestProject::new().expect("project");
        project.write_plan(PLAN).expect("plan");
        project
            .write(".ralph/config.toml", "[commit]\nenabled = false\n")
            .expect("config");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        let host = RecordingHost::new();

        handle_idle(project.root(), Some("ses_1"), &host).expect("idle");
        assert!(
            host.notices()
                .iter()
                .all(|(_, message)| !message.contains("commit"))
        );
    }

    #[test]
    fn promise_in_transcript_stops_plan_loop() {
        let project = TestProject::new().expect("project");
        project
            .write_plan("completion_promise: DONE\n- [ ] A\n- [ ] B\n")
            .expect("plan");
        project
            .write(".ralph/config.toml", "[commit]\nenabled = false\n")
            .expect("config");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        let host = RecordingHost::new();
        host.set_messages(vec![
            Message::user("go"),
            Message::assistant("finished <promise>DONE</promise>"),
        ]);

        let outcome = handle_idle(project.root(), Some("s"), &host).expect("idle");
        assert_eq!(
            outcome,
            IdleOutcome::Stopped(StopReason::PromiseSatisfied {
                promise: "DONE".to_string()
            })
        );
        assert!(state_of(&project).is_none());
        assert_eq!(
            project.read("PLAN.md").expect("plan"),
            "completion_promise: DONE\n- [x] A\n- [ ] B\n"
        );
    }

    #[test]
    fn unreadable_transcript_counts_as_unsatisfied() {
        let project = TestProject::new().expect("project");
        project
            .write_plan("completion_promise: DONE\n- [ ] A\n- [ ] B\n")
            .expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        let host = RecordingHost::new();
        host.fail_messages();

        let outcome = handle_idle(project.root(), Some("s"), &host).expect("idle");
        assert!(matches!(outcome, IdleOutcome::Continued { iteration: 2, .. }));
    }

    #[test]
    fn missing_plan_leaves_state_unchanged() {
        let project = TestProject::new().expect("project");
        project.write_plan(PLAN).expect("plan");
        start_plan_loop(project.root(), &StartOptions::default()).expect("start");
        std::fs::remove_file(project.path("PLAN.md")).expect("remove plan");
        let host = RecordingHost::new();

        let err = handle_idle(project.root(), Some("ses_1"), &host).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoopError>(),
            Some(LoopError::PlanNotFound { .. })
        ));
        let state = state_of(&project).expect("still active");
        assert_eq!(state.iteration, 1);
        assert_eq!(state.current_task_num, Some(1));
    }

    #[test]
    fn direct_mode_resends_prompt_until_budget_is_spent() {
        let project = TestProject::new().expect("project");
        start_direct(
            project.root(),
            &DirectOptions {
                prompt: "keep going".to_string(),
                max_iterations: Some(2),
                completion_promise: Some("DONE".to_string()),
                session_id: Some("s".to_string()),
            },
        )
        .expect("start");
        let host = RecordingHost::new();

        let first = handle_idle(project.root(), None, &host).expect("idle 1");
        assert_eq!(
            first,
            IdleOutcome::Continued {
                iteration: 2,
                next: NextPrompt::Resend
            }
        );
        assert_eq!(host.prompts(), vec![("s".to_string(), "keep going".to_string())]);

        let second = handle_idle(project.root(), None, &host).expect("idle 2");
        assert_eq!(
            second,
            IdleOutcome::Stopped(StopReason::MaxIterationsReached {
                iteration: 2,
                max_iterations: 2
            })
        );
        assert_eq!(host.notices().last().map(|(level, _)| *level), Some(NoticeLevel::Warn));
        assert!(state_of(&project).is_none());
    }
}
