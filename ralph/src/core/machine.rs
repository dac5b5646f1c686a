//! Loop transition rules.
//!
//! Each idle signal is one transition `(LoopState, observations) -> Decision`.
//! Observations (the plan re-parsed after the current task was marked done,
//! whether the completion promise was seen) are gathered by the caller; these
//! functions only decide. Applying a decision (persist or delete state, send
//! the next prompt, notify) is the caller's job.

use crate::core::plan::PlanDocument;
use crate::core::types::{LoopState, NoticeLevel};

/// Why a loop ends. Every stop deletes the persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Single-task mode always ends after one idle signal.
    SingleTaskComplete { task_num: Option<usize> },
    /// No task left with status other than completed.
    AllTasksComplete { completed: usize, total: usize },
    /// The completion promise appeared in the recent transcript.
    PromiseSatisfied { promise: String },
    /// Iteration budget used up; the loop does not advance.
    MaxIterationsReached { iteration: u32, max_iterations: u32 },
}

impl StopReason {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::MaxIterationsReached { .. })
    }

    pub fn notice_level(&self) -> NoticeLevel {
        if self.is_success() {
            NoticeLevel::Info
        } else {
            NoticeLevel::Warn
        }
    }

    /// User-visible notice text.
    pub fn message(&self) -> String {
        match self {
            Self::SingleTaskComplete {
                task_num: Some(num),
            } => format!("Task {num} complete. Single-task run finished."),
            Self::SingleTaskComplete { task_num: None } => {
                "Single-task run finished.".to_string()
            }
            Self::AllTasksComplete { completed, total } => {
                format!("All tasks complete ({completed}/{total}). Loop finished.")
            }
            Self::PromiseSatisfied { promise } => {
                format!("Completion promise '{promise}' detected. Loop finished.")
            }
            Self::MaxIterationsReached {
                iteration,
                max_iterations,
            } => format!(
                "Max iterations reached ({iteration}/{max_iterations}). Loop stopped before finishing."
            ),
        }
    }
}

/// What to send after a continuing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPrompt {
    /// Prompt for the plan task with this 1-based number.
    Task(usize),
    /// Resend the stored literal prompt unchanged.
    Resend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Stop(StopReason),
    Continue { state: LoopState, next: NextPrompt },
}

/// Session id for an idle event: the event's own id, else the persisted one.
/// Blank ids count as missing.
pub fn resolve_session(event_session: Option<&str>, state: &LoopState) -> Option<String> {
    let non_blank = |id: &str| {
        let id = id.trim();
        (!id.is_empty()).then(|| id.to_string())
    };
    event_session
        .and_then(non_blank)
        .or_else(|| state.session_id.as_deref().and_then(non_blank))
}

/// Single-task mode: terminal after exactly one idle signal.
pub fn decide_single_task(state: &LoopState) -> Decision {
    Decision::Stop(StopReason::SingleTaskComplete {
        task_num: state.current_task_num,
    })
}

/// Plan loop mode, given the plan as re-parsed after the current task was
/// marked complete.
///
/// Order: all tasks done, promise seen, budget used up, advance.
pub fn decide_plan(state: &LoopState, plan: &PlanDocument, promise_satisfied: bool) -> Decision {
    let Some(next) = plan.next_pending() else {
        let progress = plan.progress();
        return Decision::Stop(StopReason::AllTasksComplete {
            completed: progress.completed,
            total: progress.total,
        });
    };
    if let Some(stop) = promise_or_budget_stop(state, promise_satisfied) {
        return Decision::Stop(stop);
    }

    let mut advanced = state.clone();
    advanced.iteration += 1;
    advanced.set_current_task(next.number);
    Decision::Continue {
        state: advanced,
        next: NextPrompt::Task(next.number),
    }
}

/// Legacy-direct mode: promise seen, budget used up, else resend.
pub fn decide_direct(state: &LoopState, promise_satisfied: bool) -> Decision {
    if let Some(stop) = promise_or_budget_stop(state, promise_satisfied) {
        return Decision::Stop(stop);
    }
    let mut advanced = state.clone();
    advanced.iteration += 1;
    Decision::Continue {
        state: advanced,
        next: NextPrompt::Resend,
    }
}

fn promise_or_budget_stop(state: &LoopState, promise_satisfied: bool) -> Option<StopReason> {
    if promise_satisfied && let Some(promise) = &state.completion_promise {
        return Some(StopReason::PromiseSatisfied {
            promise: promise.clone(),
        });
    }
    if state.max_iterations_reached() {
        return Some(StopReason::MaxIterationsReached {
            iteration: state.iteration,
            max_iterations: state.max_iterations,
        });
    }
    None
}
