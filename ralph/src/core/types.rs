//! Shared types for loop controller logic.
//!
//! `LoopState` is the persisted aggregate (`.ralph/state/loop.json`); its
//! serialized form uses camelCase keys so hosts written in other languages can
//! read it directly.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of loop is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopMode {
    /// Work through every pending plan task, committing after each one.
    Loop,
    /// Work on one plan task, then stop.
    SingleTask,
    /// Resend a fixed prompt until the promise appears or the budget runs out.
    LegacyDirect,
}

impl LoopMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::SingleTask => "single-task",
            Self::LegacyDirect => "legacy-direct",
        }
    }
}

/// Persisted state of the active loop. Its presence on disk is the "active"
/// signal; termination deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    pub active: bool,
    /// 1-based iteration counter.
    pub iteration: u32,
    /// 0 means unlimited.
    pub max_iterations: u32,
    pub completion_promise: Option<String>,
    /// Literal prompt, only resent in legacy-direct mode.
    #[serde(default)]
    pub prompt: String,
    pub session_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub plan_file: Option<PathBuf>,
    pub current_task_id: Option<String>,
    pub current_task_num: Option<usize>,
    pub mode: LoopMode,
}

impl LoopState {
    /// Fresh state at iteration 1.
    pub fn new(mode: LoopMode, started_at: DateTime<Utc>) -> Self {
        Self {
            active: true,
            iteration: 1,
            max_iterations: 0,
            completion_promise: None,
            prompt: String::new(),
            session_id: None,
            started_at,
            plan_file: None,
            current_task_id: None,
            current_task_num: None,
            mode,
        }
    }

    /// True once the configured iteration budget is used up.
    pub fn max_iterations_reached(&self) -> bool {
        self.max_iterations > 0 && self.iteration >= self.max_iterations
    }

    pub fn set_current_task(&mut self, number: usize) {
        self.current_task_num = Some(number);
        self.current_task_id = Some(format!("task-{number}"));
    }
}

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// One message of the host session transcript, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub text: String,
}

impl Message {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Severity of a user-visible notice sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}
