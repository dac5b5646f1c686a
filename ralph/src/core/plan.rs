//! Markdown plan document model.
//!
//! A plan is a title, an optional overview and an ordered checkbox task list.
//! Parsing is an explicit line classifier (no regexes) so the precedence of
//! line kinds is fixed and visible:
//!
//! 1. `# Title` (first one wins)
//! 2. `completion_promise: TEXT` directive (first one wins)
//! 3. `## Section` markers (`## Overview` opens overview capture)
//! 4. checkbox items: `- [ ] title`, `3. [x] title`, `3. - [ ] title`
//! 5. continuation lines (two spaces or a tab) while a task is open
//! 6. anything else
//!
//! The parsed view is lossy, but the document keeps the exact source text and
//! write-back only ever rewrites a single checkbox glyph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Completion state of a task. Only the two glyph families the grammar can
/// express exist: `[ ]` and `[x]`/`[X]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    fn from_glyph(glyph: u8) -> Option<Self> {
        match glyph {
            b' ' => Some(Self::Pending),
            b'x' | b'X' => Some(Self::Completed),
            _ => None,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            Self::Pending => " ",
            Self::Completed => "x",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// `task-<n>`; only stable within one parse.
    pub id: String,
    /// 1-based ordinal in document order.
    pub number: usize,
    /// Title text as written, bold markers included.
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// 1-based line holding this task's checkbox.
    pub source_line: usize,
}

impl Task {
    /// Title with `**` bold markers removed.
    pub fn plain_title(&self) -> String {
        self.title.replace("**", "").trim().to_string()
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub title: String,
    pub overview: String,
    pub tasks: Vec<Task>,
    pub completion_promise: Option<String>,
    /// Exact input text.
    pub raw_content: String,
}

/// Completed vs total task counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

impl PlanDocument {
    /// Serialize back to markdown. Status changes go through [`update_status`],
    /// so this is always the source text.
    pub fn to_markdown(&self) -> &str {
        &self.raw_content
    }

    /// Lowest document-order task that is not completed.
    pub fn next_pending(&self) -> Option<&Task> {
        next_pending(&self.tasks)
    }

    pub fn task_by_number(&self, number: usize) -> Option<&Task> {
        self.tasks.iter().find(|task| task.number == number)
    }

    pub fn progress(&self) -> Progress {
        progress(&self.tasks)
    }
}

/// Lowest document-order task that is not completed. Tasks checked out of
/// order are skipped without renumbering.
pub fn next_pending(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|task| !task.is_completed())
}

pub fn progress(tasks: &[Task]) -> Progress {
    Progress {
        completed: tasks.iter().filter(|task| task.is_completed()).count(),
        total: tasks.len(),
    }
}

/// How a user names a task on the command line: `3`, `#3`, `task-3`, or a
/// fragment of its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSelector {
    Number(usize),
    Name(String),
}

impl FromStr for TaskSelector {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let numeric = trimmed
            .strip_prefix("task-")
            .or_else(|| trimmed.strip_prefix('#'))
            .unwrap_or(trimmed);
        match numeric.parse::<usize>() {
            Ok(number) => Ok(Self::Number(number)),
            Err(_) => Ok(Self::Name(trimmed.to_string())),
        }
    }
}

impl fmt::Display for TaskSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Find a task by number, or by name: an exact case-insensitive title match
/// wins over the first title containing the name.
pub fn find_task<'a>(tasks: &'a [Task], selector: &TaskSelector) -> Option<&'a Task> {
    match selector {
        TaskSelector::Number(number) => tasks.iter().find(|task| task.number == *number),
        TaskSelector::Name(name) => {
            let needle = name.to_lowercase();
            if needle.is_empty() {
                return None;
            }
            tasks
                .iter()
                .find(|task| task.plain_title().to_lowercase() == needle)
                .or_else(|| {
                    tasks
                        .iter()
                        .find(|task| task.plain_title().to_lowercase().contains(&needle))
                })
        }
    }
}

/// Classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind<'a> {
    Title(&'a str),
    Promise(&'a str),
    Section(&'a str),
    Checkbox(Checkbox<'a>),
    Continuation(&'a str),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Checkbox<'a> {
    /// Byte offset of the glyph between the brackets.
    glyph_offset: usize,
    status: TaskStatus,
    title: &'a str,
}

fn classify(line: &str) -> LineKind<'_> {
    if let Some(title) = line.strip_prefix("# ") {
        return LineKind::Title(title.trim());
    }
    if let Some(value) = promise_directive(line) {
        return LineKind::Promise(value);
    }
    if let Some(heading) = line.strip_prefix("## ") {
        return LineKind::Section(heading.trim());
    }
    if let Some(checkbox) = checkbox(line) {
        return LineKind::Checkbox(checkbox);
    }
    if line.starts_with("  ") || line.starts_with('\t') {
        return LineKind::Continuation(line.trim());
    }
    LineKind::Other
}

fn promise_directive(line: &str) -> Option<&str> {
    let (key, value) = line.trim().split_once(':')?;
    let key = key.trim();
    if !key.eq_ignore_ascii_case("completion_promise")
        && !key.eq_ignore_ascii_case("completion-promise")
    {
        return None;
    }
    Some(unquote(value.trim()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].trim();
        }
    }
    value
}

fn checkbox(line: &str) -> Option<Checkbox<'_>> {
    let rest = strip_list_marker(line)?;
    let bytes = rest.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'[' || bytes[2] != b']' {
        return None;
    }
    let status = TaskStatus::from_glyph(bytes[1])?;
    let after = &rest[3..];
    if !after.starts_with([' ', '\t']) {
        return None;
    }
    let title = after.trim();
    if title.is_empty() {
        return None;
    }
    Some(Checkbox {
        glyph_offset: line.len() - rest.len() + 1,
        status,
        title,
    })
}

/// Strip `-`, `<digits>.` or `<digits>. -` plus the spaces that follow.
fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('-') {
        return strip_spaces(rest);
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = strip_spaces(line[digits..].strip_prefix('.')?)?;
    if let Some(after_dash) = rest.strip_prefix('-').and_then(strip_spaces) {
        return Some(after_dash);
    }
    Some(rest)
}

fn strip_spaces(s: &str) -> Option<&str> {
    let stripped = s.trim_start_matches(' ');
    (stripped.len() < s.len()).then_some(stripped)
}

struct OpenTask {
    number: usize,
    title: String,
    status: TaskStatus,
    source_line: usize,
    description: Vec<String>,
}

impl OpenTask {
    fn close(self) -> Task {
        Task {
            id: format!("task-{}", self.number),
            number: self.number,
            title: self.title,
            description: self.description.join("\n"),
            status: self.status,
            source_line: self.source_line,
        }
    }
}

/// Parse plan markdown. Never fails; unrecognized lines only live on in
/// `raw_content`.
pub fn parse(text: &str) -> PlanDocument {
    let mut title: Option<String> = None;
    let mut completion_promise: Option<String> = None;
    let mut overview: Vec<&str> = Vec::new();
    let mut in_overview = false;
    let mut tasks: Vec<Task> = Vec::new();
    let mut open: Option<OpenTask> = None;

    for (idx, line) in text.lines().enumerate() {
        match classify(line) {
            LineKind::Title(heading) if title.is_none() => {
                title = Some(heading.to_string());
            }
            LineKind::Promise(value) if completion_promise.is_none() && !value.is_empty() => {
                completion_promise = Some(value.to_string());
            }
            LineKind::Section(heading) => {
                // Descriptions never cross a section boundary.
                if let Some(task) = open.take() {
                    tasks.push(task.close());
                }
                in_overview = heading.eq_ignore_ascii_case("overview");
            }
            LineKind::Checkbox(checkbox) => {
                if let Some(task) = open.take() {
                    tasks.push(task.close());
                }
                open = Some(OpenTask {
                    number: tasks.len() + 1,
                    title: checkbox.title.to_string(),
                    status: checkbox.status,
                    source_line: idx + 1,
                    description: Vec::new(),
                });
            }
            LineKind::Continuation(detail) if open.is_some() => {
                if let Some(task) = open.as_mut()
                    && !detail.is_empty()
                {
                    task.description.push(detail.to_string());
                }
            }
            _ => {
                if in_overview {
                    overview.push(line.trim_end());
                }
            }
        }
    }
    if let Some(task) = open.take() {
        tasks.push(task.close());
    }

    PlanDocument {
        title: title.unwrap_or_default(),
        overview: overview.join("\n").trim().to_string(),
        tasks,
        completion_promise,
        raw_content: text.to_string(),
    }
}

/// Rewrite the checkbox glyph of one task, leaving every other byte as is.
///
/// Returns `text` unchanged when `task_id` is unknown or its source line no
/// longer holds a checkbox. A glyph already matching `new_status` (including
/// `[X]` for completed) is left alone.
pub fn update_status(text: &str, task_id: &str, tasks: &[Task], new_status: TaskStatus) -> String {
    let Some(task) = tasks.iter().find(|task| task.id == task_id) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    for (idx, segment) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == task.source_line {
            out.push_str(&rewrite_glyph(segment, new_status));
        } else {
            out.push_str(segment);
        }
    }
    out
}

fn rewrite_glyph(segment: &str, new_status: TaskStatus) -> String {
    let body = segment.strip_suffix('\n').unwrap_or(segment);
    let body = body.strip_suffix('\r').unwrap_or(body);
    let mut rewritten = segment.to_string();
    if let LineKind::Checkbox(checkbox) = classify(body)
        && checkbox.status != new_status
    {
        let offset = checkbox.glyph_offset;
        rewritten.replace_range(offset..offset + 1, new_status.glyph());
    }
    rewritten
}
