//! Prompt rendering for plan tasks.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::plan::{PlanDocument, Task};

const TASK_TEMPLATE: &str = include_str!("prompts/task.md");

/// Task fields exposed to the template.
#[derive(Debug, Clone, Serialize)]
struct TaskContext {
    number: usize,
    title: String,
    description: String,
}

impl TaskContext {
    fn from_task(task: &Task) -> Self {
        Self {
            number: task.number,
            title: task.plain_title(),
            description: task.description.clone(),
        }
    }
}

/// Everything needed to render the prompt for one plan task.
#[derive(Debug, Clone, Copy)]
pub struct TaskPromptInputs<'a> {
    pub plan: &'a PlanDocument,
    pub task: &'a Task,
    /// Plan path as shown to the agent.
    pub plan_file: &'a Path,
    /// Single-task runs stop after this task and never auto-advance.
    pub single_task: bool,
    pub completion_promise: Option<&'a str>,
    pub verify_command: Option<&'a str>,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("task", TASK_TEMPLATE)
            .expect("task template should be valid");
        Self { env }
    }

    fn render_task(&self, input: &TaskPromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template("task")?;
        let rendered = template.render(context! {
            plan_file => input.plan_file.display().to_string(),
            plan_title => (!input.plan.title.is_empty()).then_some(input.plan.title.as_str()),
            overview => (!input.plan.overview.is_empty()).then_some(input.plan.overview.as_str()),
            task => TaskContext::from_task(input.task),
            progress => input.plan.progress(),
            single_task => input.single_task,
            promise => input.completion_promise.map(str::trim).filter(|s| !s.is_empty()),
            verify_command => input.verify_command,
        })?;
        Ok(rendered)
    }
}

/// Render the prompt that asks the agent to work on one plan task.
pub fn render_task_prompt(input: &TaskPromptInputs<'_>) -> Result<String> {
    let rendered = PromptEngine::new().render_task(input)?;
    Ok(rendered.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::parse;

    const PLAN: &str = "\
# Ship v2

## Overview
Rewrite the storage layer.

## Tasks
- [x] Schema
- [ ] **Migrations** - add up/down scripts
  Use sqlx.
- [ ] Docs
";

    fn render(single_task: bool, promise: Option<&str>, verify: Option<&str>) -> String {
        let plan = parse(PLAN);
        let task = &plan.tasks[1];
        render_task_prompt(&TaskPromptInputs {
            plan: &plan,
            task,
            plan_file: Path::new("PLAN.md"),
            single_task,
            completion_promise: promise,
            verify_command: verify,
        })
        .expect("render")
    }

    #[test]
    fn loop_prompt_describes_task_progress_and_promise() {
        let prompt = render(false, Some("ALL_DONE"), Some("just test"));
        assert!(prompt.starts_with("You are working through the plan `PLAN.md`"));
        assert!(prompt.contains("<plan>\nShip v2\n</plan>"));
        assert!(prompt.contains("<overview>\nRewrite the storage layer.\n</overview>"));
        assert!(prompt.contains(
            "<task number=\"2\" of=\"3\">\nMigrations - add up/down scripts\n\nUse sqlx.\n</task>"
        ));
        assert!(prompt.contains("1 of 3 tasks complete."));
        assert!(prompt.contains("`just test`"));
        assert!(prompt.contains("output exactly `<promise>ALL_DONE</promise>`"));
        assert!(prompt.contains("the next task is sent"));
        assert!(!prompt.contains("{%"));
    }

    #[test]
    fn single_task_prompt_omits_promise_and_auto_advance() {
        let prompt = render(true, None, None);
        assert!(prompt.starts_with("You are working on a single task"));
        assert!(prompt.contains("The run ends after this task."));
        assert!(!prompt.contains("<promise>"));
        assert!(!prompt.contains("Verify your work"));
        assert!(!prompt.contains("the next task is sent"));
    }
}
