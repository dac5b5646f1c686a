//! `ralph`: plan-driven re-prompt loop controller.
//!
//! Start a loop over the tasks of a markdown plan, then call `ralph idle`
//! every time the host's agent session goes idle. Host commands (prompts and
//! notices) are written to stdout as JSON lines; diagnostics go to stderr.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ralph_loop::cancel::{CancelOutcome, cancel_loop};
use ralph_loop::core::plan::TaskSelector;
use ralph_loop::error::exit_code_for;
use ralph_loop::exit_codes;
use ralph_loop::idle::handle_idle;
use ralph_loop::io::config::init_config;
use ralph_loop::io::host::{StdioHost, load_transcript};
use ralph_loop::io::paths::RalphPaths;
use ralph_loop::logging;
use ralph_loop::start::{
    DirectOptions, StartOptions, StartOutcome, start_direct, start_plan_loop, start_single_task,
};
use ralph_loop::status::loop_status;
use ralph_loop::tasks::{check_completion, mark_complete};

#[derive(Parser)]
#[command(
    name = "ralph",
    version,
    about = "Re-prompt an agent through a markdown plan until it is done"
)]
struct Cli {
    /// Project root holding the plan and `.ralph/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `.ralph/config.toml` with defaults if it is missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start a loop over every pending task of the plan; prints the first prompt.
    Start {
        /// Plan file, relative to the root (default from config: PLAN.md).
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Stop after this many iterations (0 = unlimited).
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Phrase that ends the loop when the agent outputs `<promise>PHRASE</promise>`.
        #[arg(long)]
        completion_promise: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Work on a single task (by number or name), then stop.
    RunTask {
        /// `3`, `#3`, `task-3`, or part of the task title.
        task: TaskSelector,
        #[arg(long)]
        plan: Option<PathBuf>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Resend a fixed prompt on every idle signal.
    StartDirect {
        prompt: String,
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long)]
        completion_promise: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Handle a "session idle" signal from the host.
    Idle {
        #[arg(long)]
        session_id: Option<String>,
        /// JSON array of recent session messages (`[{"role": ..., "text": ...}]`).
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// Stop the active loop.
    Cancel,
    /// Show the active loop (exit code 2 when none is active).
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Check the box of a plan task.
    MarkComplete {
        task: TaskSelector,
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// Check agent output for the completion promise; prints a JSON verdict.
    CheckCompletion {
        /// Text to check; read from stdin when omitted.
        #[arg(long)]
        text: Option<String>,
        /// Phrase to look for (default: the active loop's promise).
        #[arg(long)]
        promise: Option<String>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root.as_path();
    match cli.command {
        Command::Init { force } => {
            let paths = RalphPaths::new(root);
            if init_config(&paths.config_path, force)? {
                println!("Wrote {}", paths.config_path.display());
            } else {
                println!("{} already exists", paths.config_path.display());
            }
            Ok(exit_codes::OK)
        }
        Command::Start {
            plan,
            max_iterations,
            completion_promise,
            session_id,
        } => {
            let outcome = start_plan_loop(
                root,
                &StartOptions {
                    plan_file: plan,
                    max_iterations,
                    completion_promise,
                    session_id,
                },
            )?;
            print_started(&outcome);
            Ok(exit_codes::OK)
        }
        Command::RunTask {
            task,
            plan,
            session_id,
        } => {
            let outcome = start_single_task(root, &task, plan.as_deref(), session_id.as_deref())?;
            print_started(&outcome);
            Ok(exit_codes::OK)
        }
        Command::StartDirect {
            prompt,
            max_iterations,
            completion_promise,
            session_id,
        } => {
            let outcome = start_direct(
                root,
                &DirectOptions {
                    prompt,
                    max_iterations,
                    completion_promise,
                    session_id,
                },
            )?;
            print_started(&outcome);
            Ok(exit_codes::OK)
        }
        Command::Idle {
            session_id,
            transcript,
        } => cmd_idle(root, session_id.as_deref(), transcript.as_deref()),
        Command::Cancel => {
            match cancel_loop(root)? {
                CancelOutcome::Cancelled { state } => println!(
                    "Cancelled {} loop at iteration {}.",
                    state.mode.as_str(),
                    state.iteration
                ),
                CancelOutcome::NothingToCancel => println!("No active loop."),
            }
            Ok(exit_codes::OK)
        }
        Command::Status { json } => {
            let Some(report) = loop_status(root)? else {
                if json {
                    println!("null");
                } else {
                    println!("No active loop.");
                }
                return Ok(exit_codes::INACTIVE);
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize status")?
                );
            } else {
                println!("{report}");
            }
            Ok(exit_codes::OK)
        }
        Command::MarkComplete { task, plan } => {
            let outcome = mark_complete(root, plan.as_deref(), &task)?;
            let verb = if outcome.changed {
                "marked complete"
            } else {
                "was already complete"
            };
            println!(
                "Task {} ({}) {verb}. Progress: {}.",
                outcome.number, outcome.title, outcome.progress
            );
            Ok(exit_codes::OK)
        }
        Command::CheckCompletion { text, promise } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("read text from stdin")?;
                    buf
                }
            };
            let check = check_completion(root, &text, promise.as_deref());
            println!(
                "{}",
                serde_json::to_string(&check).context("serialize completion check")?
            );
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_idle(root: &Path, session_id: Option<&str>, transcript: Option<&Path>) -> Result<i32> {
    let messages = match transcript {
        Some(path) => load_transcript(path)?,
        None => Vec::new(),
    };
    let host = StdioHost::new(messages, io::stdout().lock());
    handle_idle(root, session_id, &host)?;
    Ok(exit_codes::OK)
}

/// The first prompt goes to stdout; a one-line summary goes to stderr.
fn print_started(outcome: &StartOutcome) {
    let state = &outcome.state;
    match state.current_task_num {
        Some(number) => eprintln!("Started {} at task {number}.", state.mode.as_str()),
        None => eprintln!("Started {}.", state.mode.as_str()),
    }
    println!("{}", outcome.prompt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_global_root_after_subcommand() {
        let cli = Cli::parse_from(["ralph", "status", "--root", "/tmp/project", "--json"]);
        assert_eq!(cli.root, PathBuf::from("/tmp/project"));
        assert!(matches!(cli.command, Command::Status { json: true }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["ralph", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_run_task_selector() {
        let cli = Cli::parse_from(["ralph", "run-task", "#2"]);
        match cli.command {
            Command::RunTask { task, plan, .. } => {
                assert_eq!(task, TaskSelector::Number(2));
                assert_eq!(plan, None);
            }
            _ => panic!("expected run-task"),
        }
    }

    #[test]
    fn parse_start_overrides() {
        let cli = Cli::parse_from([
            "ralph",
            "start",
            "--max-iterations",
            "5",
            "--completion-promise",
            "ALL_DONE",
        ]);
        match cli.command {
            Command::Start {
                max_iterations,
                completion_promise,
                ..
            } => {
                assert_eq!(max_iterations, Some(5));
                assert_eq!(completion_promise.as_deref(), Some("ALL_DONE"));
            }
            _ => panic!("expected start"),
        }
    }
}
