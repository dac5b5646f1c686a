//! Test-only helpers: throwaway project directories and a recording host.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{Message, NoticeLevel};
use crate::io::host::{Host, HostCommand};
use crate::io::paths::RalphPaths;

/// A temporary project root, optionally initialized as a git repository.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { temp })
    }

    /// Create a project with a git repository and one initial commit.
    pub fn with_git() -> Result<Self> {
        let project = Self::new()?;
        project.git(&["init", "-q"])?;
        project.git(&["config", "user.email", "loop@example.com"])?;
        project.git(&["config", "user.name", "Loop Test"])?;
        project.git(&["config", "commit.gpgsign", "false"])?;
        project.write("README.md", "# test project\n")?;
        project.git(&["add", "-A"])?;
        project.git(&["commit", "-q", "-m", "initial"])?;
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> RalphPaths {
        RalphPaths::new(self.root())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.path(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Write the default plan file (`PLAN.md`).
    pub fn write_plan(&self, contents: &str) -> Result<()> {
        self.write("PLAN.md", contents)
    }

    pub fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    /// Stdout of a git command. Panics on failure.
    pub fn git_output(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

/// Host double that records every command and serves a scripted transcript.
#[derive(Default)]
pub struct RecordingHost {
    messages: RefCell<Vec<Message>>,
    commands: RefCell<Vec<HostCommand>>,
    fail_messages: Cell<bool>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_messages(&self, messages: Vec<Message>) {
        *self.messages.borrow_mut() = messages;
    }

    /// Make `messages` return an error, as a host with a broken session API would.
    pub fn fail_messages(&self) {
        self.fail_messages.set(true);
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.borrow().clone()
    }

    /// Drain recorded commands.
    pub fn take_commands(&self) -> Vec<HostCommand> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|command| match command {
                HostCommand::Prompt { session_id, text } => Some((session_id.clone(), text.clone())),
                HostCommand::Notice { .. } => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|command| match command {
                HostCommand::Notice { level, message } => Some((*level, message.clone())),
                HostCommand::Prompt { .. } => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn messages(&self, _session_id: &str) -> Result<Vec<Message>> {
        if self.fail_messages.get() {
            return Err(anyhow!("session messages unavailable"));
        }
        Ok(self.messages.borrow().clone())
    }

    fn send_prompt(&self, session_id: &str, text: &str) -> Result<()> {
        self.commands.borrow_mut().push(HostCommand::Prompt {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn notify(&self, level: NoticeLevel, message: &str) -> Result<()> {
        self.commands.borrow_mut().push(HostCommand::Notice {
            level,
            message: message.to_string(),
        });
        Ok(())
    }
}
