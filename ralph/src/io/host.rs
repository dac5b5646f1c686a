//! Host adapter: the development tool that owns agent sessions.
//!
//! The [`Host`] trait decouples loop orchestration from the host's transport.
//! The CLI uses [`StdioHost`], which takes the transcript from a JSON file and
//! writes commands to stdout as JSON lines:
//!
//! ```text
//! {"type":"notice","level":"info","message":"Committed: ralph: task 1 - Setup"}
//! {"type":"prompt","sessionId":"ses_123","text":"..."}
//! ```
//!
//! Tests use a recording host that captures commands in memory.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::{Message, NoticeLevel};

/// A command for the host, in the order it must be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostCommand {
    /// Send `text` as the next user prompt of session `session_id`.
    Prompt {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
    /// Show a user-visible notice.
    Notice { level: NoticeLevel, message: String },
}

pub trait Host {
    /// Recent messages of `session_id`, oldest first.
    fn messages(&self, session_id: &str) -> Result<Vec<Message>>;

    fn send_prompt(&self, session_id: &str, text: &str) -> Result<()>;

    fn notify(&self, level: NoticeLevel, message: &str) -> Result<()>;
}

/// Host bridge over a pre-fetched transcript and a JSON-lines writer.
pub struct StdioHost<W: Write> {
    transcript: Vec<Message>,
    out: RefCell<W>,
}

impl<W: Write> StdioHost<W> {
    pub fn new(transcript: Vec<Message>, out: W) -> Self {
        Self {
            transcript,
            out: RefCell::new(out),
        }
    }

    fn emit(&self, command: &HostCommand) -> Result<()> {
        let line = serde_json::to_string(command).context("serialize host command")?;
        let mut out = self.out.borrow_mut();
        writeln!(out, "{line}").context("write host command")?;
        out.flush().context("flush host command")
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Host for StdioHost<W> {
    fn messages(&self, _session_id: &str) -> Result<Vec<Message>> {
        Ok(self.transcript.clone())
    }

    fn send_prompt(&self, session_id: &str, text: &str) -> Result<()> {
        self.emit(&HostCommand::Prompt {
            session_id: session_id.to_string(),
            text: text.to_string(),
        })
    }

    fn notify(&self, level: NoticeLevel, message: &str) -> Result<()> {
        self.emit(&HostCommand::Notice {
            level,
            message: message.to_string(),
        })
    }
}

/// Read a transcript file: a JSON array of `{"role": ..., "text": ...}`.
pub fn load_transcript(path: &Path) -> Result<Vec<Message>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read transcript {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse transcript {}", path.display()))
}
