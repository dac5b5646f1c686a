//! Loop configuration stored under `.ralph/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::promise::DEFAULT_WINDOW;

/// Loop configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults. Command-line flags
/// override these values for a single invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RalphConfig {
    /// Plan file used when a command does not name one.
    pub plan_file: PathBuf,

    /// Default iteration budget for new loops (0 = unlimited).
    pub max_iterations: u32,

    /// Number of recent assistant messages scanned for the completion promise.
    pub transcript_window: usize,

    pub commit: CommitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitConfig {
    /// Commit after each task completed in loop mode.
    pub enabled: bool,

    /// Scope token at the start of every task commit subject.
    pub scope: String,

    /// Budget for each git invocation made by the committer.
    pub timeout_secs: u64,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: "ralph".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            plan_file: PathBuf::from("PLAN.md"),
            max_iterations: 0,
            transcript_window: DEFAULT_WINDOW,
            commit: CommitConfig::default(),
        }
    }
}

impl RalphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.plan_file.as_os_str().is_empty() {
            return Err(anyhow!("plan_file must not be empty"));
        }
        if self.transcript_window == 0 {
            return Err(anyhow!("transcript_window must be > 0"));
        }
        if self.commit.scope.trim().is_empty() {
            return Err(anyhow!("commit.scope must not be empty"));
        }
        if self.commit.timeout_secs == 0 {
            return Err(anyhow!("commit.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RalphConfig::default()`.
pub fn load_config(path: &Path) -> Result<RalphConfig> {
    if !path.exists() {
        let cfg = RalphConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RalphConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RalphConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Write the default config unless one exists (or `force` is set).
///
/// Returns whether a file was written.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    write_config(path, &RalphConfig::default())?;
    Ok(true)
}
