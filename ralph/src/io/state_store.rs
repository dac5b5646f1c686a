//! Loop state storage (`.ralph/state/loop.json`).
//!
//! The file's presence is the "loop active" signal. There is one writer per
//! project directory and no lock: the start check-then-write can race when two
//! processes start loops at the same moment.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::types::LoopState;
use crate::error::LoopError;

/// Read the persisted state strictly.
///
/// Missing file is `Ok(None)`; a file that cannot be read or parsed is
/// [`LoopError::StateFileUnreadable`].
pub fn read_state(path: &Path) -> Result<Option<LoopState>, LoopError> {
    debug!(path = %path.display(), "loading loop state");
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(LoopError::StateFileUnreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };
    let state: LoopState =
        serde_json::from_str(&contents).map_err(|err| LoopError::StateFileUnreadable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    debug!(
        mode = state.mode.as_str(),
        iteration = state.iteration,
        "loop state loaded"
    );
    Ok(Some(state))
}

/// Read the persisted state, treating an unreadable file as no active loop.
pub fn load_state(path: &Path) -> Option<LoopState> {
    match read_state(path) {
        Ok(state) => state,
        Err(err) => {
            warn!(error = %err, "ignoring unreadable loop state; treating loop as inactive");
            None
        }
    }
}

/// Atomically write loop state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &LoopState) -> Result<()> {
    debug!(
        path = %path.display(),
        mode = state.mode.as_str(),
        iteration = state.iteration,
        "writing loop state"
    );
    let mut buf = serde_json::to_string_pretty(state).context("serialize loop state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Remove the state file. Returns whether a file was removed.
pub fn delete_state(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "loop state deleted");
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("delete loop state {}", path.display())),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("loop state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp loop state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace loop state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LoopMode;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn sample_state() -> LoopState {
        let mut state = LoopState::new(
            LoopMode::Loop,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        );
        state.max_iterations = 10;
        state.completion_promise = Some("ALL_DONE".to_string());
        state.session_id = Some("ses_1".to_string());
        state.plan_file = Some(PathBuf::from("PLAN.md"));
        state.set_current_task(3);
        state
    }

    /// Writes a fully populated state, reads it back, and asserts equality.
    #[test]
    fn state_write_then_read_preserves_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state/loop.json");

        let state = sample_state();
        write_state(&path, &state).expect("write");
        assert_eq!(read_state(&path).expect("read"), Some(state));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_state_is_inactive() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loop.json");
        assert_eq!(read_state(&path).expect("read"), None);
        assert_eq!(load_state(&path), None);
    }

    #[test]
    fn corrupt_state_fails_open() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loop.json");
        fs::write(&path, "{ not json").expect("write");

        let err = read_state(&path).unwrap_err();
        assert!(matches!(err, LoopError::StateFileUnreadable { .. }));
        assert_eq!(load_state(&path), None);
    }

    #[test]
    fn delete_reports_whether_state_existed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loop.json");
        write_state(&path, &sample_state()).expect("write");

        assert!(delete_state(&path).expect("delete"));
        assert!(!delete_state(&path).expect("delete again"));
    }

    /// Guards against accidental changes to the on-disk key names.
    #[test]
    fn state_file_layout_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("loop.json");
        write_state(&path, &sample_state()).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let expected = "{\n  \"active\": true,\n  \"iteration\": 1,\n  \"maxIterations\": 10,\n  \"completionPromise\": \"ALL_DONE\",\n  \"prompt\": \"\",\n  \"sessionId\": \"ses_1\",\n  \"startedAt\": \"2026-03-01T12:00:00Z\",\n  \"planFile\": \"PLAN.md\",\n  \"currentTaskId\": \"task-3\",\n  \"currentTaskNum\": 3,\n  \"mode\": \"loop\"\n}\n";
        assert_eq!(contents, expected);
    }
}
