//! Detects how a project verifies its work, for the prompt's checklist.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

/// Best-effort guess at the project's test command.
///
/// `justfile` → `just test`, `package.json` with a `test` script →
/// `npm test`, `Makefile` with a `test:` target → `make test`.
pub fn detect_verify_command(root: &Path) -> Option<String> {
    let detected = detect(root);
    debug!(root = %root.display(), command = ?detected, "verify command detection");
    detected
}

fn detect(root: &Path) -> Option<String> {
    if ["justfile", "Justfile", ".justfile"]
        .iter()
        .any(|name| root.join(name).is_file())
    {
        return Some("just test".to_string());
    }
    if let Ok(contents) = fs::read_to_string(root.join("package.json"))
        && let Ok(manifest) = serde_json::from_str::<Value>(&contents)
        && manifest
            .get("scripts")
            .and_then(|scripts| scripts.get("test"))
            .is_some()
    {
        return Some("npm test".to_string());
    }
    if let Ok(contents) = fs::read_to_string(root.join("Makefile"))
        && contents.lines().any(|line| line.starts_with("test:"))
    {
        return Some("make test".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justfile_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("justfile"), "test:\n\tcargo test\n").expect("write");
        fs::write(temp.path().join("Makefile"), "test:\n\tmake check\n").expect("write");
        assert_eq!(
            detect_verify_command(temp.path()).as_deref(),
            Some("just test")
        );
    }

    #[test]
    fn package_json_needs_test_script() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, r#"{"scripts":{"build":"tsc"}}"#).expect("write");
        assert_eq!(detect_verify_command(temp.path()), None);

        fs::write(&path, r#"{"scripts":{"test":"vitest"}}"#).expect("write");
        assert_eq!(
            detect_verify_command(temp.path()).as_deref(),
            Some("npm test")
        );
    }

    #[test]
    fn makefile_needs_test_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("Makefile"), "build:\n\tcc main.c\n").expect("write");
        assert_eq!(detect_verify_command(temp.path()), None);

        fs::write(temp.path().join("Makefile"), "test: build\n\t./run\n").expect("write");
        assert_eq!(
            detect_verify_command(temp.path()).as_deref(),
            Some("make test")
        );
    }
}
