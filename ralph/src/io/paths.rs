//! Canonical per-project paths under `.ralph/`.

use std::path::{Path, PathBuf};

/// All canonical paths within `.ralph/` for a project root.
#[derive(Debug, Clone)]
pub struct RalphPaths {
    pub root: PathBuf,
    pub ralph_dir: PathBuf,
    pub state_path: PathBuf,
    pub config_path: PathBuf,
}

impl RalphPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let ralph_dir = root.join(".ralph");
        Self {
            root: root.clone(),
            ralph_dir: ralph_dir.clone(),
            state_path: ralph_dir.join("state").join("loop.json"),
            config_path: ralph_dir.join("config.toml"),
        }
    }

    /// Resolve a plan path given on the command line or in config against the
    /// project root. Absolute paths are kept.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_stable() {
        let paths = RalphPaths::new("/work/project");
        assert_eq!(
            paths.state_path,
            Path::new("/work/project/.ralph/state/loop.json")
        );
        assert_eq!(
            paths.config_path,
            Path::new("/work/project/.ralph/config.toml")
        );
        assert_eq!(
            paths.resolve(Path::new("docs/PLAN.md")),
            Path::new("/work/project/docs/PLAN.md")
        );
        assert_eq!(paths.resolve(Path::new("/tmp/PLAN.md")), Path::new("/tmp/PLAN.md"));
    }
}
