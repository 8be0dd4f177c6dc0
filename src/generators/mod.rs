//! One-shot writers: project skeleton and entity scaffolds.
//!
//! Both only ever create files. Existing files are reported and left alone,
//! so re-running a generator never clobbers hand edits.
pub mod entity;
pub mod project;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{FamError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
}

impl WriteSummary {
    /// Write `content` to `path` unless something is already there.
    pub(crate) fn write_new(&mut self, path: &Path, content: &str) -> Result<()> {
        if path.exists() {
            debug!("{} exists, keeping it", path.display());
            self.existing.push(path.to_path_buf());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FamError::io(parent, e))?;
        }
        fs::write(path, content).map_err(|e| FamError::io(path, e))?;
        self.created.push(path.to_path_buf());
        Ok(())
    }

    /// Lines of `created: <path>` / `exists:  <path>` relative to `root`.
    pub fn render(&self, root: &Path) -> Vec<String> {
        let rel = |p: &PathBuf| p.strip_prefix(root).unwrap_or(p).display().to_string();
        self.created
            .iter()
            .map(|p| format!("created: {}", rel(p)))
            .chain(self.existing.iter().map(|p| format!("exists:  {}", rel(p))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_new_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.py");
        let mut summary = WriteSummary::default();

        summary.write_new(&path, "first\n").unwrap();
        summary.write_new(&path, "second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
        assert_eq!(summary.created, [path.clone()]);
        assert_eq!(summary.existing, [path]);
        assert_eq!(summary.render(dir.path()), ["created: a/b/c.py", "exists:  a/b/c.py"]);
    }
}
