//! Per-entry and per-file results of executing a plan.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::plan::FileLayer;
use crate::source::mutator::{MutationOutcome, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub step: u8,
    pub entity: String,
    pub layer: FileLayer,
    pub file: PathBuf,
    pub description: String,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileStatus {
    Written,
    Unchanged,
    /// An anchor was missing; the file keeps its previous content.
    LeftUntouched,
    /// Optional layer the entity does not have.
    Absent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationReport {
    pub summary: Vec<String>,
    pub entries: Vec<EntryReport>,
    pub files: Vec<FileReport>,
    /// Atomic mode withheld every write because of a miss.
    pub aborted: bool,
}

impl RelationReport {
    pub fn inserted(&self) -> usize {
        self.count(|o| *o == MutationOutcome::Inserted)
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| *o == MutationOutcome::AlreadyPresent)
    }

    pub fn misses(&self) -> usize {
        self.count(MutationOutcome::is_miss)
    }

    pub fn written(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Written)
            .count()
    }

    /// Every anchor was found and every file could be processed.
    pub fn is_complete(&self) -> bool {
        self.misses() == 0
            && !self.aborted
            && !self
                .files
                .iter()
                .any(|f| matches!(f.status, FileStatus::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&MutationOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// Plain-text report with paths shown relative to `project`.
    pub fn render(&self, project: &Path) -> String {
        let rel = |p: &Path| p.strip_prefix(project).unwrap_or(p).display().to_string();
        let mut out = String::new();

        let mut current: Option<&Path> = None;
        for entry in &self.entries {
            if current != Some(entry.file.as_path()) {
                current = Some(&entry.file);
                let _ = writeln!(out, "{}", rel(&entry.file));
            }
            let mark = match &entry.outcome {
                MutationOutcome::Inserted => "+",
                MutationOutcome::AlreadyPresent => "=",
                MutationOutcome::Skipped(SkipReason::AnchorNotFound(_)) => "!",
                MutationOutcome::Skipped(_) => "-",
            };
            let _ = writeln!(out, "  {mark} {} ({})", entry.description, entry.outcome);
        }

        let _ = writeln!(out);
        for file in &self.files {
            let status = match &file.status {
                FileStatus::Written => "written".to_string(),
                FileStatus::Unchanged => "unchanged".to_string(),
                FileStatus::LeftUntouched => "left untouched (anchor missing)".to_string(),
                FileStatus::Absent => "absent, skipped".to_string(),
                FileStatus::Failed(why) => format!("failed: {why}"),
            };
            let _ = writeln!(out, "{}: {status}", rel(&file.file));
        }

        let _ = writeln!(
            out,
            "\n{} inserted, {} already present, {} missed, {} file(s) written",
            self.inserted(),
            self.already_present(),
            self.misses(),
            self.written()
        );
        if self.aborted {
            let _ = writeln!(out, "atomic mode: nothing was written because of missing anchors");
        } else if self.misses() > 0 {
            let _ = writeln!(
                out,
                "warning: the relationship is only partially applied; fix the files marked `!` and re-run"
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file: &str, outcome: MutationOutcome) -> EntryReport {
        EntryReport {
            step: 3,
            entity: "book".into(),
            layer: FileLayer::Model,
            file: PathBuf::from(file),
            description: "relationship author".into(),
            outcome,
        }
    }

    #[test]
    fn test_counts_and_completeness() {
        let report = RelationReport {
            entries: vec![
                entry("/p/a.py", MutationOutcome::Inserted),
                entry("/p/a.py", MutationOutcome::AlreadyPresent),
                entry(
                    "/p/b.py",
                    MutationOutcome::Skipped(SkipReason::AnchorNotFound("body of class Book".into())),
                ),
            ],
            files: vec![
                FileReport {
                    file: "/p/a.py".into(),
                    status: FileStatus::Written,
                },
                FileReport {
                    file: "/p/b.py".into(),
                    status: FileStatus::LeftUntouched,
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.inserted(), 1);
        assert_eq!(report.already_present(), 1);
        assert_eq!(report.misses(), 1);
        assert_eq!(report.written(), 1);
        assert!(!report.is_complete());

        let text = report.render(Path::new("/p"));
        assert!(text.starts_with("a.py\n  + relationship author (inserted)\n"));
        assert!(text.contains("  ! relationship author (skipped: body of class Book not found)"));
        assert!(text.contains("b.py: left untouched (anchor missing)"));
        assert!(text.contains("partially applied"));
    }

    #[test]
    fn test_serializes_outcomes() {
        let report = RelationReport {
            entries: vec![entry("a.py", MutationOutcome::AlreadyPresent)],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["outcome"]["status"], "already_present");
        assert_eq!(json["entries"][0]["layer"], "model");
    }
}
