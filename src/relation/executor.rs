//! Plan executor.
//!
//! Two phases. First every entry is applied to an in-memory document, read
//! once per file. Then each document is written back, unless one of its
//! entries missed its anchor; in atomic mode a single miss anywhere withholds
//! every write.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::RelationshipConfig;
use super::plan::{Action, MutationPlan, PlanEntry, build_plan};
use super::report::{EntryReport, FileReport, FileStatus, RelationReport};
use crate::config::Config;
use crate::error::{FamError, Result};
use crate::source::SourceDocument;
use crate::source::mutator::{
    MutationOutcome, SkipReason, add_example_entry, apply_at, ensure_import,
};

/// Build the plan for `relationship` and execute it against `project`.
pub fn apply_relationship(
    relationship: &RelationshipConfig,
    settings: &Config,
    project: &Path,
) -> Result<RelationReport> {
    let plan = build_plan(relationship, settings, project);
    debug!("Plan has {} entries over {} files", plan.len(), plan.files().len());
    let mut report = execute(&plan, settings.atomic_relations)?;
    report.summary = relationship.describe();
    Ok(report)
}

#[derive(Debug)]
struct Staged {
    path: PathBuf,
    doc: Option<SourceDocument>,
    create: Option<String>,
    /// Set when the file could not be loaded.
    status: Option<FileStatus>,
    missed: bool,
}

impl Staged {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            doc: None,
            create: None,
            status: None,
            missed: false,
        }
    }

    fn has_changes(&self) -> bool {
        self.create.is_some() || self.doc.as_ref().is_some_and(SourceDocument::is_modified)
    }

    /// The document for `entry`, loading it on first use.
    ///
    /// A missing or unreadable model aborts the whole run; any other layer
    /// turns into a skip.
    fn document(&mut self, entry: &PlanEntry) -> Result<std::result::Result<&mut SourceDocument, SkipReason>> {
        match &self.status {
            Some(FileStatus::Absent) => return Ok(Err(SkipReason::FileAbsent)),
            Some(FileStatus::Failed(why)) => return Ok(Err(SkipReason::Unreadable(why.clone()))),
            _ => {}
        }

        if self.doc.is_none() {
            if !self.path.is_file() {
                if entry.layer.is_required() {
                    return Err(FamError::MissingRequiredFile(self.path.clone()));
                }
                debug!("{} does not exist, skipping its entries", self.path.display());
                self.status = Some(FileStatus::Absent);
                return Ok(Err(SkipReason::FileAbsent));
            }
            match SourceDocument::read(&self.path) {
                Ok(doc) => self.doc = Some(doc),
                Err(e) if entry.layer.is_required() => return Err(e),
                Err(e) => {
                    warn!("{e}");
                    self.status = Some(FileStatus::Failed(e.to_string()));
                    return Ok(Err(SkipReason::Unreadable(e.to_string())));
                }
            }
        }

        match self.doc.as_mut() {
            Some(doc) => Ok(Ok(doc)),
            None => Ok(Err(SkipReason::FileAbsent)),
        }
    }

    fn commit(self, aborted: bool) -> FileReport {
        let pending = self.has_changes();
        let status = match self.status {
            Some(status) => status,
            None if self.missed => FileStatus::LeftUntouched,
            None if !pending => FileStatus::Unchanged,
            None if aborted => FileStatus::LeftUntouched,
            None => match write_staged(&self.path, self.doc.as_ref(), self.create.as_deref()) {
                Ok(()) => {
                    info!("Wrote {}", self.path.display());
                    FileStatus::Written
                }
                Err(e) => {
                    warn!("{e}");
                    FileStatus::Failed(e.to_string())
                }
            },
        };
        FileReport {
            file: self.path,
            status,
        }
    }
}

fn write_staged(path: &Path, doc: Option<&SourceDocument>, create: Option<&str>) -> Result<()> {
    match (create, doc) {
        (Some(content), _) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| FamError::io(parent, e))?;
            }
            fs::write(path, content).map_err(|e| FamError::io(path, e))
        }
        (None, Some(doc)) => doc.write(path),
        (None, None) => Ok(()),
    }
}

/// Execute `plan`. Only a missing or unreadable model file is an error;
/// everything else ends up in the report.
pub fn execute(plan: &MutationPlan, atomic: bool) -> Result<RelationReport> {
    let mut staged: Vec<Staged> = Vec::new();
    let mut entries = Vec::with_capacity(plan.len());

    for entry in &plan.entries {
        let idx = match staged.iter().position(|s| s.path == entry.path) {
            Some(idx) => idx,
            None => {
                staged.push(Staged::new(&entry.path));
                staged.len() - 1
            }
        };
        let file = &mut staged[idx];

        let outcome = match &entry.action {
            Action::CreateFile { content } => {
                if file.create.is_some() || file.path.exists() {
                    MutationOutcome::AlreadyPresent
                } else {
                    file.create = Some(content.clone());
                    MutationOutcome::Inserted
                }
            }
            Action::LayerAbsent => {
                debug!("{} was never generated, skipping", entry.path.display());
                file.status.get_or_insert(FileStatus::Absent);
                MutationOutcome::Skipped(SkipReason::FileAbsent)
            }
            action => match file.document(entry)? {
                Ok(doc) => apply_action(doc, action),
                Err(reason) => MutationOutcome::Skipped(reason),
            },
        };

        if let MutationOutcome::Skipped(SkipReason::AnchorNotFound(anchor)) = &outcome {
            warn!(
                "{}: {anchor} not found, file left untouched ({})",
                entry.path.display(),
                entry.description
            );
            file.missed = true;
        } else {
            debug!("{}: {} -> {outcome}", entry.path.display(), entry.description);
        }

        entries.push(EntryReport {
            step: entry.step,
            entity: entry.entity.clone(),
            layer: entry.layer,
            file: entry.path.clone(),
            description: entry.description.clone(),
            outcome,
        });
    }

    let aborted = atomic && staged.iter().any(|s| s.missed);
    if aborted {
        warn!("Atomic mode: anchors missing, no file will be written");
    }
    let files = staged.into_iter().map(|s| s.commit(aborted)).collect();

    Ok(RelationReport {
        summary: Vec::new(),
        entries,
        files,
        aborted,
    })
}

fn apply_action(doc: &mut SourceDocument, action: &Action) -> MutationOutcome {
    match action {
        Action::Import(spec) => ensure_import(doc, spec),
        Action::Insert {
            fragment,
            anchor,
            fallback,
        } => {
            let outcome = apply_at(doc, fragment, anchor);
            match fallback {
                Some(fb) if outcome.is_miss() && !fb.when_absent.matches(doc) => {
                    debug!("{anchor} absent, using {} instead", fb.anchor);
                    apply_at(doc, &fb.fragment, &fb.anchor)
                }
                _ => outcome,
            }
        }
        Action::ExampleEntry { key, value } => add_example_entry(doc, key, value),
        Action::CreateFile { .. } => {
            MutationOutcome::Skipped(SkipReason::NotApplicable("file creation".to_string()))
        }
        Action::LayerAbsent => MutationOutcome::Skipped(SkipReason::FileAbsent),
    }
}
