//! `fam create <name>`: scaffold an entity and register it.
//!
//! Registration reuses the idempotent mutator: the model import goes into
//! `alembic/env.py` so autogenerate sees the table, and the router is
//! imported and included in `app/main.py`.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use super::WriteSummary;
use crate::config::Config;
use crate::error::{FamError, Result};
use crate::naming;
use crate::source::SourceDocument;
use crate::source::locator::Anchor;
use crate::source::mutator::{
    Fragment, ImportSpec, MutationOutcome, Padding, Probe, SkipReason, apply_at, ensure_import,
};
use crate::templates::entity::{router_include, scaffold_files};
use crate::templates::project::{ALEMBIC_ENV_MODULE, MAIN_GUARD, MAIN_MODULE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub file: PathBuf,
    pub description: String,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub name: String,
    pub files: WriteSummary,
    pub registrations: Vec<Registration>,
}

impl EntityReport {
    pub fn render(&self, project: &Path) -> Vec<String> {
        let mut lines = self.files.render(project);
        for reg in &self.registrations {
            let file = reg.file.strip_prefix(project).unwrap_or(&reg.file);
            lines.push(format!("{}: {} ({})", file.display(), reg.description, reg.outcome));
        }
        lines
    }
}

/// Scaffold entity `raw_name` under the configured entities root.
pub fn create_entity(project: &Path, config: &Config, raw_name: &str) -> Result<EntityReport> {
    let name = naming::normalize_entity_name(raw_name)?;
    let root = config.entities_dir(project);
    if !root.is_dir() {
        return Err(FamError::ProjectNotInitialized(root));
    }

    let dir = root.join(&name);
    let mut files = WriteSummary::default();
    for (rel, content) in scaffold_files(&name) {
        files.write_new(&dir.join(rel), &content)?;
    }

    let registrations = register(project, config, &name)?;
    info!("Entity {name} scaffolded in {}", dir.display());

    Ok(EntityReport {
        name,
        files,
        registrations,
    })
}

fn register(project: &Path, config: &Config, name: &str) -> Result<Vec<Registration>> {
    let class = naming::class_name(name);
    let package = format!("{}.{name}", config.import_root);
    let mut registrations = Vec::new();

    let model_import = ImportSpec::new(format!("{package}.{name}_model"), &[class.as_str()]);
    patch(&project.join(ALEMBIC_ENV_MODULE), &mut registrations, |doc| {
        vec![(
            format!("import {}", model_import.statement()),
            ensure_import(doc, &model_import),
        )]
    })?;

    let alias = format!("router as {name}_router");
    let router_import = ImportSpec::new(format!("{package}.{name}_router"), &[alias.as_str()]);
    let include = Fragment::new(Probe::Contains(router_include(name)), router_include(name))
        .padded(Padding::BlankAfter);
    patch(&project.join(MAIN_MODULE), &mut registrations, |doc| {
        vec![
            (
                format!("import {}", router_import.statement()),
                ensure_import(doc, &router_import),
            ),
            (
                router_include(name),
                apply_at(doc, &include, &Anchor::BeforeMarker(MAIN_GUARD.to_string())),
            ),
        ]
    })?;

    Ok(registrations)
}

/// Read `path`, apply `edits`, and write it back unless an anchor missed.
fn patch(
    path: &Path,
    registrations: &mut Vec<Registration>,
    edits: impl FnOnce(&mut SourceDocument) -> Vec<(String, MutationOutcome)>,
) -> Result<()> {
    if !path.is_file() {
        warn!("{} not found, skipping registration", path.display());
        registrations.push(Registration {
            file: path.to_path_buf(),
            description: "registration".to_string(),
            outcome: MutationOutcome::Skipped(SkipReason::FileAbsent),
        });
        return Ok(());
    }

    let mut doc = SourceDocument::read(path)?;
    let outcomes = edits(&mut doc);
    let missed = outcomes.iter().any(|(_, o)| o.is_miss());
    for (description, outcome) in outcomes {
        if outcome.is_miss() {
            warn!("{}: {outcome}, file left untouched", path.display());
        }
        registrations.push(Registration {
            file: path.to_path_buf(),
            description,
            outcome,
        });
    }

    if !missed && doc.is_modified() {
        doc.write(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::project::init_project;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        init_project(dir.path(), &config, &dir.path().join("fam.json")).unwrap();
        dir
    }

    #[test]
    fn test_requires_initialized_project() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_entity(dir.path(), &Config::default(), "book").unwrap_err();
        assert!(matches!(err, FamError::ProjectNotInitialized(_)));
    }

    #[test]
    fn test_rejects_invalid_name() {
        let dir = project();
        let err = create_entity(dir.path(), &Config::default(), "book-shelf").unwrap_err();
        assert!(matches!(err, FamError::InvalidEntityName(_)));
    }

    #[test]
    fn test_scaffold_and_register() {
        let dir = project();
        let report = create_entity(dir.path(), &Config::default(), "Book").unwrap();
        assert_eq!(report.name, "book");
        assert_eq!(report.files.created.len(), 9);
        assert!(dir.path().join("app/api/book/dto/book_out_dto.py").is_file());

        let env = fs::read_to_string(dir.path().join("alembic/env.py")).unwrap();
        assert!(env.contains("from app.db.database import Base\nfrom app.api.book.book_model import Book\n"));

        let main = fs::read_to_string(dir.path().join("app/main.py")).unwrap();
        assert!(main.contains("from app.api.book.book_router import router as book_router\n"));
        assert!(main.contains("app.include_router(book_router)\n\nif __name__ == \"__main__\":"));
        assert_eq!(main.matches("from fastapi import FastAPI").count(), 1);
    }

    #[test]
    fn test_second_create_changes_nothing() {
        let dir = project();
        create_entity(dir.path(), &Config::default(), "book").unwrap();
        let main_before = fs::read_to_string(dir.path().join("app/main.py")).unwrap();
        let env_before = fs::read_to_string(dir.path().join("alembic/env.py")).unwrap();

        let report = create_entity(dir.path(), &Config::default(), "book").unwrap();
        assert!(report.files.created.is_empty());
        assert!(report
            .registrations
            .iter()
            .all(|r| r.outcome == MutationOutcome::AlreadyPresent));
        assert_eq!(fs::read_to_string(dir.path().join("app/main.py")).unwrap(), main_before);
        assert_eq!(fs::read_to_string(dir.path().join("alembic/env.py")).unwrap(), env_before);
    }

    #[test]
    fn test_missing_main_is_skipped() {
        let dir = project();
        fs::remove_file(dir.path().join("app/main.py")).unwrap();
        let report = create_entity(dir.path(), &Config::default(), "book").unwrap();
        assert!(report
            .registrations
            .iter()
            .any(|r| r.outcome == MutationOutcome::Skipped(SkipReason::FileAbsent)));
    }
}
