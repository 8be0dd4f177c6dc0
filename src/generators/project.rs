//! `fam init`: write the fixed project skeleton.
use std::fs;
use std::path::Path;

use tracing::info;

use super::WriteSummary;
use crate::config::Config;
use crate::error::{FamError, Result};
use crate::templates::project::{skeleton_dirs, skeleton_files};

/// Create the skeleton under `project` and the configuration file at
/// `config_path`. Files already present are kept.
pub fn init_project(project: &Path, config: &Config, config_path: &Path) -> Result<WriteSummary> {
    let mut summary = WriteSummary::default();

    for (rel, content) in skeleton_files() {
        summary.write_new(&project.join(rel), content)?;
    }
    for rel in skeleton_dirs() {
        let dir = project.join(rel);
        fs::create_dir_all(&dir).map_err(|e| FamError::io(&dir, e))?;
    }

    // A relocated entities root still has to be an importable package.
    let entities_init = config.entities_dir(project).join("__init__.py");
    if !summary.created.contains(&entities_init) && !summary.existing.contains(&entities_init) {
        summary.write_new(&entities_init, "")?;
    }

    if config_path.exists() {
        summary.existing.push(config_path.to_path_buf());
    } else {
        config.save(config_path)?;
        summary.created.push(config_path.to_path_buf());
    }

    info!(
        "Initialized project in {}: {} created, {} kept",
        project.display(),
        summary.created.len(),
        summary.existing.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_skeleton_once() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path();
        let config = Config::default();
        let config_path = Config::resolve_path(project, None);

        let first = init_project(project, &config, &config_path).unwrap();
        assert!(first.existing.is_empty());
        for rel in ["app/main.py", "alembic/env.py", "app/db/database.py", "app/api/__init__.py", "app/db/seeders/base_seeder.py", "fam.json"] {
            assert!(project.join(rel).is_file(), "{rel} missing");
        }
        assert!(project.join("alembic/versions").is_dir());

        fs::write(project.join("app/main.py"), "# mine\n").unwrap();
        let second = init_project(project, &config, &config_path).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(fs::read_to_string(project.join("app/main.py")).unwrap(), "# mine\n");
    }

    #[test]
    fn test_init_creates_relocated_entities_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            entities_root: "src/entities".into(),
            import_root: "src.entities".into(),
            ..Config::default()
        };
        init_project(dir.path(), &config, &dir.path().join("fam.json")).unwrap();
        assert!(dir.path().join("src/entities/__init__.py").is_file());
        assert_eq!(Config::load(&dir.path().join("fam.json")).unwrap(), config);
    }
}
