//! Entity Registry: discovers generated entities on disk.
//!
//! There is no registry file. An entity is any directory `<root>/<name>/`
//! holding a `<name>_model.py`; which other layers exist is read from the
//! same directory on every call.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{FamError, Result};
use crate::naming;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DtoKind {
    In,
    Out,
    Update,
}

impl DtoKind {
    fn suffix(self) -> &'static str {
        match self {
            DtoKind::In => "in",
            DtoKind::Out => "out",
            DtoKind::Update => "update",
        }
    }

    /// Class-name suffix of the DTO (`BookOutDto`).
    pub fn class_suffix(self) -> &'static str {
        match self {
            DtoKind::In => "InDto",
            DtoKind::Out => "OutDto",
            DtoKind::Update => "UpdateDto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub class_name: String,
    pub dir: PathBuf,
    pub model: PathBuf,
    pub repository: Option<PathBuf>,
    pub service: Option<PathBuf>,
    pub in_dto: Option<PathBuf>,
    pub out_dto: Option<PathBuf>,
    pub update_dto: Option<PathBuf>,
}

impl EntityDescriptor {
    /// Describe the entity living in `dir`, or `None` if `dir` is not one.
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let name = dir.file_name()?.to_str()?.to_string();
        if !is_entity_dir(dir, &name) {
            return None;
        }
        let existing = |p: PathBuf| p.is_file().then_some(p);

        Some(Self {
            class_name: naming::class_name(&name),
            model: dir.join(format!("{name}_model.py")),
            repository: existing(dir.join(format!("{name}_repository.py"))),
            service: existing(dir.join(format!("{name}_service.py"))),
            in_dto: existing(dto_path(dir, &name, DtoKind::In)),
            out_dto: existing(dto_path(dir, &name, DtoKind::Out)),
            update_dto: existing(dto_path(dir, &name, DtoKind::Update)),
            dir: dir.to_path_buf(),
            name,
        })
    }

    /// Conventional path of a DTO, whether or not it exists.
    pub fn dto_path(&self, kind: DtoKind) -> PathBuf {
        dto_path(&self.dir, &self.name, kind)
    }

    pub fn dto(&self, kind: DtoKind) -> Option<&Path> {
        match kind {
            DtoKind::In => self.in_dto.as_deref(),
            DtoKind::Out => self.out_dto.as_deref(),
            DtoKind::Update => self.update_dto.as_deref(),
        }
    }

    pub fn repository_path(&self) -> PathBuf {
        self.dir.join(format!("{}_repository.py", self.name))
    }

    pub fn service_path(&self) -> PathBuf {
        self.dir.join(format!("{}_service.py", self.name))
    }
}

fn dto_path(dir: &Path, name: &str, kind: DtoKind) -> PathBuf {
    dir.join("dto").join(format!("{name}_{}_dto.py", kind.suffix()))
}

/// Whether `dir` holds the model file of an entity called `name`.
pub fn is_entity_dir(dir: &Path, name: &str) -> bool {
    naming::normalize_entity_name(name).is_ok_and(|n| n == name)
        && dir.join(format!("{name}_model.py")).is_file()
}

/// Every entity under `root`, sorted by name.
pub fn list_entities(root: &Path) -> Result<Vec<EntityDescriptor>> {
    if !root.is_dir() {
        return Err(FamError::ProjectNotInitialized(root.to_path_buf()));
    }

    let mut entities = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| FamError::io(root, e))? {
        let entry = entry.map_err(|e| FamError::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match EntityDescriptor::from_dir(&path) {
            Some(entity) => entities.push(entity),
            None => debug!("{} is not an entity directory", path.display()),
        }
    }

    entities.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entities)
}

/// Look up one entity by name.
pub fn find_entity(root: &Path, name: &str) -> Result<EntityDescriptor> {
    list_entities(root)?
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| FamError::UnknownEntity(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_missing_root_is_a_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_entities(&dir.path().join("app/api")).unwrap_err();
        assert!(matches!(err, FamError::ProjectNotInitialized(_)));
    }

    #[test]
    fn test_lists_only_model_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("book/book_model.py"));
        touch(&root.join("book/book_repository.py"));
        touch(&root.join("book/dto/book_out_dto.py"));
        touch(&root.join("author/author_model.py"));
        touch(&root.join("shared/models/author_book.py"));
        touch(&root.join("notes/readme.md"));
        touch(&root.join("__init__.py"));

        let entities = list_entities(root).unwrap();
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["author", "book"]);

        let book = &entities[1];
        assert_eq!(book.class_name, "Book");
        assert!(book.repository.is_some());
        assert!(book.service.is_none());
        assert!(book.dto(DtoKind::Out).is_some());
        assert!(book.dto(DtoKind::In).is_none());
        assert_eq!(book.dto_path(DtoKind::Update), root.join("book/dto/book_update_dto.py"));
    }

    #[test]
    fn test_find_entity() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("book/book_model.py"));
        assert_eq!(find_entity(dir.path(), "book").unwrap().name, "book");
        assert!(matches!(
            find_entity(dir.path(), "author"),
            Err(FamError::UnknownEntity(_))
        ));
    }
}
