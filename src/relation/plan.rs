//! Mutation plan: which fragment goes into which file, in which order.
//!
//! Building a plan touches nothing on disk. Entries are ordered by step and,
//! within a step, origin before target.
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{RelationType, RelationshipConfig, Side};
use crate::config::Config;
use crate::naming;
use crate::registry::{DtoKind, EntityDescriptor};
use crate::source::locator::Anchor;
use crate::source::mutator::{Fragment, ImportSpec, Padding, Probe};
use crate::templates::relation as tpl;

/// The layer of an entity a plan entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileLayer {
    Model,
    InDto,
    OutDto,
    UpdateDto,
    Service,
    Repository,
    AssociationTable,
}

impl FileLayer {
    /// Only the model is mandatory; an entity may lack any other layer.
    pub fn is_required(self) -> bool {
        self == FileLayer::Model
    }

    fn from_dto(kind: DtoKind) -> Self {
        match kind {
            DtoKind::In => FileLayer::InDto,
            DtoKind::Out => FileLayer::OutDto,
            DtoKind::Update => FileLayer::UpdateDto,
        }
    }
}

/// Alternative placement used when the primary anchor is missing because a
/// whole construct is absent (as opposed to having drifted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fallback {
    /// Only taken when this probe does not match the file.
    pub when_absent: Probe,
    pub fragment: Fragment,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Import(ImportSpec),
    Insert {
        fragment: Fragment,
        anchor: Anchor,
        fallback: Option<Fallback>,
    },
    /// Add a key to the DTO's schema example.
    ExampleEntry { key: String, value: String },
    /// Write a new file; an existing file is never overwritten.
    CreateFile { content: String },
    /// The registry found no file for this layer; nothing is planned for it.
    LayerAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub step: u8,
    pub entity: String,
    pub layer: FileLayer,
    pub path: PathBuf,
    pub description: String,
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationPlan {
    pub entries: Vec<PlanEntry>,
}

impl MutationPlan {
    /// Distinct files in first-touch order.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        for entry in &self.entries {
            if !files.contains(&entry.path.as_path()) {
                files.push(&entry.path);
            }
        }
        files
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, step: u8, entity: &str, layer: FileLayer, path: PathBuf, description: String, action: Action) {
        self.entries.push(PlanEntry {
            step,
            entity: entity.to_string(),
            layer,
            path,
            description,
            action,
        });
    }

    fn insert(
        &mut self,
        step: u8,
        target: (&str, FileLayer, PathBuf),
        description: String,
        fragment: Fragment,
        anchor: Anchor,
        fallback: Option<Fallback>,
    ) {
        let (entity, layer, path) = target;
        self.push(
            step,
            entity,
            layer,
            path,
            description,
            Action::Insert {
                fragment,
                anchor,
                fallback,
            },
        );
    }

    /// The file of an optional layer, as discovered by the registry. A layer
    /// that was never generated is recorded once as `LayerAbsent` at its
    /// conventional path and yields `None`.
    fn layer_file(
        &mut self,
        step: u8,
        entity: &EntityDescriptor,
        layer: FileLayer,
        discovered: Option<&Path>,
        conventional: PathBuf,
    ) -> Option<PathBuf> {
        if let Some(path) = discovered {
            return Some(path.to_path_buf());
        }
        if !self.entries.iter().any(|e| e.path == conventional) {
            self.push(
                step,
                &entity.name,
                layer,
                conventional,
                format!("{} not generated", entity.name),
                Action::LayerAbsent,
            );
        }
        None
    }
}

const SIDES: [Side; 2] = [Side::Origin, Side::Target];

/// Derive the full plan for `config`.
pub fn build_plan(config: &RelationshipConfig, settings: &Config, project: &Path) -> MutationPlan {
    let mut plan = MutationPlan::default();
    let fk_owner = config.fk_owner();
    let association = config.association_table();
    let shared_module = settings.shared_models_module();

    // 1. Imports in both model files.
    for side in SIDES {
        let entity = config.entity(side);
        let model = (entity.name.as_str(), FileLayer::Model, entity.model.clone());
        let mut imports = vec![ImportSpec::new("sqlalchemy.orm", &["relationship"])];
        if fk_owner == Some(side) {
            imports.insert(0, ImportSpec::new("sqlalchemy", &["Column", "ForeignKey", "Integer"]));
        }
        if let Some(table) = &association {
            imports.push(ImportSpec::new(shared_module.clone(), &[table.as_str()]));
        }
        for spec in imports {
            plan.push(
                1,
                model.0,
                model.1,
                model.2.clone(),
                format!("import {}", spec.statement()),
                Action::Import(spec),
            );
        }
    }

    // 2. Foreign-key column, or the association table.
    if let Some(owner) = fk_owner {
        let entity = config.entity(owner);
        let referenced = &config.entity(owner.other()).name;
        let column = naming::id_field(referenced);
        let unique = config.relation_type == RelationType::OneToOne;
        plan.insert(
            2,
            (&entity.name, FileLayer::Model, entity.model.clone()),
            format!("foreign key {column}"),
            Fragment::new(Probe::Declares(column), tpl::foreign_key_column(referenced, unique)),
            Anchor::ClassBody(entity.class_name.clone()),
            None,
        );
    }
    if let Some(table) = &association {
        let dir = settings.shared_models_path(project);
        for init in package_inits(&dir, &settings.entities_dir(project)) {
            plan.push(
                2,
                &config.origin.name,
                FileLayer::AssociationTable,
                init,
                "package marker __init__.py".to_string(),
                Action::CreateFile {
                    content: String::new(),
                },
            );
        }
        plan.push(
            2,
            &config.origin.name,
            FileLayer::AssociationTable,
            dir.join(format!("{table}.py")),
            format!("association table {table}"),
            Action::CreateFile {
                content: tpl::association_table(&config.origin.name, &config.target.name),
            },
        );
    }

    // 3. Relationship declarations, cross-referencing each other.
    for side in SIDES {
        let entity = config.entity(side);
        let other = config.entity(side.other());
        let name = config.relationship_name(side);
        let mut decl = tpl::RelationshipDecl::new(name.clone(), other.class_name.clone())
            .back_populates(config.relationship_name(side.other()));
        if let Some(table) = &association {
            decl = decl.secondary(table.clone());
        }
        if config.relation_type == RelationType::OneToOne {
            decl = decl.uselist(false);
        }
        plan.insert(
            3,
            (&entity.name, FileLayer::Model, entity.model.clone()),
            format!("relationship {name}"),
            Fragment::new(Probe::Declares(name), decl.render()),
            Anchor::ClassBody(entity.class_name.clone()),
            None,
        );
    }

    // 4. DTO fields: outbound on both sides, inbound/update on the key owner.
    for side in SIDES {
        let entity = config.entity(side);
        let related = &config.entity(side.other()).name;
        let is_list = config.is_list(side);
        let field = config.out_dto_field(side);
        let typing = if is_list { "List" } else { "Optional" };
        dto_entries(
            &mut plan,
            entity,
            DtoKind::Out,
            (&field, &tpl::out_dto_field(related, is_list), typing),
            tpl::example_value(is_list),
        );
    }
    if let Some(owner) = fk_owner {
        let entity = config.entity(owner);
        let related = &config.entity(owner.other()).name;
        let field = naming::id_field(related);
        for kind in [DtoKind::In, DtoKind::Update] {
            dto_entries(
                &mut plan,
                entity,
                kind,
                (&field, &tpl::in_dto_field(related), "Optional"),
                tpl::example_value(false),
            );
        }
    }

    // 5. Conversion logic in both services.
    for side in SIDES {
        let entity = config.entity(side);
        let related = &config.entity(side.other()).name;
        let is_list = config.is_list(side);
        let marker = tpl::conversion_marker(related, is_list);
        let service_class = format!("{}Service", entity.class_name);
        let Some(service) = plan.layer_file(
            5,
            entity,
            FileLayer::Service,
            entity.service.as_deref(),
            entity.service_path(),
        ) else {
            continue;
        };
        plan.insert(
            5,
            (&entity.name, FileLayer::Service, service),
            format!("model_to_dto populates {}", config.out_dto_field(side)),
            Fragment::new(Probe::Contains(marker.clone()), tpl::conversion_logic(related, is_list)),
            Anchor::MethodBody {
                class: service_class.clone(),
                method: "model_to_dto".to_string(),
                marker: "dto_dict =".to_string(),
            },
            Some(Fallback {
                when_absent: Probe::Defines("model_to_dto".to_string()),
                fragment: Fragment::new(
                    Probe::Contains(marker),
                    tpl::model_to_dto_method(&entity.name, related, is_list),
                )
                .padded(Padding::BlankBefore),
                anchor: Anchor::ClassBody(service_class),
            }),
        );
    }

    // 6. Lookup by foreign key on the owner's repository.
    if let Some(owner) = fk_owner {
        let entity = config.entity(owner);
        let related = &config.entity(owner.other()).name;
        let method = tpl::repository_lookup_name(related);
        if let Some(repository) = plan.layer_file(
            6,
            entity,
            FileLayer::Repository,
            entity.repository.as_deref(),
            entity.repository_path(),
        ) {
            plan.insert(
                6,
                (&entity.name, FileLayer::Repository, repository),
            format!("repository method {method}"),
                Fragment::new(Probe::Defines(method), tpl::repository_lookup(&entity.name, related))
                    .padded(Padding::BlankAfter),
                Anchor::BeforeMarker("def get_by_id".to_string()),
                None,
            );
        }
    }

    // 7. Association management on both services.
    if association.is_some() {
        for side in SIDES {
            let entity = config.entity(side);
            let other = config.entity(side.other());
            let Some(path) = plan.layer_file(
                7,
                entity,
                FileLayer::Service,
                entity.service.as_deref(),
                entity.service_path(),
            ) else {
                continue;
            };
            let repo_module = format!(
                "{}.{}.{}_repository",
                settings.import_root, other.name, other.name
            );
            let repo_class = format!("{}Repository", other.class_name);
            let spec = ImportSpec::new(repo_module, &[repo_class.as_str()]);
            plan.push(
                7,
                &entity.name,
                FileLayer::Service,
                path.clone(),
                format!("import {}", spec.statement()),
                Action::Import(spec),
            );

            let (add, remove) = tpl::association_method_names(&entity.name, &other.name);
            plan.insert(
                7,
                (&entity.name, FileLayer::Service, path),
                format!("service methods {add} and {remove}"),
                Fragment::new(Probe::Defines(add), tpl::association_methods(&entity.name, &other.name))
                    .padded(Padding::BlankBefore),
                Anchor::ClassBody(format!("{}Service", entity.class_name)),
                None,
            );
        }
    }

    plan
}

/// Typing import, field declaration and schema example for one DTO.
fn dto_entries(
    plan: &mut MutationPlan,
    descriptor: &EntityDescriptor,
    kind: DtoKind,
    (field, declaration, typing): (&str, &str, &str),
    example: &str,
) {
    let layer = FileLayer::from_dto(kind);
    let Some(path) = plan.layer_file(4, descriptor, layer, descriptor.dto(kind), descriptor.dto_path(kind)) else {
        return;
    };
    let (entity, class) = (descriptor.name.as_str(), descriptor.class_name.as_str());
    let spec = ImportSpec::new("typing", &[typing]);
    plan.push(4, entity, layer, path.clone(), format!("import {}", spec.statement()), Action::Import(spec));

    let fragment = Fragment::new(Probe::Declares(field.to_string()), declaration);
    plan.insert(
        4,
        (entity, layer, path.clone()),
        format!("field {declaration}"),
        fragment.clone(),
        Anchor::NamedBlock("model_config".to_string()),
        Some(Fallback {
            when_absent: Probe::Declares("model_config".to_string()),
            fragment,
            anchor: Anchor::ClassBody(format!("{class}{}", kind.class_suffix())),
        }),
    );

    plan.push(
        4,
        entity,
        layer,
        path,
        format!("schema example {field}"),
        Action::ExampleEntry {
            key: field.to_string(),
            value: example.to_string(),
        },
    );
}

/// `__init__.py` files making the shared models directory importable: the
/// directory itself and every parent below the entities root.
fn package_inits(dir: &Path, entities_root: &Path) -> Vec<PathBuf> {
    let mut inits = vec![dir.join("__init__.py")];
    let mut current = dir.parent();
    while let Some(parent) = current {
        if parent == entities_root || !parent.starts_with(entities_root) {
            break;
        }
        inits.push(parent.join("__init__.py"));
        current = parent.parent();
    }
    inits.reverse();
    inits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::tests::descriptor;

    fn plan_for(kind: RelationType, fk: Option<Side>) -> MutationPlan {
        let config =
            RelationshipConfig::new(descriptor("author"), descriptor("book"), kind, fk).unwrap();
        build_plan(&config, &Config::default(), Path::new(""))
    }

    fn descriptions(plan: &MutationPlan, entity: &str, layer: FileLayer) -> Vec<String> {
        plan.entries
            .iter()
            .filter(|e| e.entity == entity && e.layer == layer)
            .map(|e| e.description.clone())
            .collect()
    }

    #[test]
    fn test_steps_are_ordered() {
        let plan = plan_for(RelationType::OneToMany, None);
        let steps: Vec<u8> = plan.entries.iter().map(|e| e.step).collect();
        let mut sorted = steps.clone();
        sorted.sort_unstable();
        assert_eq!(steps, sorted);
        assert!(!steps.contains(&7));
    }

    #[test]
    fn test_one_to_many_models() {
        let plan = plan_for(RelationType::OneToMany, None);
        assert_eq!(
            descriptions(&plan, "book", FileLayer::Model),
            [
                "import from sqlalchemy import Column, ForeignKey, Integer",
                "import from sqlalchemy.orm import relationship",
                "foreign key author_id",
                "relationship author",
            ]
        );
        assert_eq!(
            descriptions(&plan, "author", FileLayer::Model),
            ["import from sqlalchemy.orm import relationship", "relationship books"]
        );
    }

    #[test]
    fn test_one_to_many_dto_cardinality() {
        let plan = plan_for(RelationType::OneToMany, None);
        assert!(descriptions(&plan, "author", FileLayer::OutDto).contains(&"field book_ids: List[int] = []".to_string()));
        assert!(descriptions(&plan, "book", FileLayer::OutDto).contains(&"field author_id: Optional[int] = None".to_string()));
        assert!(descriptions(&plan, "author", FileLayer::InDto).is_empty());
        assert!(descriptions(&plan, "book", FileLayer::InDto).contains(&"field author_id: Optional[int] = None".to_string()));
        assert!(descriptions(&plan, "book", FileLayer::UpdateDto).contains(&"schema example author_id".to_string()));
        assert_eq!(descriptions(&plan, "book", FileLayer::Repository), ["repository method get_by_author_id"]);
        assert!(descriptions(&plan, "author", FileLayer::Repository).is_empty());
    }

    #[test]
    fn test_many_to_many_shape() {
        let plan = plan_for(RelationType::ManyToMany, None);
        for entity in ["author", "book"] {
            let model = descriptions(&plan, entity, FileLayer::Model);
            assert!(!model.iter().any(|d| d.starts_with("foreign key")));
            assert!(model.contains(&"import from app.api.shared.models import author_book".to_string()));
            assert!(descriptions(&plan, entity, FileLayer::InDto).is_empty());
            assert!(descriptions(&plan, entity, FileLayer::Repository).is_empty());
        }
        let files: Vec<PathBuf> = plan
            .entries
            .iter()
            .filter(|e| e.layer == FileLayer::AssociationTable)
            .map(|e| e.path.clone())
            .collect();
        assert_eq!(
            files,
            [
                PathBuf::from("app/api/shared/__init__.py"),
                PathBuf::from("app/api/shared/models/__init__.py"),
                PathBuf::from("app/api/shared/models/author_book.py"),
            ]
        );
        let service = descriptions(&plan, "book", FileLayer::Service);
        assert!(service.contains(&"service methods add_author_to_book and remove_author_from_book".to_string()));
        assert!(service.contains(&"import from app.api.author.author_repository import AuthorRepository".to_string()));
    }

    #[test]
    fn test_layers_missing_from_registry_are_not_planned() {
        let mut author = descriptor("author");
        author.out_dto = None;
        author.service = None;
        let config =
            RelationshipConfig::new(author, descriptor("book"), RelationType::ManyToMany, None).unwrap();
        let plan = build_plan(&config, &Config::default(), Path::new(""));

        assert_eq!(descriptions(&plan, "author", FileLayer::OutDto), ["author not generated"]);
        assert_eq!(descriptions(&plan, "author", FileLayer::Service), ["author not generated"]);
        let absent: Vec<&PlanEntry> = plan
            .entries
            .iter()
            .filter(|e| e.action == Action::LayerAbsent)
            .collect();
        assert_eq!(absent.len(), 2);
        assert_eq!(absent[0].path, PathBuf::from("app/api/author/dto/author_out_dto.py"));
        assert_eq!(absent[1].path, PathBuf::from("app/api/author/author_service.py"));

        // The other side is untouched by the gaps.
        assert!(descriptions(&plan, "book", FileLayer::Service)
            .contains(&"service methods add_author_to_book and remove_author_from_book".to_string()));
    }

    #[test]
    fn test_one_to_one_unique_key_on_chosen_side() {
        let plan = plan_for(RelationType::OneToOne, Some(Side::Origin));
        let fk = plan
            .entries
            .iter()
            .find(|e| e.description == "foreign key book_id")
            .unwrap();
        assert_eq!(fk.entity, "author");
        match &fk.action {
            Action::Insert { fragment, .. } => assert!(fragment.body.ends_with("unique=True)")),
            other => panic!("unexpected action {other:?}"),
        }
        let rel = plan
            .entries
            .iter()
            .find(|e| e.description == "relationship author")
            .unwrap();
        match &rel.action {
            Action::Insert { fragment, .. } => assert_eq!(
                fragment.body,
                "author = relationship(\"Author\", back_populates=\"book\", uselist=False)"
            ),
            other => panic!("unexpected action {other:?}"),
        }
    }
}
