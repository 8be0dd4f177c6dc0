//! Relationship fragments.
//!
//! Every builder returns text with zero base indentation; the mutator shifts
//! it to the indentation of the anchor it lands on.
use crate::naming::{class_name, id_field, ids_field, plural, table_name};

/// `author_id = Column(Integer, ForeignKey("authors.id"))`
pub fn foreign_key_column(referenced: &str, unique: bool) -> String {
    let unique = if unique { ", unique=True" } else { "" };
    format!(
        "{} = Column(Integer, ForeignKey(\"{}.id\"){unique})",
        id_field(referenced),
        table_name(referenced)
    )
}

/// One side of a SQLAlchemy `relationship(...)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDecl {
    /// Attribute name on the declaring model.
    pub name: String,
    /// Class name of the related model.
    pub related_class: String,
    /// Association table for many-to-many.
    pub secondary: Option<String>,
    /// Attribute name of the reciprocal declaration.
    pub back_populates: Option<String>,
    /// Explicit `uselist` flag; only emitted for single-valued sides.
    pub uselist: Option<bool>,
}

impl RelationshipDecl {
    pub fn new(name: impl Into<String>, related_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            related_class: related_class.into(),
            secondary: None,
            back_populates: None,
            uselist: None,
        }
    }

    #[must_use]
    pub fn secondary(mut self, table: impl Into<String>) -> Self {
        self.secondary = Some(table.into());
        self
    }

    #[must_use]
    pub fn back_populates(mut self, name: impl Into<String>) -> Self {
        self.back_populates = Some(name.into());
        self
    }

    #[must_use]
    pub fn uselist(mut self, uselist: bool) -> Self {
        self.uselist = Some(uselist);
        self
    }

    pub fn render(&self) -> String {
        let mut params = vec![format!("\"{}\"", self.related_class)];
        if let Some(table) = &self.secondary {
            params.push(format!("secondary=\"{table}\""));
        }
        if let Some(back) = &self.back_populates {
            params.push(format!("back_populates=\"{back}\""));
        }
        if let Some(uselist) = self.uselist {
            params.push(format!("uselist={}", if uselist { "True" } else { "False" }));
        }
        format!("{} = relationship({})", self.name, params.join(", "))
    }
}

/// Module holding the many-to-many association table, as a whole file.
pub fn association_table(origin: &str, target: &str) -> String {
    let table = crate::naming::association_table(origin, target);
    let column = |entity: &str| {
        format!(
            "    Column(\"{}\", Integer, ForeignKey(\"{}.id\"), primary_key=True),",
            id_field(entity),
            table_name(entity)
        )
    };
    format!(
        "# Association table for the many-to-many relationship between {origin} and {target}\n\
         from sqlalchemy import Column, ForeignKey, Integer, Table\n\
         \n\
         from app.db.database import Base\n\
         \n\
         {table} = Table(\n    \"{table}\",\n    Base.metadata,\n{}\n{}\n)\n",
        column(origin),
        column(target)
    )
}

/// Outbound DTO field: id list for list-valued sides, optional id otherwise.
pub fn out_dto_field(related: &str, is_list: bool) -> String {
    if is_list {
        format!("{}: List[int] = []", ids_field(related))
    } else {
        format!("{}: Optional[int] = None", id_field(related))
    }
}

/// Inbound/update DTO field. Always scalar: lists are never accepted on input.
pub fn in_dto_field(related: &str) -> String {
    format!("{}: Optional[int] = None", id_field(related))
}

/// Value used for the field in a DTO's schema example.
pub fn example_value(is_list: bool) -> &'static str {
    if is_list { "[1, 2, 3]" } else { "1" }
}

/// Statements populating the relationship field inside `model_to_dto`.
pub fn conversion_logic(related: &str, is_list: bool) -> String {
    if is_list {
        let attr = plural(related);
        let field = ids_field(related);
        format!(
            "# Include {attr} ids\n\
             if hasattr(entity, \"{attr}\") and entity.{attr}:\n\
             \x20   dto_dict[\"{field}\"] = [item.id for item in entity.{attr}]\n\
             else:\n\
             \x20   dto_dict[\"{field}\"] = []"
        )
    } else {
        let field = id_field(related);
        format!(
            "# Include {related} id\n\
             if hasattr(entity, \"{related}\") and entity.{related}:\n\
             \x20   dto_dict[\"{field}\"] = entity.{related}.id\n\
             else:\n\
             \x20   dto_dict[\"{field}\"] = None"
        )
    }
}

/// Marker text identifying the conversion logic for `related` in a service.
pub fn conversion_marker(related: &str, is_list: bool) -> String {
    let field = if is_list { ids_field(related) } else { id_field(related) };
    format!("dto_dict[\"{field}\"]")
}

/// A complete `model_to_dto` for services that lack one.
pub fn model_to_dto_method(entity: &str, related: &str, is_list: bool) -> String {
    let class = class_name(entity);
    let logic = indent(&conversion_logic(related, is_list), 4);
    format!(
        "def model_to_dto(self, entity):\n\
         \x20   if not entity:\n\
         \x20       return None\n\
         \x20   dto_dict = {{\n\
         \x20       column.name: getattr(entity, column.name)\n\
         \x20       for column in entity.__table__.columns\n\
         \x20   }}\n\
         {logic}\n\
         \x20   from .dto.{entity}_out_dto import {class}OutDto\n\
         \n\
         \x20   return {class}OutDto(**dto_dict)"
    )
}

/// `get_by_<related>_id` lookup on the foreign-key owner's repository.
pub fn repository_lookup(entity: &str, related: &str) -> String {
    let field = id_field(related);
    format!(
        "def get_by_{field}(self, {field}: int):\n\
         \x20   \"\"\"All {plural} with the given {field}.\"\"\"\n\
         \x20   return self.db.query(self.model).filter(\n\
         \x20       self.model.{field} == {field}\n\
         \x20   ).all()",
        plural = plural(entity)
    )
}

pub fn repository_lookup_name(related: &str) -> String {
    format!("get_by_{}", id_field(related))
}

/// `add_<related>_to_<entity>` / `remove_<related>_from_<entity>` on a
/// many-to-many service.
pub fn association_methods(entity: &str, related: &str) -> String {
    let related_class = class_name(related);
    let attr = plural(related);
    let (add, remove) = association_method_names(entity, related);
    format!(
        "def {add}(self, {entity}_id: int, {related}_id: int) -> bool:\n\
         \x20   {entity}_obj = self.repository.get_by_id({entity}_id)\n\
         \x20   {related}_repo = {related_class}Repository(self.repository.db)\n\
         \x20   {related}_obj = {related}_repo.get_by_id({related}_id)\n\
         \x20   if {entity}_obj and {related}_obj:\n\
         \x20       if {related}_obj not in {entity}_obj.{attr}:\n\
         \x20           {entity}_obj.{attr}.append({related}_obj)\n\
         \x20           self.repository.db.commit()\n\
         \x20       return True\n\
         \x20   return False\n\
         \n\
         def {remove}(self, {entity}_id: int, {related}_id: int) -> bool:\n\
         \x20   {entity}_obj = self.repository.get_by_id({entity}_id)\n\
         \x20   if not {entity}_obj:\n\
         \x20       return False\n\
         \x20   {entity}_obj.{attr} = [r for r in {entity}_obj.{attr} if r.id != {related}_id]\n\
         \x20   self.repository.db.commit()\n\
         \x20   return True"
    )
}

pub fn association_method_names(entity: &str, related: &str) -> (String, String) {
    (
        format!("add_{related}_to_{entity}"),
        format!("remove_{related}_from_{entity}"),
    )
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{pad}{l}") })
        .collect::<Vec<_>>()
        .join("\n")
}
