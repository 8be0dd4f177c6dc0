//! Relationship Synthesis Planner.
//!
//! `RelationshipConfig` is decided once per invocation and then only read:
//! the plan builder derives every identifier on both sides from it, so the
//! two entities cannot disagree about names or cardinality.
pub mod executor;
pub mod plan;
pub mod report;
pub mod wizard;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{FamError, Result};
use crate::naming;
use crate::registry::EntityDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    OneToMany,
    ManyToOne,
    ManyToMany,
    OneToOne,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        RelationType::OneToMany,
        RelationType::ManyToOne,
        RelationType::ManyToMany,
        RelationType::OneToOne,
    ];

    /// One-line explanation shown in the type menu.
    pub fn describe(self, origin: &str, target: &str) -> String {
        match self {
            RelationType::OneToMany => format!("one {origin} has many {target}s"),
            RelationType::ManyToOne => format!("many {origin}s belong to one {target}"),
            RelationType::ManyToMany => format!("{origin}s and {target}s through {origin}_{target}"),
            RelationType::OneToOne => format!("one {origin} has one {target}"),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationType::OneToMany => "one-to-many",
            RelationType::ManyToOne => "many-to-one",
            RelationType::ManyToMany => "many-to-many",
            RelationType::OneToOne => "one-to-one",
        };
        f.pad(s)
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "one-to-many" | "1:n" | "o2m" => Ok(RelationType::OneToMany),
            "many-to-one" | "n:1" | "m2o" => Ok(RelationType::ManyToOne),
            "many-to-many" | "n:m" | "m2m" => Ok(RelationType::ManyToMany),
            "one-to-one" | "1:1" | "o2o" => Ok(RelationType::OneToOne),
            other => Err(format!(
                "unknown relation type `{other}` (expected one-to-many, many-to-one, many-to-many or one-to-one)"
            )),
        }
    }
}

/// Which side of the relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Origin,
    Target,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Origin => Side::Target,
            Side::Target => Side::Origin,
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "origin" => Ok(Side::Origin),
            "target" => Ok(Side::Target),
            other => Err(format!("expected `origin` or `target`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipConfig {
    pub origin: EntityDescriptor,
    pub target: EntityDescriptor,
    pub relation_type: RelationType,
    pub foreign_key_in_target: bool,
    pub is_list_in_origin: bool,
    pub is_list_in_target: bool,
}

impl RelationshipConfig {
    /// Decide the configuration for `(origin, target, type)`.
    ///
    /// `fk_side` only matters for one-to-one, where it defaults to the
    /// target; the other types fix the foreign-key side themselves.
    pub fn new(
        origin: EntityDescriptor,
        target: EntityDescriptor,
        relation_type: RelationType,
        fk_side: Option<Side>,
    ) -> Result<Self> {
        if origin.name == target.name {
            return Err(FamError::SelfRelation(origin.name));
        }

        let (foreign_key_in_target, is_list_in_origin, is_list_in_target) = match relation_type {
            RelationType::OneToMany => (true, true, false),
            RelationType::ManyToOne => (false, false, true),
            RelationType::ManyToMany => (false, true, true),
            RelationType::OneToOne => (fk_side.unwrap_or(Side::Target) == Side::Target, false, false),
        };

        Ok(Self {
            origin,
            target,
            relation_type,
            foreign_key_in_target,
            is_list_in_origin,
            is_list_in_target,
        })
    }

    pub fn entity(&self, side: Side) -> &EntityDescriptor {
        match side {
            Side::Origin => &self.origin,
            Side::Target => &self.target,
        }
    }

    /// Whether `side`'s relationship attribute holds many rows.
    pub fn is_list(&self, side: Side) -> bool {
        match side {
            Side::Origin => self.is_list_in_origin,
            Side::Target => self.is_list_in_target,
        }
    }

    /// Side holding the foreign-key column; none for many-to-many.
    pub fn fk_owner(&self) -> Option<Side> {
        match self.relation_type {
            RelationType::ManyToMany => None,
            _ if self.foreign_key_in_target => Some(Side::Target),
            _ => Some(Side::Origin),
        }
    }

    /// Name of the relationship attribute declared on `side`.
    pub fn relationship_name(&self, side: Side) -> String {
        let other = &self.entity(side.other()).name;
        if self.is_list(side) {
            naming::plural(other)
        } else {
            other.clone()
        }
    }

    /// Association table name, for many-to-many only.
    pub fn association_table(&self) -> Option<String> {
        (self.relation_type == RelationType::ManyToMany)
            .then(|| naming::association_table(&self.origin.name, &self.target.name))
    }

    /// Outbound DTO field `side` gains.
    pub fn out_dto_field(&self, side: Side) -> String {
        let other = &self.entity(side.other()).name;
        if self.is_list(side) {
            naming::ids_field(other)
        } else {
            naming::id_field(other)
        }
    }

    /// Human-readable summary of every decision, shown before confirmation.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} {} -> {}",
            self.relation_type, self.origin.name, self.target.name
        )];

        match self.fk_owner() {
            Some(owner) => {
                let referenced = &self.entity(owner.other()).name;
                let unique = if self.relation_type == RelationType::OneToOne {
                    " (unique)"
                } else {
                    ""
                };
                lines.push(format!(
                    "{} model gets foreign key {}{unique}",
                    self.entity(owner).name,
                    naming::id_field(referenced)
                ));
            }
            None => {
                if let Some(table) = self.association_table() {
                    lines.push(format!("association table {table} is created"));
                }
            }
        }

        for side in [Side::Origin, Side::Target] {
            let entity = &self.entity(side).name;
            let kind = if self.is_list(side) { "list" } else { "single" };
            lines.push(format!(
                "{entity} model gets {kind} relationship {}",
                self.relationship_name(side)
            ));
            let field = self.out_dto_field(side);
            let ty = if self.is_list(side) { "List[int]" } else { "Optional[int]" };
            lines.push(format!("{entity}_out_dto gets {field}: {ty}"));
        }

        if let Some(owner) = self.fk_owner() {
            let entity = &self.entity(owner).name;
            let referenced = &self.entity(owner.other()).name;
            lines.push(format!(
                "{entity}_in_dto and {entity}_update_dto get {}: Optional[int]",
                naming::id_field(referenced)
            ));
            lines.push(format!(
                "{entity} repository gets get_by_{}",
                naming::id_field(referenced)
            ));
        } else {
            for side in [Side::Origin, Side::Target] {
                let entity = &self.entity(side).name;
                let related = &self.entity(side.other()).name;
                lines.push(format!(
                    "{entity} service gets add_{related}_to_{entity} and remove_{related}_from_{entity}"
                ));
            }
        }

        lines
    }
}
