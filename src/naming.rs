/// Entity naming rules shared by the templates, the registry and the planner.
///
/// Every generated identifier (class names, table names, relationship names,
/// DTO field names) is derived here so the two sides of a relationship always
/// agree on spelling.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FamError, Result};

static ENTITY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid entity name regex"));

/// Normalize and validate a user-supplied entity name.
///
/// Names are lowercased and must be a plain snake_case identifier.
pub fn normalize_entity_name(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    if !ENTITY_NAME.is_match(&name) || name.ends_with('_') || name.contains("__") {
        return Err(FamError::InvalidEntityName(raw.to_string()));
    }
    Ok(name)
}

/// `order_item` -> `OrderItem`.
pub fn class_name(entity: &str) -> String {
    entity
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Naive plural. Table names and list relationship names both go through
/// this, so it only has to be consistent, not grammatical.
pub fn plural(entity: &str) -> String {
    format!("{entity}s")
}

/// Name of the table backing an entity (`__tablename__`).
pub fn table_name(entity: &str) -> String {
    plural(entity)
}

/// Foreign-key column / scalar DTO field referencing `entity`.
pub fn id_field(entity: &str) -> String {
    format!("{entity}_id")
}

/// Id-list DTO field referencing many `entity` rows.
pub fn ids_field(entity: &str) -> String {
    format!("{entity}_ids")
}

/// Association table joining `origin` and `target`.
pub fn association_table(origin: &str, target: &str) -> String {
    format!("{origin}_{target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_entity_name() {
        assert_eq!(normalize_entity_name("Author").unwrap(), "author");
        assert_eq!(normalize_entity_name(" order_item ").unwrap(), "order_item");
        assert!(normalize_entity_name("1book").is_err());
        assert!(normalize_entity_name("book-shelf").is_err());
        assert!(normalize_entity_name("book_").is_err());
        assert!(normalize_entity_name("").is_err());
    }

    #[test]
    fn test_class_name() {
        assert_eq!(class_name("author"), "Author");
        assert_eq!(class_name("order_item"), "OrderItem");
    }

    #[test]
    fn test_derived_identifiers() {
        assert_eq!(table_name("book"), "books");
        assert_eq!(id_field("author"), "author_id");
        assert_eq!(ids_field("book"), "book_ids");
        assert_eq!(association_table("author", "book"), "author_book");
    }
}
