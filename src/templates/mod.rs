//! Template Synthesizer.
//!
//! Pure builders from entity names and relation parameters to Python source
//! text. Nothing in here reads or writes files.
pub mod entity;
pub mod project;
pub mod relation;

use crate::naming;

/// Substitute the entity placeholders of a file template.
///
/// `{{name}}` is the entity name, `{{Class}}` its class name and `{{table}}`
/// its table name. Python sources never contain a doubled brace, so the
/// markers cannot collide with dict or set literals.
pub(crate) fn fill(template: &str, entity: &str) -> String {
    template
        .replace("{{name}}", entity)
        .replace("{{Class}}", &naming::class_name(entity))
        .replace("{{table}}", &naming::table_name(entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_every_marker() {
        let out = fill("class {{Class}}:  # {{name}} -> {{table}}\n    x = {}\n", "order_item");
        assert_eq!(out, "class OrderItem:  # order_item -> order_items\n    x = {}\n");
    }
}
