//! Per-file structural index.
//!
//! A single pass over the lines of a generated Python file records every
//! import, class, method and literal-assignment block together with its line
//! range and body indentation. Anchors are resolved against this index
//! instead of re-scanning raw text, so a class named `Book` is found as a
//! class and not as the substring of a comment or a docstring.
//!
//! This is not a parser: it understands brackets, triple-quoted strings and
//! indentation, which is all the scaffold's shape requires.
use std::sync::LazyLock;

use regex::Regex;

use super::indent_width;

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*class\s+([A-Za-z_]\w*)").unwrap());
static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)").unwrap());
static FROM_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").unwrap());
static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+([\w.]+)").unwrap());
static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_]\w*)\s*(?::[^=]+)?=\s*[\[{(]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// `from <module> import ...`
    FromImport,
    /// `import <module>`
    Import,
    Class,
    Method,
    /// `<name> = {`, `<name> = [` or `<name> = (` (dict/list/tuple literal).
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    /// Module for imports, identifier otherwise.
    pub name: String,
    /// First line of the statement.
    pub start: usize,
    /// Last line of the header statement (inclusive). For imports and blocks
    /// this is the last line of the whole statement.
    pub header_end: usize,
    /// One past the last non-blank line belonging to the item.
    pub end: usize,
    pub indent: usize,
    /// Indentation of the item's members; equal to `indent` for items
    /// without a body.
    pub body_indent: usize,
}

impl Item {
    pub fn contains(&self, other: &Item) -> bool {
        other.start > self.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LineInfo {
    /// Blank or comment-only line outside any string.
    empty: bool,
    /// First line of a logical statement.
    stmt_start: bool,
    /// For statement starts: last line of the statement.
    stmt_end: usize,
    indent: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StructuralIndex {
    items: Vec<Item>,
    lines: Vec<LineInfo>,
}

impl StructuralIndex {
    pub fn build(lines: &[String]) -> Self {
        let infos = scan_lines(lines);
        let mut items = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let info = infos[i];
            if !info.stmt_start {
                continue;
            }
            let header_end = info.stmt_end;

            let (kind, name) = if let Some(c) = CLASS_RE.captures(line) {
                (ItemKind::Class, c[1].to_string())
            } else if let Some(c) = DEF_RE.captures(line) {
                (ItemKind::Method, c[1].to_string())
            } else if let Some(c) = FROM_IMPORT_RE.captures(line) {
                (ItemKind::FromImport, c[1].to_string())
            } else if let Some(c) = IMPORT_RE.captures(line) {
                (ItemKind::Import, c[1].to_string())
            } else if let Some(c) = BLOCK_RE.captures(line) {
                (ItemKind::Block, c[1].to_string())
            } else {
                continue;
            };

            let (end, body_indent) = match kind {
                ItemKind::Class | ItemKind::Method => body_extent(&infos, header_end, info.indent),
                _ => (header_end + 1, info.indent),
            };

            items.push(Item {
                kind,
                name,
                start: i,
                header_end,
                end,
                indent: info.indent,
                body_indent,
            });
        }

        Self {
            items,
            lines: infos,
        }
    }

    pub fn class(&self, name: &str) -> Option<&Item> {
        self.find(ItemKind::Class, name)
    }

    /// A method declared inside `class`.
    pub fn method_in(&self, class: &Item, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|it| it.kind == ItemKind::Method && it.name == name && class.contains(it))
    }

    pub fn block(&self, name: &str) -> Option<&Item> {
        self.find(ItemKind::Block, name)
    }

    /// `from <module> import ...` statements for `module`.
    pub fn from_imports<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .iter()
            .filter(move |it| it.kind == ItemKind::FromImport && it.name == module)
    }

    /// Imports at column zero, in file order.
    pub fn top_level_imports(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|it| {
            matches!(it.kind, ItemKind::FromImport | ItemKind::Import) && it.indent == 0
        })
    }

    /// `(first, last)` lines of every statement at column zero, in file order.
    pub fn top_level_statements(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, info)| info.stmt_start && info.indent == 0)
            .map(|(i, info)| (i, info.stmt_end))
    }

    /// Last line of the statement starting at `line`, or `line` itself when
    /// it does not start a statement.
    pub fn statement_end(&self, line: usize) -> usize {
        match self.lines.get(line) {
            Some(info) if info.stmt_start => info.stmt_end,
            _ => line,
        }
    }

    fn find(&self, kind: ItemKind, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|it| it.kind == kind && it.name == name)
    }
}

/// Extent of a class/def body that starts after `header_end`.
fn body_extent(infos: &[LineInfo], header_end: usize, indent: usize) -> (usize, usize) {
    let mut end = header_end + 1;
    let mut body_indent = None;

    for (j, info) in infos.iter().enumerate().skip(header_end + 1) {
        if info.empty {
            continue;
        }
        if info.stmt_start && info.indent <= indent {
            break;
        }
        if info.stmt_start && body_indent.is_none() {
            body_indent = Some(info.indent);
        }
        end = j + 1;
    }

    (end, body_indent.unwrap_or(indent + 4))
}

fn scan_lines(lines: &[String]) -> Vec<LineInfo> {
    let mut infos = vec![LineInfo::default(); lines.len()];
    let mut depth: i32 = 0;
    let mut open_triple: Option<&'static str> = None;
    let mut open_stmt: Option<usize> = None;
    // Previous line ended in a `\` continuation.
    let mut continued = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        infos[i].indent = indent_width(line);
        infos[i].stmt_end = i;

        if let Some(delim) = open_triple {
            // Inside a multi-line string: belongs to the enclosing statement.
            if line.matches(delim).count() % 2 == 1 {
                open_triple = None;
                close_statement(&mut infos, &mut open_stmt, depth, i);
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            infos[i].empty = depth == 0;
            continue;
        }

        if depth == 0 && !continued {
            infos[i].stmt_start = true;
            open_stmt = Some(i);
        }

        let (delta, backslash) = scan_code(line);
        depth = (depth + delta).max(0);
        continued = backslash;

        for delim in ["\"\"\"", "'''"] {
            if line.matches(delim).count() % 2 == 1 {
                open_triple = Some(delim);
                break;
            }
        }

        if open_triple.is_none() && !continued {
            close_statement(&mut infos, &mut open_stmt, depth, i);
        }
    }

    infos
}

fn close_statement(infos: &mut [LineInfo], open: &mut Option<usize>, depth: i32, line: usize) {
    if depth == 0 {
        if let Some(start) = open.take() {
            infos[start].stmt_end = line;
        }
    }
}

/// Net bracket balance of a line, ignoring string contents and comments,
/// and whether its code part ends in a `\` line continuation.
fn scan_code(line: &str) -> (i32, bool) {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut code_end = line.len();

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => {
                code_end = i;
                break;
            }
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => delta += 1,
            ')' | ']' | '}' => delta -= 1,
            _ => {}
        }
    }

    let continued = quote.is_none() && line[..code_end].trim_end().ends_with('\\');
    (delta, continued)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> StructuralIndex {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        StructuralIndex::build(&lines)
    }

    const SERVICE: &str = r#"# Service for book
from typing import List, Optional
from sqlalchemy.orm import Session

from .book_repository import BookRepository


class BookService:
    """Business logic for book.

    class NotAClass:
    """

    def __init__(self, db: Session):
        self.repository = BookRepository(db)

    def model_to_dto(
        self,
        entity,
    ):
        if not entity:
            return None
        dto_dict = {
            column.name: getattr(entity, column.name)
            for column in entity.__table__.columns
        }
        return dto_dict


def helper():
    pass
"#;

    #[test]
    fn test_classes_and_methods() {
        let index = build(SERVICE);
        let class = index.class("BookService").expect("class indexed");
        assert_eq!(class.start, 7);
        assert_eq!(class.body_indent, 4);
        // Ends after `return dto_dict`, before the blank lines and `helper`.
        assert_eq!(class.end, 27);
        assert!(index.class("NotAClass").is_none());

        let method = index.method_in(class, "model_to_dto").unwrap();
        assert_eq!(method.start, 16);
        assert_eq!(method.header_end, 19);
        assert_eq!(method.body_indent, 8);

        assert!(index.method_in(class, "helper").is_none());
    }

    #[test]
    fn test_imports_and_blocks() {
        let index = build(SERVICE);
        let typing: Vec<_> = index.from_imports("typing").collect();
        assert_eq!(typing.len(), 1);
        assert_eq!(typing[0].start, 1);
        assert_eq!(index.top_level_imports().count(), 3);

        let block = index.block("dto_dict").unwrap();
        assert_eq!(block.start, 22);
        assert_eq!(block.header_end, 25);
        assert_eq!(index.statement_end(22), 25);
    }

    #[test]
    fn test_parenthesized_import_spans_lines() {
        let index = build("from sqlalchemy import (\n    Column,\n    String,\n)\nx = 1\n");
        let item = index.from_imports("sqlalchemy").next().unwrap();
        assert_eq!(item.start, 0);
        assert_eq!(item.header_end, 3);
    }

    #[test]
    fn test_backslash_continuation_spans_lines() {
        let index = build("from sqlalchemy import Column, \\\n    String\nx = 1  # not \\\ny = 2\n");
        let item = index.from_imports("sqlalchemy").next().unwrap();
        assert_eq!(item.header_end, 1);
        let starts: Vec<(usize, usize)> = index.top_level_statements().collect();
        assert_eq!(starts, [(0, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_brackets_in_strings_are_ignored() {
        assert_eq!(scan_code(r#"x = "(" + '[' # ({"#), (0, false));
        assert_eq!(scan_code("model_config = {"), (1, false));
    }
}
