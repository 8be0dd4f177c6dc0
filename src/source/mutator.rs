//! Idempotent Mutator.
//!
//! Every edit is gated by an existence probe: if the construct is already in
//! the document, nothing changes and the outcome is `AlreadyPresent`. Only the
//! targeted line range is touched; everything else keeps its order and text.
use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use super::locator::{Anchor, InsertionPoint, locate};
use super::{SourceDocument, index::Item};

// ── Probes and fragments ─────────────────────────────────────────────

/// How to tell that a fragment is already in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "probe", content = "name", rename_all = "snake_case")]
pub enum Probe {
    /// A line declaring `<name> = ...` or `<name>: ...`.
    Declares(String),
    /// A `def <name>(` line.
    Defines(String),
    /// Any line containing the text.
    Contains(String),
}

impl Probe {
    pub fn matches(&self, doc: &SourceDocument) -> bool {
        match self {
            Probe::Declares(name) => {
                let re = line_regex(&format!(r"^\s*{}\s*(:|=[^=]|=$)", regex::escape(name)));
                doc.lines().iter().any(|l| re.is_match(l))
            }
            Probe::Defines(name) => {
                let re = line_regex(&format!(r"^\s*(async\s+)?def\s+{}\s*\(", regex::escape(name)));
                doc.lines().iter().any(|l| re.is_match(l))
            }
            Probe::Contains(text) => doc.contains(text),
        }
    }
}

fn line_regex(pattern: &str) -> Regex {
    // Patterns are built from escaped identifiers, so they always compile.
    Regex::new(pattern).unwrap()
}

/// Blank-line handling around an inserted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    None,
    /// Separate from what precedes it (a method appended to a class).
    BlankBefore,
    /// Separate from what follows it (a method inserted before another).
    BlankAfter,
}

/// A synthesized piece of source text with zero base indentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub probe: Probe,
    pub body: String,
    pub padding: Padding,
}

impl Fragment {
    pub fn new(probe: Probe, body: impl Into<String>) -> Self {
        Self {
            probe,
            body: body.into(),
            padding: Padding::None,
        }
    }

    #[must_use]
    pub fn padded(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The anchor is not in the file: it drifted from the scaffold shape.
    AnchorNotFound(String),
    /// The entity never had this layer generated.
    FileAbsent,
    /// Nothing to do for this file's shape (e.g. no schema example).
    NotApplicable(String),
    /// The file exists but could not be read.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "skip", rename_all = "snake_case")]
pub enum MutationOutcome {
    Inserted,
    AlreadyPresent,
    Skipped(SkipReason),
}

impl MutationOutcome {
    /// A locator miss: the file must not be written.
    pub fn is_miss(&self) -> bool {
        matches!(self, MutationOutcome::Skipped(SkipReason::AnchorNotFound(_)))
    }
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOutcome::Inserted => write!(f, "inserted"),
            MutationOutcome::AlreadyPresent => write!(f, "already present"),
            MutationOutcome::Skipped(SkipReason::AnchorNotFound(anchor)) => {
                write!(f, "skipped: {anchor} not found")
            }
            MutationOutcome::Skipped(SkipReason::FileAbsent) => write!(f, "skipped: file absent"),
            MutationOutcome::Skipped(SkipReason::NotApplicable(why)) => write!(f, "skipped: {why}"),
            MutationOutcome::Skipped(SkipReason::Unreadable(why)) => write!(f, "skipped: unreadable ({why})"),
        }
    }
}

// ── Fragment application ─────────────────────────────────────────────

/// Insert `fragment` at `point` unless its probe already matches.
pub fn apply_fragment(
    doc: &mut SourceDocument,
    fragment: &Fragment,
    point: InsertionPoint,
) -> MutationOutcome {
    if fragment.probe.matches(doc) {
        return MutationOutcome::AlreadyPresent;
    }

    let mut at = point.line.min(doc.len());
    if fragment.padding == Padding::BlankBefore && at > 0 && !doc.is_blank(at - 1) {
        doc.insert_blank(at);
        at += 1;
    }
    at += doc.insert_block(at, point.indent, &fragment.body);
    if fragment.padding == Padding::BlankAfter && !doc.is_blank(at) {
        doc.insert_blank(at);
    }

    MutationOutcome::Inserted
}

/// Probe, locate, then insert.
pub fn apply_at(doc: &mut SourceDocument, fragment: &Fragment, anchor: &Anchor) -> MutationOutcome {
    if fragment.probe.matches(doc) {
        return MutationOutcome::AlreadyPresent;
    }
    match locate(doc, anchor) {
        Some(point) => apply_fragment(doc, fragment, point),
        None => MutationOutcome::Skipped(SkipReason::AnchorNotFound(anchor.to_string())),
    }
}

// ── Imports ──────────────────────────────────────────────────────────

/// `from <module> import <symbols>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSpec {
    pub module: String,
    pub symbols: Vec<String>,
}

impl ImportSpec {
    pub fn new(module: impl Into<String>, symbols: &[&str]) -> Self {
        Self {
            module: module.into(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn statement(&self) -> String {
        format!("from {} import {}", self.module, self.symbols.join(", "))
    }
}

impl fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.statement())
    }
}

/// Make sure every symbol of `spec` is imported.
///
/// Symbols missing from an existing `from <module> import` statement are
/// merged into it; without such a statement a new line is appended to the
/// top-level import block.
pub fn ensure_import(doc: &mut SourceDocument, spec: &ImportSpec) -> MutationOutcome {
    let existing: Vec<Item> = doc.index().from_imports(&spec.module).cloned().collect();

    let mut present = HashSet::new();
    for item in &existing {
        present.extend(imported_symbols(doc, item));
    }
    if present.contains("*") {
        return MutationOutcome::AlreadyPresent;
    }

    let missing: Vec<String> = spec
        .symbols
        .iter()
        .filter(|s| !present.contains(&normalize_symbol(s)))
        .cloned()
        .collect();
    if missing.is_empty() {
        return MutationOutcome::AlreadyPresent;
    }

    match existing.first() {
        Some(item) => merge_into(doc, item, &missing),
        None => {
            let at = new_import_position(doc);
            let statement = ImportSpec {
                module: spec.module.clone(),
                symbols: missing,
            }
            .statement();
            doc.insert_block(at, 0, &statement);
        }
    }

    MutationOutcome::Inserted
}

fn normalize_symbol(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn imported_symbols(doc: &SourceDocument, item: &Item) -> Vec<String> {
    let text = (item.start..=item.header_end)
        .filter_map(|i| doc.line(i))
        .map(|l| split_comment(l).0)
        .collect::<Vec<_>>()
        .join(" ");
    let Some(pos) = text.find(" import ") else {
        return Vec::new();
    };
    text[pos + " import ".len()..]
        .replace(['(', ')', '\\'], " ")
        .split(',')
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect()
}

fn merge_into(doc: &mut SourceDocument, item: &Item, missing: &[String]) {
    let last = item.header_end;
    let line = doc.line(last).unwrap_or("").to_string();
    let (code, comment) = split_comment(&line);
    let comment = if comment.is_empty() {
        String::new()
    } else {
        format!("  {comment}")
    };

    // Parenthesized block whose closing paren sits on its own line.
    if last > item.start && code.trim_start().starts_with(')') {
        let prev = last - 1;
        let prev_line = doc.line(prev).unwrap_or("").to_string();
        let (prev_code, prev_comment) = split_comment(&prev_line);
        let indent = if prev > item.start {
            doc.indent_at(prev)
        } else {
            item.indent + 4
        };
        if prev > item.start && !prev_code.trim_end().ends_with(',') {
            let fixed = if prev_comment.is_empty() {
                format!("{},", prev_code.trim_end())
            } else {
                format!("{},  {prev_comment}", prev_code.trim_end())
            };
            doc.replace_line(prev, fixed);
        }
        let entries: Vec<String> = missing.iter().map(|s| format!("{s},")).collect();
        doc.insert_block(last, indent, &entries.join("\n"));
        return;
    }

    let joined = missing.join(", ");

    // A dangling `\` continuation: keep it last on the line.
    if let Some(body) = code.trim_end().strip_suffix('\\') {
        let body = body.trim_end();
        let sep = if body.ends_with(',') { " " } else { ", " };
        doc.replace_line(last, format!("{body}{sep}{joined}, \\{comment}"));
        return;
    }

    let merged = match code.rfind(')') {
        Some(pos) => {
            let before = code[..pos].trim_end();
            let sep = if before.ends_with(',') {
                " "
            } else if before.ends_with('(') {
                ""
            } else {
                ", "
            };
            format!("{before}{sep}{joined}{}{comment}", &code[pos..].trim_end())
        }
        None => format!("{}, {joined}{comment}", code.trim_end()),
    };
    doc.replace_line(last, merged);
}

/// After the leading import block, or after the leading comment and
/// docstring header when the file has no imports. Imports placed after the
/// first other statement do not extend the block.
fn new_import_position(doc: &SourceDocument) -> usize {
    let index = doc.index();
    let imports: HashSet<usize> = index.top_level_imports().map(|it| it.start).collect();
    let mut block_end = None;
    for (start, end) in index.top_level_statements() {
        if imports.contains(&start) {
            block_end = Some(end + 1);
            continue;
        }
        let text = doc.line(start).unwrap_or("").trim_start();
        if text.starts_with(['"', '\'']) {
            continue;
        }
        break;
    }
    if let Some(at) = block_end {
        return at;
    }
    let mut at = 0;
    while at < doc.len() {
        let line = doc.line(at).unwrap_or("").trim();
        if line.is_empty() || line.starts_with('#') {
            at += 1;
        } else if line.starts_with("\"\"\"") || line.starts_with("'''") {
            at = doc.index().statement_end(at) + 1;
        } else {
            break;
        }
    }
    at
}

/// Split a line into code and trailing `#` comment (quote aware).
fn split_comment(line: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return (&line[..i], &line[i..]),
            None => {}
        }
    }
    (line, "")
}

// ── Schema examples ──────────────────────────────────────────────────

/// Add `"<key>": <value>` to the `"example"` dict inside a DTO's
/// `model_config` literal.
///
/// DTOs without a `model_config` block or without an example are left alone
/// (`NotApplicable`); that is a normal shape, not a drift.
pub fn add_example_entry(doc: &mut SourceDocument, key: &str, value: &str) -> MutationOutcome {
    let Some(block) = doc.index().block("model_config").cloned() else {
        return not_applicable("no model_config block");
    };
    let Some(key_line) =
        (block.start..=block.header_end).find(|&i| doc.line(i).is_some_and(|l| l.contains("\"example\"")))
    else {
        return not_applicable("no schema example");
    };
    let Some((open, close)) = example_braces(doc, key_line, block.header_end) else {
        return not_applicable("schema example is not a dict");
    };

    let quoted = format!("\"{key}\"");
    let single = format!("'{key}'");
    if (open.0..=close.0).any(|i| {
        doc.line(i)
            .is_some_and(|l| l.contains(&quoted) || l.contains(&single))
    }) {
        return MutationOutcome::AlreadyPresent;
    }
    let entry = format!("{quoted}: {value}");

    let close_line = doc.line(close.0).unwrap_or("").to_string();
    let before_close = close_line[..close.1].trim_end();
    let inline = open.0 == close.0 || !before_close.trim().is_empty();

    if inline {
        let prefix_end = if open.0 == close.0 { open.1 + 1 } else { 0 };
        let head = &close_line[..prefix_end];
        let inner = close_line[prefix_end..close.1].trim_end();
        let body = if inner.trim().is_empty() {
            format!("{inner}{entry}")
        } else if inner.ends_with(',') {
            format!("{inner} {entry}")
        } else {
            format!("{inner}, {entry}")
        };
        doc.replace_line(close.0, format!("{head}{body}{}", &close_line[close.1..]));
        return MutationOutcome::Inserted;
    }

    let indent = (open.0 + 1..close.0)
        .find(|&i| !doc.is_blank(i))
        .map(|i| doc.indent_at(i))
        .unwrap_or_else(|| doc.indent_at(close.0) + 4);

    let mut prev = close.0 - 1;
    while prev > open.0 && doc.is_blank(prev) {
        prev -= 1;
    }
    if prev > open.0 {
        let prev_line = doc.line(prev).unwrap_or("").to_string();
        let trimmed = prev_line.trim_end();
        if !trimmed.ends_with(',') && !trimmed.ends_with('{') {
            doc.replace_line(prev, format!("{trimmed},"));
        }
    }
    doc.insert_block(close.0, indent, &format!("{entry},"));
    MutationOutcome::Inserted
}

fn not_applicable(why: &str) -> MutationOutcome {
    MutationOutcome::Skipped(SkipReason::NotApplicable(why.to_string()))
}

/// (line, byte offset) of the `{` opening the example dict and of its
/// matching `}`.
fn example_braces(
    doc: &SourceDocument,
    key_line: usize,
    last_line: usize,
) -> Option<((usize, usize), (usize, usize))> {
    let start_col = doc.line(key_line)?.find("\"example\"")? + "\"example\"".len();
    let mut open = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for li in key_line..=last_line {
        let line = doc.line(li)?;
        let from = if li == key_line { start_col } else { 0 };
        for (ci, c) in line[from..].char_indices() {
            let col = from + ci;
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '#' => break,
                '{' => {
                    if open.is_none() {
                        open = Some((li, col));
                    }
                    depth += 1;
                }
                '}' if open.is_some() => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((open?, (li, col)));
                    }
                }
                '[' | ',' | '}' if open.is_none() => return None,
                _ => {}
            }
        }
    }
    None
}
