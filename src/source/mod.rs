//! Source Document Model.
//!
//! A generated file held as an ordered list of lines, read fresh from disk,
//! patched in memory and written back in one piece. The structural index is
//! computed lazily on first query and thrown away on every edit, so lookups
//! always reflect the current text.
pub mod index;
pub mod locator;
pub mod mutator;

use std::cell::OnceCell;
use std::fs;
use std::path::Path;

use crate::error::{FamError, Result};
use index::StructuralIndex;

/// Columns a tab counts for when measuring indentation.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct SourceDocument {
    lines: Vec<String>,
    trailing_newline: bool,
    crlf: bool,
    modified: bool,
    index: OnceCell<StructuralIndex>,
}

impl SourceDocument {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            trailing_newline: text.is_empty() || text.ends_with('\n'),
            crlf: text.contains("\r\n"),
            modified: false,
            index: OnceCell::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FamError::io(path, e))?;
        Ok(Self::parse(&text))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.text()).map_err(|e| FamError::io(path, e))
    }

    /// Render the document, keeping the original line endings.
    pub fn text(&self) -> String {
        let sep = if self.crlf { "\r\n" } else { "\n" };
        let mut out = self.lines.join(sep);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(sep);
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any edit has been applied since the document was read.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// First line at or after `from` containing `needle`.
    pub fn find_line(&self, needle: &str, from: usize) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, l)| l.contains(needle))
            .map(|(i, _)| i)
    }

    pub fn is_blank(&self, idx: usize) -> bool {
        self.line(idx).is_some_and(|l| l.trim().is_empty())
    }

    pub fn indent_at(&self, idx: usize) -> usize {
        self.line(idx).map(indent_width).unwrap_or(0)
    }

    pub fn index(&self) -> &StructuralIndex {
        self.index.get_or_init(|| StructuralIndex::build(&self.lines))
    }

    /// Insert `text` before line `at`, shifting every non-empty line of it
    /// right by `indent` columns. Relative indentation inside `text` is kept.
    /// Returns the number of lines inserted.
    pub fn insert_block(&mut self, at: usize, indent: usize, text: &str) -> usize {
        let pad = " ".repeat(indent);
        let new_lines: Vec<String> = text
            .lines()
            .map(|l| {
                if l.trim().is_empty() {
                    String::new()
                } else {
                    format!("{pad}{l}")
                }
            })
            .collect();
        let count = new_lines.len();
        let at = at.min(self.lines.len());
        self.lines.splice(at..at, new_lines);
        self.touch();
        count
    }

    pub fn insert_blank(&mut self, at: usize) {
        let at = at.min(self.lines.len());
        self.lines.insert(at, String::new());
        self.touch();
    }

    pub fn replace_line(&mut self, idx: usize, new: String) {
        if let Some(slot) = self.lines.get_mut(idx) {
            if *slot != new {
                *slot = new;
                self.touch();
            }
        }
    }

    fn touch(&mut self) {
        self.modified = true;
        self.index = OnceCell::new();
    }
}

/// Leading whitespace width of a line.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_roundtrip_preserves_text() {
        let text = "class A:\n    x = 1\n\n    y = 2\n";
        assert_eq!(SourceDocument::parse(text).text(), text);

        let no_trailing = "a = 1\nb = 2";
        assert_eq!(SourceDocument::parse(no_trailing).text(), no_trailing);

        let crlf = "a = 1\r\nb = 2\r\n";
        assert_eq!(SourceDocument::parse(crlf).text(), crlf);
    }

    #[test]
    fn test_insert_block_reindents() {
        let mut doc = SourceDocument::parse("class A:\n    x = 1\n");
        let n = doc.insert_block(2, 4, "def f(self):\n    return 1\n\n");
        assert_eq!(n, 3);
        assert_eq!(
            doc.text(),
            "class A:\n    x = 1\n    def f(self):\n        return 1\n\n"
        );
        assert!(doc.is_modified());
    }

    #[test]
    fn test_find_and_indent() {
        let doc = SourceDocument::parse("class A:\n\tx = 1\n    def get_by_id(self):\n");
        assert_eq!(doc.find_line("def get_by_id", 0), Some(2));
        assert_eq!(doc.find_line("class", 1), None);
        assert_eq!(doc.indent_at(1), 4);
        assert_eq!(doc.indent_at(2), 4);
        assert!(doc.contains("x = 1"));
    }

    #[test]
    fn test_replace_same_line_is_not_a_modification() {
        let mut doc = SourceDocument::parse("a = 1\n");
        doc.replace_line(0, "a = 1".to_string());
        assert!(!doc.is_modified());
        doc.replace_line(0, "a = 2".to_string());
        assert!(doc.is_modified());
    }

    #[test]
    fn test_read_and_write() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        write!(temp, "x = 1\n").unwrap();

        let mut doc = SourceDocument::read(temp.path()).unwrap();
        doc.insert_block(1, 0, "y = 2");
        doc.write(temp.path()).unwrap();

        assert_eq!(fs::read_to_string(temp.path()).unwrap(), "x = 1\ny = 2\n");
    }
}
