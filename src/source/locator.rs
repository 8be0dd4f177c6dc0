//! Structural Locator: resolve a semantic anchor to an insertion point.
//!
//! A miss is `None`, never an error. Callers treat it as "this file has
//! drifted from the scaffold shape" and leave the file alone.
use std::fmt;

use serde::Serialize;

use super::SourceDocument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Anchor {
    /// End of the named class body, at member indentation.
    ClassBody(String),
    /// Just before the named literal-assignment block (e.g. `model_config`),
    /// after the last non-blank line preceding it.
    NamedBlock(String),
    /// Just after the statement inside `class.method` that contains `marker`.
    MethodBody {
        class: String,
        method: String,
        marker: String,
    },
    /// Just before the first line containing the marker text.
    BeforeMarker(String),
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::ClassBody(name) => write!(f, "body of class {name}"),
            Anchor::NamedBlock(name) => write!(f, "block `{name}`"),
            Anchor::MethodBody {
                class,
                method,
                marker,
            } => write!(f, "`{marker}` in method {class}.{method}"),
            Anchor::BeforeMarker(marker) => write!(f, "line containing `{marker}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    /// New lines go before this line index.
    pub line: usize,
    /// Indentation width the inserted lines get.
    pub indent: usize,
}

pub fn locate(doc: &SourceDocument, anchor: &Anchor) -> Option<InsertionPoint> {
    let index = doc.index();

    match anchor {
        Anchor::ClassBody(class) => {
            let item = index.class(class)?;
            Some(InsertionPoint {
                line: item.end,
                indent: item.body_indent,
            })
        }
        Anchor::NamedBlock(name) => {
            let item = index.block(name)?;
            let mut line = item.start;
            while line > 0 && doc.is_blank(line - 1) {
                line -= 1;
            }
            Some(InsertionPoint {
                line,
                indent: item.indent,
            })
        }
        Anchor::MethodBody {
            class,
            method,
            marker,
        } => {
            let owner = index.class(class)?;
            let item = index.method_in(owner, method)?;
            let hit = (item.header_end + 1..item.end)
                .find(|&i| doc.line(i).is_some_and(|l| l.contains(marker.as_str())))?;
            Some(InsertionPoint {
                line: index.statement_end(hit) + 1,
                indent: doc.indent_at(hit),
            })
        }
        Anchor::BeforeMarker(marker) => {
            let hit = doc.find_line(marker, 0)?;
            Some(InsertionPoint {
                line: hit,
                indent: doc.indent_at(hit),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "\
# ORM model for book
from sqlalchemy import Column, String

from app.db.database import Base


class Book(Base):
    __tablename__ = \"books\"

    title = Column(String(100), nullable=False)


def unrelated():
    pass
";

    #[test]
    fn test_class_body_lands_inside_class() {
        let doc = SourceDocument::parse(MODEL);
        let point = locate(&doc, &Anchor::ClassBody("Book".into())).unwrap();
        // Right after `title = ...`, before the blank lines and `unrelated`.
        assert_eq!(point, InsertionPoint { line: 10, indent: 4 });
    }

    #[test]
    fn test_class_body_miss_leaves_document_unchanged() {
        let doc = SourceDocument::parse(MODEL);
        assert!(locate(&doc, &Anchor::ClassBody("Author".into())).is_none());
        assert_eq!(doc.text(), MODEL);
    }

    #[test]
    fn test_named_block_skips_back_over_blank_lines() {
        let dto = "class BookOutDto(BaseModel):\n    id: int\n    title: str\n\n    model_config = {\"from_attributes\": True}\n";
        let doc = SourceDocument::parse(dto);
        let point = locate(&doc, &Anchor::NamedBlock("model_config".into())).unwrap();
        assert_eq!(point, InsertionPoint { line: 3, indent: 4 });
    }

    #[test]
    fn test_method_body_after_multiline_statement() {
        let service = "\
class BookService:
    def model_to_dto(self, entity):
        dto_dict = {
            c.name: getattr(entity, c.name) for c in entity.__table__.columns
        }
        return BookOutDto(**dto_dict)
";
        let doc = SourceDocument::parse(service);
        let anchor = Anchor::MethodBody {
            class: "BookService".into(),
            method: "model_to_dto".into(),
            marker: "dto_dict =".into(),
        };
        let point = locate(&doc, &anchor).unwrap();
        assert_eq!(point, InsertionPoint { line: 5, indent: 8 });
    }

    #[test]
    fn test_method_body_only_searches_the_named_class() {
        let service = "\
class Mapper:
    def model_to_dto(self, entity):
        dto_dict = {}
        return dto_dict


class BookService:
    def model_to_dto(self, entity):
        dto_dict = dict(entity)
        return dto_dict
";
        let doc = SourceDocument::parse(service);
        let anchor = |class: &str| Anchor::MethodBody {
            class: class.into(),
            method: "model_to_dto".into(),
            marker: "dto_dict =".into(),
        };
        let point = locate(&doc, &anchor("BookService")).unwrap();
        assert_eq!(point, InsertionPoint { line: 9, indent: 8 });
        assert!(locate(&doc, &anchor("AuthorService")).is_none());
    }

    #[test]
    fn test_before_marker() {
        let repo = "class BookRepository:\n    def get_all(self):\n        pass\n\n    def get_by_id(self, id):\n        pass\n";
        let doc = SourceDocument::parse(repo);
        let point = locate(&doc, &Anchor::BeforeMarker("def get_by_id".into())).unwrap();
        assert_eq!(point, InsertionPoint { line: 4, indent: 4 });
        assert!(locate(&doc, &Anchor::BeforeMarker("def delete".into())).is_none());
    }
}
