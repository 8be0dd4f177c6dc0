/// Error taxonomy for fastapi-maker.
///
/// Only conditions that abort a command live here. Outcomes the relationship
/// engine treats as normal (fragment already present, anchor missing, optional
/// layer absent, user cancellation) are plain values in `source::mutator` and
/// `relation::report`.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FamError>;

#[derive(Error, Debug)]
pub enum FamError {
    #[error("project not initialized: {} does not exist (run `fam init` first)", .0.display())]
    ProjectNotInitialized(PathBuf),

    #[error("at least two entities are required to create a relationship, found {found}")]
    NotEnoughEntities { found: usize },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("an entity cannot be related to itself: {0}")]
    SelfRelation(String),

    #[error("invalid entity name {0:?}: expected a lowercase snake_case identifier")]
    InvalidEntityName(String),

    #[error("required file missing: {}", .0.display())]
    MissingRequiredFile(PathBuf),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with {status}")]
    Subprocess {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("`{0}` not found on PATH")]
    ToolNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl FamError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = FamError::ProjectNotInitialized(PathBuf::from("app/api"));
        assert!(err.to_string().contains("app/api"));

        let err = FamError::io(
            "app/api/book/book_model.py",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("book_model.py"));
    }
}
