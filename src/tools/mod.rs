//! Wrappers around the external Python tooling (alembic, ruff).
pub mod lint;
pub mod migration;
pub mod process;
