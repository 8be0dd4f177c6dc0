//! # fastapi-maker
//!
//! Scaffolds FastAPI + SQLAlchemy projects and wires relationships between
//! generated entities by patching existing Python sources in place.
//!
//! ## Architecture
//!
//! - **[`config`]**: `fam.json` loading, defaults and validation
//! - **[`source`]**: line-oriented source documents, structural index, anchor locator, idempotent mutator
//! - **[`templates`]**: Python text produced for projects, entities and relationships
//! - **[`registry`]**: discovery of entity directories and their layer files
//! - **[`relation`]**: relationship config, mutation plan, executor, report, interactive wizard
//! - **[`generators`]**: `fam init` and `fam create`
//! - **[`tools`]**: alembic and ruff wrappers

pub mod config;
pub mod error;
pub mod generators;
pub mod naming;
pub mod registry;
pub mod relation;
pub mod source;
pub mod templates;
pub mod tools;
