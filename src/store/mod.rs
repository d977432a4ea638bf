//! SQLite persistence for projects, groups, rules and event counters

pub mod schema;
pub mod sqlite;

pub use schema::{apply_embedded_schema, apply_pragmas, run_schema_migrations, SchemaError};
pub use sqlite::SqliteStore;
