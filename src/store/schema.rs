//! Schema loading and connection tuning

use rusqlite::Connection;
use std::fs;
use std::path::Path;

/// Schema files compiled in, in load order
const EMBEDDED_SCHEMA: [(&str, &str); 4] = [
    ("00_projects.sql", include_str!("../../sql/00_projects.sql")),
    ("01_groups.sql", include_str!("../../sql/01_groups.sql")),
    ("02_rules.sql", include_str!("../../sql/02_rules.sql")),
    ("03_events.sql", include_str!("../../sql/03_events.sql")),
];

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema directory not found: {0}")]
    MissingDirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// WAL journaling with relaxed fsync; readers never block the writer
pub fn apply_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Execute every `.sql` file in `schema_dir`, sorted by file name
///
/// Files must be idempotent (`IF NOT EXISTS`). Stops at the first failure.
pub fn run_schema_migrations(conn: &Connection, schema_dir: &str) -> Result<usize, SchemaError> {
    let schema_path = Path::new(schema_dir);
    if !schema_path.is_dir() {
        return Err(SchemaError::MissingDirectory(schema_dir.to_string()));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort();

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for path in &sql_files {
        let sql = fs::read_to_string(path)?;
        conn.execute_batch(&sql)?;
        log::debug!("   ├─ Applied: {}", path.display());
    }

    log::info!("✅ Applied {} schema files", sql_files.len());
    Ok(sql_files.len())
}

/// Apply the schema shipped with the crate
pub fn apply_embedded_schema(conn: &Connection) -> Result<(), SchemaError> {
    for (name, sql) in EMBEDDED_SCHEMA {
        conn.execute_batch(sql)?;
        log::debug!("   ├─ Applied embedded: {}", name);
    }
    Ok(())
}
