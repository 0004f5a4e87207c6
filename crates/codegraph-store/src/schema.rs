// ABOUTME: Single schema file (spec §6): the authoritative table list, applied as
// ABOUTME: forward-only numbered migrations tracked in `schema_migrations`.
use codegraph_core::{CodeGraphError, Result};
use rusqlite::Connection;
use tracing::info;

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
}

/// Forward-only, numbered, idempotent-by-construction (each statement uses `IF NOT
/// EXISTS`). One migration runs at a time, serialized by the exclusive transaction
/// `run_migrations` opens around the whole batch.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        name: "initial_schema",
        up_sql: include_str!("../migrations/001_initial_schema.sql"),
    }]
}

/// Applies every migration with `version > current_version`, inside a single exclusive
/// transaction so two processes opening the same store file can't race the migration.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| CodeGraphError::Migration(e.to_string()))?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )
    .map_err(|e| CodeGraphError::Migration(e.to_string()))?;

    let current_version: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CodeGraphError::Migration(e.to_string()))?;

    let mut applied = 0;
    for migration in migrations() {
        if migration.version <= current_version {
            continue;
        }
        tx.execute_batch(migration.up_sql)
            .map_err(|e| CodeGraphError::Migration(format!("{}: {e}", migration.name)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.name,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| CodeGraphError::Migration(e.to_string()))?;
        applied += 1;
    }

    tx.commit().map_err(|e| CodeGraphError::Migration(e.to_string()))?;
    if applied > 0 {
        info!(applied, "applied schema migrations");
    }
    Ok(())
}
