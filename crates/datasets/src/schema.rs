use rusqlite::Connection;

use crate::error::DatasetError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), DatasetError> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS dataset_schemas (
    schema_id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dataset_fields (
    field_id TEXT NOT NULL,
    schema_id TEXT NOT NULL REFERENCES dataset_schemas(schema_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    PRIMARY KEY (schema_id, field_id),
    UNIQUE (schema_id, name)
);

CREATE TABLE IF NOT EXISTS dataset_rows (
    rowid INTEGER PRIMARY KEY,
    row_id TEXT NOT NULL,
    schema_id TEXT NOT NULL REFERENCES dataset_schemas(schema_id) ON DELETE CASCADE,
    payload BLOB NOT NULL,
    UNIQUE (schema_id, row_id)
);
CREATE INDEX IF NOT EXISTS idx_dataset_rows_schema ON dataset_rows (schema_id, rowid);
";
