use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::debug;

use strata_core::dataset::{DatasetRow, ROW_ID_COLUMN};
use strata_core::{DatasetFieldId, DatasetSchemaId, DatasetTable, Value};

use crate::error::DatasetError;
use crate::traits::DatasetLoader;

fn encode_row(row: &DatasetRow) -> Result<Vec<u8>, DatasetError> {
    let payload: BTreeMap<&String, &Value> = row.iter().filter(|(k, _)| k.as_str() != ROW_ID_COLUMN).collect();
    rmp_serde::to_vec(&payload).map_err(|e| DatasetError::Serialization(e.to_string()))
}

fn decode_row(row_id: String, bytes: &[u8]) -> Result<DatasetRow, DatasetError> {
    let mut row: DatasetRow =
        rmp_serde::from_slice(bytes).map_err(|e| DatasetError::Serialization(e.to_string()))?;
    row.insert(ROW_ID_COLUMN.to_string(), Value::Text(row_id));
    Ok(row)
}

/// Local dataset source backed by SQLite. Row payloads are MessagePack maps
/// of column name → value; the row id column is stored separately.
pub struct SqliteDatasetStore {
    conn: Connection,
}

impl SqliteDatasetStore {
    pub fn open(path: &str) -> Result<Self, DatasetError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, DatasetError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Writes a whole table, replacing any previous rows for its schema id.
    pub fn insert_table(&mut self, name: &str, table: &DatasetTable) -> Result<(), DatasetError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM dataset_schemas WHERE schema_id = ?1",
            rusqlite::params![table.schema_id.as_str()],
        )?;
        tx.execute(
            "INSERT INTO dataset_schemas (schema_id, name) VALUES (?1, ?2)",
            rusqlite::params![table.schema_id.as_str(), name],
        )?;
        for (column, field_id) in &table.schema {
            tx.execute(
                "INSERT INTO dataset_fields (field_id, schema_id, name) VALUES (?1, ?2, ?3)",
                rusqlite::params![field_id.as_str(), table.schema_id.as_str(), column],
            )?;
        }
        for row in &table.rows {
            let row_id = row
                .get(ROW_ID_COLUMN)
                .and_then(Value::as_text)
                .ok_or_else(|| {
                    DatasetError::Core(strata_core::CoreError::InvalidData(format!(
                        "row without id in dataset {}",
                        table.schema_id
                    )))
                })?;
            tx.execute(
                "INSERT INTO dataset_rows (row_id, schema_id, payload) VALUES (?1, ?2, ?3)",
                rusqlite::params![row_id, table.schema_id.as_str(), encode_row(row)?],
            )?;
        }
        tx.commit()?;
        debug!(schema_id = %table.schema_id, rows = table.rows.len(), "dataset table stored");
        Ok(())
    }

    pub fn has_schema(&self, schema_id: &DatasetSchemaId) -> Result<bool, DatasetError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dataset_schemas WHERE schema_id = ?1",
            rusqlite::params![schema_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn row_count(&self, schema_id: &DatasetSchemaId) -> Result<u64, DatasetError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM dataset_rows WHERE schema_id = ?1",
            rusqlite::params![schema_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl DatasetLoader for SqliteDatasetStore {
    fn load(&self, schema_id: &DatasetSchemaId) -> Result<DatasetTable, DatasetError> {
        if !self.has_schema(schema_id)? {
            return Err(DatasetError::NotFound(schema_id.to_string()));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, field_id FROM dataset_fields WHERE schema_id = ?1")?;
        let fields = stmt.query_map(rusqlite::params![schema_id.as_str()], |row| {
            let name: String = row.get(0)?;
            let field_id: String = row.get(1)?;
            Ok((name, field_id))
        })?;
        let mut schema = BTreeMap::new();
        for field in fields {
            let (name, field_id) = field?;
            schema.insert(name, DatasetFieldId::new(field_id));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT row_id, payload FROM dataset_rows WHERE schema_id = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(rusqlite::params![schema_id.as_str()], |row| {
            let row_id: String = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            Ok((row_id, payload))
        })?;
        let mut decoded = Vec::new();
        for row in rows {
            let (row_id, payload) = row?;
            decoded.push(decode_row(row_id, &payload)?);
        }

        Ok(DatasetTable {
            schema_id: schema_id.clone(),
            schema,
            rows: decoded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stations() -> DatasetTable {
        DatasetTable::new("DS1")
            .with_column("loc", "f_loc")
            .with_column("name", "f_name")
            .with_row("R1", vec![("loc", Value::from(json!({"lat": 1, "lng": 2.5}))), ("name", "Tokyo".into())])
            .with_row("R2", vec![("name", "Osaka".into())])
    }

    #[test]
    fn store_and_load_table() -> Result<(), Box<dyn std::error::Error>> {
        let mut store = SqliteDatasetStore::open_in_memory()?;
        let table = stations();
        store.insert_table("Stations", &table)?;

        let loaded = store.load(&"DS1".into())?;
        assert_eq!(loaded, table);
        assert_eq!(store.row_count(&"DS1".into())?, 2);
        Ok(())
    }

    #[test]
    fn reinsert_replaces_rows() -> Result<(), Box<dyn std::error::Error>> {
        let mut store = SqliteDatasetStore::open_in_memory()?;
        store.insert_table("Stations", &stations())?;
        let smaller = DatasetTable::new("DS1")
            .with_column("name", "f_name")
            .with_row("R3", vec![("name", "Kyoto".into())]);
        store.insert_table("Stations", &smaller)?;

        let loaded = store.load(&"DS1".into())?;
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.lookup(&"R3".into(), &"f_name".into()), Some(&Value::Text("Kyoto".into())));
        Ok(())
    }

    #[test]
    fn unknown_schema_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = SqliteDatasetStore::open_in_memory()?;
        match store.load(&"missing".into()) {
            Err(DatasetError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn file_backed_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("datasets.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        {
            let mut store = SqliteDatasetStore::open(path)?;
            store.insert_table("Stations", &stations())?;
        }
        let store = SqliteDatasetStore::open(path)?;
        assert_eq!(store.load(&"DS1".into())?, stations());
        Ok(())
    }
}
