use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{DatasetFieldId, DatasetRowId, DatasetSchemaId};
use crate::value::Value;

/// Column that holds a row's dataset row id.
pub const ROW_ID_COLUMN: &str = "";

pub type DatasetRow = BTreeMap<String, Value>;

/// A loaded dataset: column name → field id, plus rows keyed by column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetTable {
    pub schema_id: DatasetSchemaId,
    #[serde(default)]
    pub schema: BTreeMap<String, DatasetFieldId>,
    #[serde(default)]
    pub rows: Vec<DatasetRow>,
}

impl DatasetTable {
    pub fn new(schema_id: impl Into<DatasetSchemaId>) -> Self {
        Self {
            schema_id: schema_id.into(),
            schema: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: &str, field_id: &str) -> Self {
        self.schema.insert(name.to_string(), DatasetFieldId::new(field_id));
        self
    }

    pub fn with_row(mut self, row_id: &str, values: Vec<(&str, Value)>) -> Self {
        let mut row: DatasetRow = values.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        row.insert(ROW_ID_COLUMN.to_string(), Value::Text(row_id.to_string()));
        self.rows.push(row);
        self
    }

    /// Column name declared for `field_id`.
    pub fn column(&self, field_id: &DatasetFieldId) -> Option<&str> {
        self.schema
            .iter()
            .find(|(_, id)| *id == field_id)
            .map(|(name, _)| name.as_str())
    }

    pub fn row(&self, row_id: &DatasetRowId) -> Option<&DatasetRow> {
        self.rows
            .iter()
            .find(|row| row.get(ROW_ID_COLUMN).and_then(Value::as_text) == Some(row_id.as_str()))
    }

    pub fn lookup(&self, row_id: &DatasetRowId, field_id: &DatasetFieldId) -> Option<&Value> {
        let column = self.column(field_id)?;
        self.row(row_id)?.get(column)
    }
}

/// Looks a value up in a table that may not be loaded yet.
pub fn lookup<'a>(
    table: Option<&'a DatasetTable>,
    row_id: &DatasetRowId,
    field_id: &DatasetFieldId,
) -> Option<&'a Value> {
    table?.lookup(row_id, field_id)
}

/// Loaded tables keyed by dataset schema id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetTables {
    tables: BTreeMap<DatasetSchemaId, DatasetTable>,
}

impl DatasetTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: DatasetTable) {
        self.tables.insert(table.schema_id.clone(), table);
    }

    pub fn get(&self, schema_id: &DatasetSchemaId) -> Option<&DatasetTable> {
        self.tables.get(schema_id)
    }

    pub fn contains(&self, schema_id: &DatasetSchemaId) -> bool {
        self.tables.contains_key(schema_id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn lookup(
        &self,
        schema_id: &DatasetSchemaId,
        row_id: &DatasetRowId,
        field_id: &DatasetFieldId,
    ) -> Option<&Value> {
        lookup(self.get(schema_id), row_id, field_id)
    }
}

impl FromIterator<DatasetTable> for DatasetTables {
    fn from_iter<I: IntoIterator<Item = DatasetTable>>(iter: I) -> Self {
        let mut tables = Self::new();
        for table in iter {
            tables.insert(table);
        }
        tables
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
            .with_row("R1", vec![("loc", Value::from(json!({"lat": 1, "lng": 2}))), ("name", "Tokyo".into())])
            .with_row("R2", vec![("name", "Osaka".into())])
    }

    #[test]
    fn lookup_by_field_id_not_column_name() {
        let table = stations();
        let loc = table.lookup(&"R1".into(), &"f_loc".into()).unwrap();
        assert_eq!(loc.get("lat"), Some(&Value::Number(1.0)));
        // Column names are not field ids.
        assert!(table.lookup(&"R1".into(), &"loc".into()).is_none());
    }

    #[test]
    fn lookup_misses_are_none() {
        let table = stations();
        assert!(table.lookup(&"R9".into(), &"f_name".into()).is_none());
        assert!(table.lookup(&"R2".into(), &"f_loc".into()).is_none());
        assert!(lookup(None, &"R1".into(), &"f_loc".into()).is_none());
    }

    #[test]
    fn tables_by_schema_id() {
        let tables: DatasetTables = vec![stations()].into_iter().collect();
        assert!(tables.contains(&"DS1".into()));
        assert_eq!(
            tables.lookup(&"DS1".into(), &"R2".into(), &"f_name".into()),
            Some(&Value::Text("Osaka".into()))
        );
        assert!(tables.lookup(&"DS2".into(), &"R2".into(), &"f_name".into()).is_none());
    }
}
