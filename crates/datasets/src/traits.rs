use strata_core::{DatasetSchemaId, DatasetTable};

use crate::error::DatasetError;

/// Fetches whole dataset tables by dataset schema id.
///
/// Transport failures are returned as errors; callers propagate them instead
/// of treating the table as empty.
pub trait DatasetLoader {
    fn load(&self, schema_id: &DatasetSchemaId) -> Result<DatasetTable, DatasetError>;
}

impl<L: DatasetLoader + ?Sized> DatasetLoader for &L {
    fn load(&self, schema_id: &DatasetSchemaId) -> Result<DatasetTable, DatasetError> {
        (**self).load(schema_id)
    }
}
