use std::collections::BTreeMap;

use tracing::{debug, warn};

use strata_core::{DatasetSchemaId, DatasetTable, DatasetTables};

use crate::error::DatasetError;
use crate::traits::DatasetLoader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    InFlight,
    Loaded(DatasetTable),
}

/// Session cache of dataset tables keyed by dataset schema id.
///
/// A schema id moves from absent to `InFlight` to `Loaded` and is never
/// fetched twice. Loaded tables are kept for the whole session.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: BTreeMap<DatasetSchemaId, FetchState>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, schema_id: &DatasetSchemaId) -> Option<&FetchState> {
        self.entries.get(schema_id)
    }

    pub fn is_loaded(&self, schema_id: &DatasetSchemaId) -> bool {
        matches!(self.entries.get(schema_id), Some(FetchState::Loaded(_)))
    }

    /// Marks `schema_id` in flight. Returns false when it is already in
    /// flight or loaded, in which case the caller must not fetch it.
    pub fn begin_fetch(&mut self, schema_id: &DatasetSchemaId) -> bool {
        if self.entries.contains_key(schema_id) {
            return false;
        }
        self.entries.insert(schema_id.clone(), FetchState::InFlight);
        true
    }

    /// Stores the table fetched for `schema_id`. A table carrying another
    /// schema id is rejected and the in-flight mark is cleared.
    pub fn finish_fetch(&mut self, schema_id: &DatasetSchemaId, table: DatasetTable) -> Result<(), DatasetError> {
        if table.schema_id != *schema_id {
            self.abandon_fetch(schema_id);
            return Err(DatasetError::Fetch {
                schema_id: schema_id.to_string(),
                reason: format!("loader returned table {}", table.schema_id),
            });
        }
        debug!(schema_id = %schema_id, rows = table.rows.len(), "dataset loaded");
        self.entries.insert(schema_id.clone(), FetchState::Loaded(table));
        Ok(())
    }

    /// Forgets a failed fetch so a later call may retry it.
    pub fn abandon_fetch(&mut self, schema_id: &DatasetSchemaId) {
        if matches!(self.entries.get(schema_id), Some(FetchState::InFlight)) {
            self.entries.remove(schema_id);
        }
    }

    /// Fetches every id not yet requested. Returns how many tables were
    /// fetched; the first loader error is returned after clearing its
    /// in-flight mark.
    pub fn load_all<'a, L: DatasetLoader>(
        &mut self,
        loader: &L,
        schema_ids: impl IntoIterator<Item = &'a DatasetSchemaId>,
    ) -> Result<usize, DatasetError> {
        let mut fetched = 0;
        for schema_id in schema_ids {
            if !self.begin_fetch(schema_id) {
                continue;
            }
            match loader.load(schema_id).and_then(|table| self.finish_fetch(schema_id, table)) {
                Ok(()) => fetched += 1,
                Err(e) => {
                    warn!(schema_id = %schema_id, error = %e, "dataset fetch failed");
                    self.abandon_fetch(schema_id);
                    return Err(e);
                }
            }
        }
        Ok(fetched)
    }

    /// Snapshot of every loaded table.
    pub fn tables(&self) -> DatasetTables {
        self.entries
            .values()
            .filter_map(|state| match state {
                FetchState::Loaded(table) => Some(table.clone()),
                FetchState::InFlight => None,
            })
            .collect()
    }

    /// True once none of `schema_ids` is missing or still in flight.
    pub fn settled<'a>(&self, schema_ids: impl IntoIterator<Item = &'a DatasetSchemaId>) -> bool {
        schema_ids.into_iter().all(|id| self.is_loaded(id))
    }
}
