use strata_core::{DatasetTable, ExtensionCatalog};
use strata_datasets::{DatasetCache, DatasetError, SqliteDatasetStore};
use strata_engine::{EngineConfig, EngineError, RawScene, SceneComposer, SceneView, prefetch_datasets};

use crate::fixtures;

/// One editing session: the fixture catalog, a local dataset store and the
/// session's dataset cache.
pub struct TestWorkspace {
    pub catalog: ExtensionCatalog,
    pub config: EngineConfig,
    pub store: SqliteDatasetStore,
    pub cache: DatasetCache,
}

impl TestWorkspace {
    pub fn new() -> Result<Self, DatasetError> {
        Self::with_store(SqliteDatasetStore::open_in_memory()?)
    }

    pub fn with_store(store: SqliteDatasetStore) -> Result<Self, DatasetError> {
        Ok(Self {
            catalog: fixtures::catalog(),
            config: EngineConfig::default(),
            store,
            cache: DatasetCache::new(),
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_dataset(&mut self, name: &str, table: &DatasetTable) -> Result<(), DatasetError> {
        self.store.insert_table(name, table)
    }

    /// Loads the scene's dataset tables, then composes it.
    pub fn compose(&mut self, raw: &RawScene) -> Result<SceneView, EngineError> {
        prefetch_datasets(raw, &mut self.cache, &self.store)?;
        let tables = self.cache.tables();
        SceneComposer::new(self.config.clone(), &self.catalog, &tables).compose_scene(raw)
    }
}
