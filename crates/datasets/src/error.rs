use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("dataset schema not found: {0}")]
    NotFound(String),

    #[error("dataset fetch failed for {schema_id}: {reason}")]
    Fetch { schema_id: String, reason: String },

    #[error("core error: {0}")]
    Core(#[from] strata_core::CoreError),
}
