pub mod cache;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use cache::{DatasetCache, FetchState};
pub use error::DatasetError;
pub use sqlite::SqliteDatasetStore;
pub use traits::*;
