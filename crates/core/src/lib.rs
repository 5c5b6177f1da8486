pub mod dataset;
pub mod error;
pub mod extension;
pub mod ids;
pub mod property;
pub mod schema;
pub mod value;

pub use dataset::{DatasetTable, DatasetTables};
pub use error::CoreError;
pub use extension::{ExtensionCatalog, ExtensionManifest, LayoutConstraint, SchemaRegistry};
pub use ids::*;
pub use property::{MergedProperty, PropertyInstance};
pub use schema::PropertySchema;
pub use value::{Value, ValueType};
