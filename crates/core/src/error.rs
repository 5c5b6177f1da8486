use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema drift: group {group_id} is not declared by schema {schema_id}")]
    UnknownSchemaGroup { schema_id: String, group_id: String },

    #[error("schema drift: field {field_id} is not declared by group {group_id} of schema {schema_id}")]
    UnknownSchemaField {
        schema_id: String,
        group_id: String,
        field_id: String,
    },

    #[error("schema drift: group {group_id} of schema {schema_id} is {expected}")]
    GroupShapeMismatch {
        schema_id: String,
        group_id: String,
        expected: &'static str,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
