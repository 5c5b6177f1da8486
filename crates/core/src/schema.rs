use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::SchemaId;
use crate::value::{Value, ValueType};

/// Text keyed by language code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    pub fn new(lang: &str, text: &str) -> Self {
        Self(BTreeMap::from([(lang.to_string(), text.to_string())]))
    }

    pub fn with(mut self, lang: &str, text: &str) -> Self {
        self.0.insert(lang.to_string(), text.to_string());
        self
    }

    /// Falls back to English, then to any available translation.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.get("en"))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub key: String,
    #[serde(default)]
    pub label: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    #[serde(rename = "fieldId")]
    pub id: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub ui: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
}

impl SchemaField {
    pub fn new(id: &str, value_type: ValueType) -> Self {
        Self {
            id: id.to_string(),
            value_type,
            ui: None,
            default_value: None,
            min: None,
            max: None,
            choices: Vec::new(),
            title: LocalizedText::default(),
            description: LocalizedText::default(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaGroup {
    #[serde(rename = "schemaGroupId")]
    pub id: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

impl SchemaGroup {
    pub fn field(&self, field_id: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

/// Plugin-declared structure of a property tree. Group and field order is
/// the declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub id: SchemaId,
    #[serde(default)]
    pub groups: Vec<SchemaGroup>,
}

impl PropertySchema {
    pub fn group(&self, group_id: &str) -> Option<&SchemaGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn field(&self, group_id: &str, field_id: &str) -> Option<&SchemaField> {
        self.group(group_id).and_then(|g| g.field(field_id))
    }
}
