use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{DatasetFieldId, DatasetRowId, DatasetSchemaId, ItemId, PropertyId, SchemaId};
use crate::schema::{PropertySchema, SchemaGroup};
use crate::value::Value;

/// Field-level pointer into a dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLink {
    pub dataset_schema_id: DatasetSchemaId,
    pub dataset_field_id: DatasetFieldId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub field_id: String,
    #[serde(rename = "type")]
    pub wire_type: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub links: Vec<DatasetLink>,
}

impl Field {
    pub fn new(field_id: &str, wire_type: &str, value: impl Into<Value>) -> Self {
        Self {
            field_id: field_id.to_string(),
            wire_type: wire_type.to_string(),
            value: Some(value.into()),
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, dataset_schema_id: &str, dataset_field_id: &str) -> Self {
        self.links.push(DatasetLink {
            dataset_schema_id: DatasetSchemaId::new(dataset_schema_id),
            dataset_field_id: DatasetFieldId::new(dataset_field_id),
        });
        self
    }

    /// The link used for dataset indirection.
    pub fn link(&self) -> Option<&DatasetLink> {
        self.links.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGroup {
    pub id: ItemId,
    pub schema_group_id: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl PropertyGroup {
    pub fn new(id: impl Into<ItemId>, schema_group_id: &str) -> Self {
        Self {
            id: id.into(),
            schema_group_id: schema_group_id.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGroupList {
    pub id: ItemId,
    pub schema_group_id: String,
    #[serde(default)]
    pub groups: Vec<PropertyGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Item {
    Group(PropertyGroup),
    GroupList(PropertyGroupList),
}

impl Item {
    pub fn schema_group_id(&self) -> &str {
        match self {
            Item::Group(g) => &g.schema_group_id,
            Item::GroupList(l) => &l.schema_group_id,
        }
    }

    pub fn as_group(&self) -> Option<&PropertyGroup> {
        match self {
            Item::Group(g) => Some(g),
            Item::GroupList(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&PropertyGroupList> {
        match self {
            Item::GroupList(l) => Some(l),
            Item::Group(_) => None,
        }
    }
}

/// Concrete property data authored on one layer, widget, block or page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInstance {
    pub id: PropertyId,
    pub schema_id: SchemaId,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl PropertyInstance {
    pub fn new(id: impl Into<PropertyId>, schema_id: impl Into<SchemaId>) -> Self {
        Self {
            id: id.into(),
            schema_id: schema_id.into(),
            items: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: PropertyGroup) -> Self {
        self.items.push(Item::Group(group));
        self
    }

    pub fn with_list(mut self, list: PropertyGroupList) -> Self {
        self.items.push(Item::GroupList(list));
        self
    }

    pub fn item(&self, schema_group_id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.schema_group_id() == schema_group_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &DatasetLink> {
        self.items.iter().flat_map(|item| {
            let groups: Vec<&PropertyGroup> = match item {
                Item::Group(g) => vec![g],
                Item::GroupList(l) => l.groups.iter().collect(),
            };
            groups.into_iter().flat_map(|g| g.fields.iter().flat_map(|f| f.links.iter()))
        })
    }

    /// Checks that every item and field is declared by `schema`.
    pub fn validate(&self, schema: &PropertySchema) -> Result<(), CoreError> {
        for item in &self.items {
            let schema_group = declared_group(schema, item.schema_group_id())?;
            match item {
                Item::Group(group) => {
                    require_shape(schema, schema_group, false)?;
                    validate_fields(schema, schema_group, group.fields.iter().map(|f| f.field_id.as_str()))?;
                }
                Item::GroupList(list) => {
                    require_shape(schema, schema_group, true)?;
                    for group in &list.groups {
                        validate_fields(schema, schema_group, group.fields.iter().map(|f| f.field_id.as_str()))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn declared_group<'a>(schema: &'a PropertySchema, group_id: &str) -> Result<&'a SchemaGroup, CoreError> {
    schema.group(group_id).ok_or_else(|| CoreError::UnknownSchemaGroup {
        schema_id: schema.id.to_string(),
        group_id: group_id.to_string(),
    })
}

fn require_shape(schema: &PropertySchema, group: &SchemaGroup, is_list: bool) -> Result<(), CoreError> {
    if group.is_list == is_list {
        return Ok(());
    }
    Err(CoreError::GroupShapeMismatch {
        schema_id: schema.id.to_string(),
        group_id: group.id.clone(),
        expected: if group.is_list { "a list" } else { "a single group" },
    })
}

fn validate_fields<'a>(
    schema: &PropertySchema,
    group: &SchemaGroup,
    field_ids: impl Iterator<Item = &'a str>,
) -> Result<(), CoreError> {
    for field_id in field_ids {
        if group.field(field_id).is_none() {
            return Err(CoreError::UnknownSchemaField {
                schema_id: schema.id.to_string(),
                group_id: group.id.clone(),
                field_id: field_id.to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Server-merged properties
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedField {
    pub field_id: String,
    #[serde(rename = "type")]
    pub wire_type: String,
    #[serde(default)]
    pub actual_value: Option<Value>,
    #[serde(default)]
    pub overridden: bool,
    #[serde(default)]
    pub links: Vec<DatasetLink>,
}

/// A merged single group, or a merged list whose items live in `groups`.
/// Which of the two it is comes from the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGroup {
    pub schema_group_id: String,
    #[serde(default)]
    pub original_id: Option<ItemId>,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    #[serde(default)]
    pub groups: Vec<MergedGroup>,
    #[serde(default)]
    pub fields: Vec<MergedField>,
}

impl MergedGroup {
    /// Id of the item this merged group stands for.
    pub fn item_id(&self) -> Option<&ItemId> {
        self.original_id.as_ref().or(self.parent_id.as_ref())
    }

    pub fn field(&self, field_id: &str) -> Option<&MergedField> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }
}

/// Property data the server has already merged from an original and a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedProperty {
    #[serde(default)]
    pub original_id: Option<PropertyId>,
    #[serde(default)]
    pub parent_id: Option<PropertyId>,
    pub schema_id: SchemaId,
    #[serde(default)]
    pub linked_dataset_id: Option<DatasetRowId>,
    #[serde(default)]
    pub groups: Vec<MergedGroup>,
}

impl MergedProperty {
    pub fn group(&self, schema_group_id: &str) -> Option<&MergedGroup> {
        self.groups.iter().find(|g| g.schema_group_id == schema_group_id)
    }

    /// Merges `original` over `parent` the way the server does: lists are
    /// taken whole from one side, single groups field by field. A parent of
    /// another schema is not merged. `linked_dataset_id` is the row linked
    /// fields resolve against.
    pub fn merge(
        schema: &PropertySchema,
        original: Option<&PropertyInstance>,
        parent: Option<&PropertyInstance>,
        linked_dataset_id: Option<&DatasetRowId>,
    ) -> Option<Self> {
        if original.is_none() && parent.is_none() {
            return None;
        }
        let parent = match (original, parent) {
            (Some(o), Some(p)) if o.schema_id != p.schema_id => None,
            _ => parent,
        };
        let mut groups = Vec::new();
        for schema_group in &schema.groups {
            let orig_item = original.and_then(|p| p.item(&schema_group.id));
            let parent_item = parent.and_then(|p| p.item(&schema_group.id));

            if schema_group.is_list {
                let orig_list = orig_item.and_then(Item::as_list);
                let parent_list = parent_item.and_then(Item::as_list);
                let (list, from_original) = match (orig_list, parent_list) {
                    (Some(o), _) if !o.groups.is_empty() => (o, true),
                    (_, Some(p)) => (p, false),
                    (Some(o), None) => (o, true),
                    (None, None) => continue,
                };
                groups.push(MergedGroup {
                    schema_group_id: schema_group.id.clone(),
                    original_id: from_original.then(|| list.id.clone()),
                    parent_id: (!from_original).then(|| list.id.clone()),
                    groups: list
                        .groups
                        .iter()
                        .map(|g| MergedGroup {
                            schema_group_id: schema_group.id.clone(),
                            original_id: from_original.then(|| g.id.clone()),
                            parent_id: (!from_original).then(|| g.id.clone()),
                            groups: Vec::new(),
                            fields: g
                                .fields
                                .iter()
                                .map(|f| merged_field(f, from_original))
                                .collect(),
                        })
                        .collect(),
                    fields: Vec::new(),
                });
                continue;
            }

            let orig_group = orig_item.and_then(Item::as_group);
            let parent_group = parent_item.and_then(Item::as_group);
            if orig_group.is_none() && parent_group.is_none() {
                continue;
            }
            let fields = schema_group
                .fields
                .iter()
                .filter_map(|schema_field| {
                    let of = orig_group.and_then(|g| g.field(&schema_field.id));
                    let pf = parent_group.and_then(|g| g.field(&schema_field.id));
                    of.or(pf).map(|used| merged_field(used, of.is_some() && pf.is_some()))
                })
                .collect();
            groups.push(MergedGroup {
                schema_group_id: schema_group.id.clone(),
                original_id: orig_group.map(|g| g.id.clone()),
                parent_id: parent_group.map(|g| g.id.clone()),
                groups: Vec::new(),
                fields,
            });
        }

        Some(Self {
            original_id: original.map(|p| p.id.clone()),
            parent_id: parent.map(|p| p.id.clone()),
            schema_id: schema.id.clone(),
            linked_dataset_id: linked_dataset_id.cloned(),
            groups,
        })
    }

    pub fn validate(&self, schema: &PropertySchema) -> Result<(), CoreError> {
        for group in &self.groups {
            let schema_group = declared_group(schema, &group.schema_group_id)?;
            validate_fields(schema, schema_group, group.fields.iter().map(|f| f.field_id.as_str()))?;
            for item in &group.groups {
                validate_fields(schema, schema_group, item.fields.iter().map(|f| f.field_id.as_str()))?;
            }
        }
        Ok(())
    }
}

fn merged_field(field: &Field, overridden: bool) -> MergedField {
    MergedField {
        field_id: field.field_id.clone(),
        wire_type: field.wire_type.clone(),
        actual_value: field.value.clone(),
        overridden,
        links: field.links.clone(),
    }
}
