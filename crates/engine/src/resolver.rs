//! Property resolution: merges a plugin schema with property instance data
//! into a plain tree of typed values.
//!
//! Two input shapes are supported through [`PropertySource`]:
//!
//! - `Client`: a raw original instance over a raw parent instance. List
//!   groups are taken whole from one side; single groups merge field by
//!   field. A field linked to a dataset resolves from the dataset table when
//!   a row id is supplied.
//! - `Merged`: a payload the server already merged. Each field's
//!   `actualValue` is trusted as is, except that linked fields still read
//!   the dataset row.
//!
//! A parent declared by a different schema than the original is ignored.
//!
//! Both produce the same [`ResolvedProperty`] shape. The schema drives the
//! walk, so the output never contains groups or fields the schema does not
//! declare.

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use strata_core::extension::SchemaRegistry;
use strata_core::property::{DatasetLink, Item, MergedGroup, PropertyGroup};
use strata_core::schema::{SchemaField, SchemaGroup};
use strata_core::value::{coerce, coerce_as};
use strata_core::{
    CoreError, DatasetRowId, DatasetTables, ItemId, MergedProperty, PropertyInstance, PropertySchema, Value,
    ValueType,
};

use crate::config::{Detail, EngineConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChoice {
    pub key: String,
    pub label: Option<String>,
}

/// Schema metadata attached to a field in enriched mode.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub ui: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub choices: Vec<ResolvedChoice>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Type declared by the schema.
    pub value_type: ValueType,
    pub value: Value,
    pub meta: Option<FieldMeta>,
}

pub type ResolvedFields = BTreeMap<String, ResolvedField>;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub id: ItemId,
    pub fields: ResolvedFields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedGroup {
    Single(ResolvedFields),
    List(Vec<ResolvedItem>),
}

impl ResolvedGroup {
    pub fn as_single(&self) -> Option<&ResolvedFields> {
        match self {
            ResolvedGroup::Single(fields) => Some(fields),
            ResolvedGroup::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ResolvedItem]> {
        match self {
            ResolvedGroup::List(items) => Some(items),
            ResolvedGroup::Single(_) => None,
        }
    }
}

/// Resolved property tree keyed by schema group id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedProperty {
    pub groups: BTreeMap<String, ResolvedGroup>,
}

impl ResolvedProperty {
    pub fn group(&self, group_id: &str) -> Option<&ResolvedGroup> {
        self.groups.get(group_id)
    }

    /// Value of a field in a single group.
    pub fn value(&self, group_id: &str, field_id: &str) -> Option<&Value> {
        self.group(group_id)?
            .as_single()?
            .get(field_id)
            .map(|f| &f.value)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl Serialize for ResolvedField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(meta) = &self.meta else {
            return self.value.serialize(serializer);
        };
        let mut s = serializer.serialize_struct("ResolvedField", 8)?;
        s.serialize_field("type", &self.value_type)?;
        s.serialize_field("value", &self.value)?;
        s.serialize_field("ui", &meta.ui)?;
        s.serialize_field("title", &meta.title)?;
        s.serialize_field("description", &meta.description)?;
        s.serialize_field("choices", &meta.choices)?;
        s.serialize_field("min", &meta.min)?;
        s.serialize_field("max", &meta.max)?;
        s.end()
    }
}

impl Serialize for ResolvedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (field_id, field) in &self.fields {
            map.serialize_entry(field_id, field)?;
        }
        map.end()
    }
}

impl Serialize for ResolvedGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResolvedGroup::Single(fields) => serializer.collect_map(fields),
            ResolvedGroup::List(items) => serializer.collect_seq(items),
        }
    }
}

impl Serialize for ResolvedProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(&self.groups)
    }
}

/// Input to the resolver.
#[derive(Debug, Clone, Copy)]
pub enum PropertySource<'s> {
    Client {
        original: Option<&'s PropertyInstance>,
        parent: Option<&'s PropertyInstance>,
        /// Dataset row of the enclosing layer, for linked fields.
        row: Option<&'s DatasetRowId>,
    },
    Merged {
        merged: &'s MergedProperty,
        /// Row used when the payload carries no `linked_dataset_id`.
        row: Option<&'s DatasetRowId>,
    },
}

/// Where one field's value comes from before coercion.
enum Located<'s> {
    Missing,
    Literal { value: Option<&'s Value>, wire_type: &'s str },
    Linked { link: &'s DatasetLink, row: &'s DatasetRowId },
}

/// Field containers for one single group or one list item.
#[derive(Clone, Copy)]
enum Fields<'s> {
    Client {
        original: Option<&'s PropertyGroup>,
        parent: Option<&'s PropertyGroup>,
        row: Option<&'s DatasetRowId>,
    },
    Merged {
        group: Option<&'s MergedGroup>,
        row: Option<&'s DatasetRowId>,
    },
}

impl<'s> Fields<'s> {
    fn locate(&self, field_id: &str) -> Located<'s> {
        match *self {
            Fields::Client { original, parent, row } => {
                let used = original
                    .and_then(|g| g.field(field_id))
                    .or_else(|| parent.and_then(|g| g.field(field_id)));
                match (used, used.and_then(|f| f.link()), row) {
                    (None, _, _) => Located::Missing,
                    (Some(_), Some(link), Some(row)) => Located::Linked { link, row },
                    (Some(field), _, _) => Located::Literal {
                        value: field.value.as_ref(),
                        wire_type: &field.wire_type,
                    },
                }
            }
            Fields::Merged { group, row } => match (group.and_then(|g| g.field(field_id)), row) {
                (None, _) => Located::Missing,
                (Some(field), Some(row)) if !field.links.is_empty() => Located::Linked {
                    link: &field.links[0],
                    row,
                },
                (Some(field), _) => Located::Literal {
                    value: field.actual_value.as_ref(),
                    wire_type: &field.wire_type,
                },
            },
        }
    }
}

impl<'s> PropertySource<'s> {
    /// A parent declared by another schema cannot be merged; the original
    /// resolves alone.
    fn without_foreign_parent(self) -> Self {
        match self {
            PropertySource::Client {
                original: Some(original),
                parent: Some(parent),
                row,
            } if original.schema_id != parent.schema_id => {
                debug!(
                    schema_id = %original.schema_id,
                    parent_schema_id = %parent.schema_id,
                    "ignoring parent property of another schema"
                );
                PropertySource::Client {
                    original: Some(original),
                    parent: None,
                    row,
                }
            }
            source => source,
        }
    }

    fn schema<'r>(&self, registry: &'r dyn SchemaRegistry) -> Option<&'r PropertySchema> {
        match self {
            PropertySource::Client { original, parent, .. } => original
                .and_then(|p| registry.schema(&p.schema_id))
                .or_else(|| parent.and_then(|p| registry.schema(&p.schema_id))),
            PropertySource::Merged { merged, .. } => registry.schema(&merged.schema_id),
        }
    }

    fn validate(&self, schema: &PropertySchema) -> Result<(), CoreError> {
        match self {
            PropertySource::Client { original, parent, .. } => {
                for instance in original.iter().chain(parent.iter()) {
                    instance.validate(schema)?;
                }
                Ok(())
            }
            PropertySource::Merged { merged, .. } => merged.validate(schema),
        }
    }

    /// Items of a list group; `None` when neither side configures the list.
    fn list(&self, group: &SchemaGroup) -> Option<Vec<(ItemId, Fields<'s>)>> {
        match *self {
            PropertySource::Client { original, parent, row } => {
                let original = original.and_then(|p| p.item(&group.id)).and_then(Item::as_list);
                let parent = parent.and_then(|p| p.item(&group.id)).and_then(Item::as_list);
                // A list is one unit: original's items if it has any, else parent's.
                let list = match (original, parent) {
                    (Some(o), _) if !o.groups.is_empty() => o,
                    (_, Some(p)) => p,
                    (Some(o), None) => o,
                    (None, None) => return None,
                };
                Some(
                    list.groups
                        .iter()
                        .map(|g| {
                            let fields = Fields::Client {
                                original: Some(g),
                                parent: None,
                                row,
                            };
                            (g.id.clone(), fields)
                        })
                        .collect(),
                )
            }
            PropertySource::Merged { merged, row } => {
                let row = merged.linked_dataset_id.as_ref().or(row);
                let group = merged.group(&group.id)?;
                Some(
                    group
                        .groups
                        .iter()
                        .map(|item| {
                            let id = item.item_id().cloned().unwrap_or_else(|| {
                                debug!(schema_group_id = %item.schema_group_id, "merged list item has no id");
                                ItemId::new("")
                            });
                            let fields = Fields::Merged {
                                group: Some(item),
                                row,
                            };
                            (id, fields)
                        })
                        .collect(),
                )
            }
        }
    }

    fn single(&self, group: &SchemaGroup) -> Fields<'s> {
        match *self {
            PropertySource::Client { original, parent, row } => Fields::Client {
                original: original.and_then(|p| p.item(&group.id)).and_then(Item::as_group),
                parent: parent.and_then(|p| p.item(&group.id)).and_then(Item::as_group),
                row,
            },
            PropertySource::Merged { merged, row } => Fields::Merged {
                group: merged.group(&group.id),
                row: merged.linked_dataset_id.as_ref().or(row),
            },
        }
    }
}

/// Resolves property sources against schemas from a registry.
#[derive(Clone, Copy)]
pub struct PropertyResolver<'a> {
    registry: &'a dyn SchemaRegistry,
    datasets: &'a DatasetTables,
    detail: Detail,
    language: &'a str,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, datasets: &'a DatasetTables, config: &'a EngineConfig) -> Self {
        Self {
            registry,
            datasets,
            detail: config.detail,
            language: &config.language,
        }
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.detail = detail;
        self
    }

    pub fn detail(&self) -> Detail {
        self.detail
    }

    pub fn registry(&self) -> &'a dyn SchemaRegistry {
        self.registry
    }

    /// Resolves `original` over `parent`. `row` is the dataset row of the
    /// enclosing layer.
    pub fn resolve(
        &self,
        original: Option<&PropertyInstance>,
        parent: Option<&PropertyInstance>,
        row: Option<&DatasetRowId>,
    ) -> Result<Option<ResolvedProperty>, CoreError> {
        self.resolve_source(PropertySource::Client { original, parent, row })
    }

    /// Resolves a server-merged payload. Linked fields read the payload's
    /// `linked_dataset_id`, falling back to `row`.
    pub fn resolve_merged(
        &self,
        merged: Option<&MergedProperty>,
        row: Option<&DatasetRowId>,
    ) -> Result<Option<ResolvedProperty>, CoreError> {
        match merged {
            Some(merged) => self.resolve_source(PropertySource::Merged { merged, row }),
            None => Ok(None),
        }
    }

    /// Returns `Ok(None)` when the source supplies no registered schema.
    /// Items or fields the schema does not declare are a hard error.
    pub fn resolve_source(&self, source: PropertySource<'_>) -> Result<Option<ResolvedProperty>, CoreError> {
        let source = source.without_foreign_parent();
        let Some(schema) = source.schema(self.registry) else {
            return Ok(None);
        };
        if let Err(e) = source.validate(schema) {
            warn!(schema_id = %schema.id, error = %e, "property does not match its schema");
            return Err(e);
        }

        let mut groups = BTreeMap::new();
        for group in &schema.groups {
            if group.is_list {
                if let Some(items) = source.list(group) {
                    let items = items
                        .into_iter()
                        .map(|(id, fields)| ResolvedItem {
                            id,
                            fields: self.resolve_fields(group, &fields),
                        })
                        .collect();
                    groups.insert(group.id.clone(), ResolvedGroup::List(items));
                }
            } else {
                let fields = source.single(group);
                groups.insert(group.id.clone(), ResolvedGroup::Single(self.resolve_fields(group, &fields)));
            }
        }
        Ok(Some(ResolvedProperty { groups }))
    }

    fn resolve_fields(&self, group: &SchemaGroup, fields: &Fields<'_>) -> ResolvedFields {
        group
            .fields
            .iter()
            .filter_map(|schema_field| {
                let value = self.resolve_value(schema_field, fields.locate(&schema_field.id))?;
                Some((
                    schema_field.id.clone(),
                    ResolvedField {
                        value_type: schema_field.value_type,
                        value,
                        meta: match self.detail {
                            Detail::Plain => None,
                            Detail::Enriched => Some(self.meta(schema_field)),
                        },
                    },
                ))
            })
            .collect()
    }

    fn resolve_value(&self, schema_field: &SchemaField, located: Located<'_>) -> Option<Value> {
        match located {
            Located::Missing => coerce_as(schema_field.default_value.as_ref(), schema_field.value_type).map(|c| c.value),
            Located::Literal { value, wire_type } => coerce(value, wire_type).map(|c| c.value),
            Located::Linked { link, row } => {
                let value = self
                    .datasets
                    .lookup(&link.dataset_schema_id, row, &link.dataset_field_id)
                    .cloned();
                if value.is_none() {
                    debug!(
                        field_id = %schema_field.id,
                        dataset_schema_id = %link.dataset_schema_id,
                        row_id = %row,
                        "linked field has no dataset value yet"
                    );
                }
                value
            }
        }
    }

    fn meta(&self, field: &SchemaField) -> FieldMeta {
        FieldMeta {
            ui: field.ui.clone(),
            title: field.title.get(self.language).map(str::to_string),
            description: field.description.get(self.language).map(str::to_string),
            choices: field
                .choices
                .iter()
                .map(|c| ResolvedChoice {
                    key: c.key.clone(),
                    label: c.label.get(self.language).map(str::to_string),
                })
                .collect(),
            min: field.min,
            max: field.max,
        }
    }
}
