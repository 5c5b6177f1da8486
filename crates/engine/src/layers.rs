//! Layer tree composition and flattening.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use strata_core::{
    BlockId, CoreError, DatasetRowId, DatasetSchemaId, LayerId, MergedProperty, PropertyInstance,
};

use crate::config::{EngineConfig, MergeMode};
use crate::resolver::{PropertyResolver, ResolvedProperty};

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInfoboxBlock {
    pub id: BlockId,
    pub plugin_id: String,
    pub extension_id: String,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInfobox {
    #[serde(default)]
    pub property: Option<PropertyInstance>,
    #[serde(default)]
    pub merged: Option<MergedProperty>,
    #[serde(default)]
    pub blocks: Vec<RawInfoboxBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawLayerKind {
    Group {
        /// `None` entries are holes left by records that failed to load.
        #[serde(default)]
        children: Vec<Option<RawLayer>>,
        #[serde(default, rename = "linkedDatasetSchemaId")]
        linked_dataset_schema_id: Option<DatasetSchemaId>,
    },
    Item,
}

/// A layer record as the API delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLayer {
    pub id: LayerId,
    #[serde(default)]
    pub plugin_id: Option<String>,
    #[serde(default)]
    pub extension_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
    /// Server-merged property payload, for item layers.
    #[serde(default)]
    pub merged: Option<MergedProperty>,
    #[serde(default)]
    pub infobox: Option<RawInfobox>,
    /// Dataset row this layer is bound to.
    #[serde(default)]
    pub linked_dataset_id: Option<DatasetRowId>,
    #[serde(flatten)]
    pub kind: RawLayerKind,
}

impl RawLayer {
    pub fn children(&self) -> Option<&[Option<RawLayer>]> {
        match &self.kind {
            RawLayerKind::Group { children, .. } => Some(children),
            RawLayerKind::Item => None,
        }
    }

    /// Every dataset schema id the tree links to. These tables must be
    /// loaded before linked fields can resolve.
    pub fn dataset_schema_ids(&self) -> BTreeSet<DatasetSchemaId> {
        let mut ids = BTreeSet::new();
        self.collect_dataset_schema_ids(&mut ids);
        ids
    }

    fn collect_dataset_schema_ids(&self, ids: &mut BTreeSet<DatasetSchemaId>) {
        add_links(self.property.as_ref(), ids);
        if let Some(infobox) = &self.infobox {
            add_links(infobox.property.as_ref(), ids);
            for block in &infobox.blocks {
                add_links(block.property.as_ref(), ids);
            }
        }
        if let Some(merged) = &self.merged {
            for group in &merged.groups {
                for field in group.fields.iter().chain(group.groups.iter().flat_map(|g| g.fields.iter())) {
                    ids.extend(field.links.iter().map(|l| l.dataset_schema_id.clone()));
                }
            }
        }
        if let RawLayerKind::Group {
            children,
            linked_dataset_schema_id,
        } = &self.kind
        {
            ids.extend(linked_dataset_schema_id.iter().cloned());
            for child in children.iter().flatten() {
                child.collect_dataset_schema_ids(ids);
            }
        }
    }
}

fn add_links(property: Option<&PropertyInstance>, ids: &mut BTreeSet<DatasetSchemaId>) {
    for link in property.into_iter().flat_map(|p| p.links()) {
        ids.insert(link.dataset_schema_id.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoboxBlock {
    pub id: BlockId,
    pub plugin_id: String,
    pub extension_id: String,
    pub property: Option<ResolvedProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Infobox {
    pub property: Option<ResolvedProperty>,
    pub blocks: Vec<InfoboxBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub plugin_id: Option<String>,
    pub extension_id: Option<String>,
    pub title: String,
    pub own_visible: bool,
    /// `own_visible` and every ancestor's `own_visible`.
    pub effective_visible: bool,
    pub property: Option<ResolvedProperty>,
    pub infobox: Option<Infobox>,
    pub linked_dataset_id: Option<DatasetRowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Layer>>,
}

impl Layer {
    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }

    pub fn find(&self, id: &LayerId) -> Option<&Layer> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().flatten().find_map(|child| child.find(id))
    }

    /// Flattens this layer's children in draw order.
    pub fn flatten(&self) -> Vec<FlattenedLayer> {
        flatten(self.children.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedLayer {
    pub id: LayerId,
    pub plugin_id: Option<String>,
    pub extension_id: Option<String>,
    pub title: String,
    pub own_visible: bool,
    pub effective_visible: bool,
    pub property: Option<ResolvedProperty>,
    pub infobox: Option<Infobox>,
    pub linked_dataset_id: Option<DatasetRowId>,
    /// Header row of a group, followed by the group's descendants.
    pub boundary: bool,
}

impl FlattenedLayer {
    fn from_layer(layer: &Layer, boundary: bool) -> Self {
        Self {
            id: layer.id.clone(),
            plugin_id: layer.plugin_id.clone(),
            extension_id: layer.extension_id.clone(),
            title: layer.title.clone(),
            own_visible: layer.own_visible,
            effective_visible: layer.effective_visible,
            property: layer.property.clone(),
            infobox: layer.infobox.clone(),
            linked_dataset_id: layer.linked_dataset_id.clone(),
            boundary,
        }
    }
}

/// Flattens `layers` depth first. Invisible layers are pruned with their
/// subtree, visible groups emit a boundary row before their children, and
/// leaves bound to no extension are dropped.
pub fn flatten(layers: &[Layer]) -> Vec<FlattenedLayer> {
    let mut out = Vec::new();
    flatten_into(layers, &mut out);
    out
}

fn flatten_into(layers: &[Layer], out: &mut Vec<FlattenedLayer>) {
    for layer in layers {
        if !layer.effective_visible {
            continue;
        }
        match &layer.children {
            Some(children) if !children.is_empty() => {
                out.push(FlattenedLayer::from_layer(layer, true));
                flatten_into(children, out);
            }
            _ => {
                if layer.plugin_id.is_none() && layer.extension_id.is_none() {
                    debug!(layer_id = %layer.id, "dropping layer bound to no extension");
                    continue;
                }
                out.push(FlattenedLayer::from_layer(layer, false));
            }
        }
    }
}

/// What a layer takes from its enclosing group.
#[derive(Clone, Copy)]
struct Inherited<'p> {
    visible: bool,
    property: Option<&'p PropertyInstance>,
    infobox: Option<&'p Infobox>,
}

pub struct LayerCompositor<'a> {
    resolver: &'a PropertyResolver<'a>,
    merge_mode: MergeMode,
}

impl<'a> LayerCompositor<'a> {
    pub fn new(resolver: &'a PropertyResolver<'a>, config: &EngineConfig) -> Self {
        Self {
            resolver,
            merge_mode: config.merge_mode,
        }
    }

    /// Composes a raw layer tree. Returns `Ok(None)` for a missing layer.
    pub fn compose(&self, raw: Option<&RawLayer>, ancestor_visible: bool) -> Result<Option<Layer>, CoreError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let root = Inherited {
            visible: ancestor_visible,
            property: None,
            infobox: None,
        };
        self.compose_node(raw, root).map(Some)
    }

    fn compose_node(&self, raw: &RawLayer, inherited: Inherited<'_>) -> Result<Layer, CoreError> {
        let effective_visible = raw.visible && inherited.visible;
        let row = raw.linked_dataset_id.as_ref();

        let property = match (&raw.kind, &raw.merged, self.merge_mode) {
            (RawLayerKind::Item, Some(merged), MergeMode::ServerMerged) => self.resolver.resolve_merged(Some(merged), row)?,
            _ => self.resolver.resolve(raw.property.as_ref(), inherited.property, row)?,
        };

        let infobox = match &raw.infobox {
            Some(own) => Some(self.infobox(own, row)?),
            None => inherited.infobox.cloned(),
        };

        trace!(layer_id = %raw.id, effective_visible, "layer composed");

        let children = match &raw.kind {
            RawLayerKind::Group { children, .. } => {
                let context = Inherited {
                    visible: effective_visible,
                    property: raw.property.as_ref(),
                    infobox: infobox.as_ref(),
                };
                let mut composed = Vec::with_capacity(children.len());
                for child in children {
                    match child {
                        Some(child) => composed.push(self.compose_node(child, context)?),
                        None => debug!(parent_id = %raw.id, "skipping missing child layer"),
                    }
                }
                Some(composed)
            }
            RawLayerKind::Item => None,
        };

        Ok(Layer {
            id: raw.id.clone(),
            plugin_id: raw.plugin_id.clone(),
            extension_id: raw.extension_id.clone(),
            title: raw.title.clone(),
            own_visible: raw.visible,
            effective_visible,
            property,
            infobox,
            linked_dataset_id: raw.linked_dataset_id.clone(),
            children,
        })
    }

    fn infobox(&self, raw: &RawInfobox, row: Option<&DatasetRowId>) -> Result<Infobox, CoreError> {
        let property = match (&raw.merged, self.merge_mode) {
            (Some(merged), MergeMode::ServerMerged) => self.resolver.resolve_merged(Some(merged), row)?,
            _ => self.resolver.resolve(raw.property.as_ref(), None, row)?,
        };
        let blocks = raw
            .blocks
            .iter()
            .map(|block| {
                Ok(InfoboxBlock {
                    id: block.id.clone(),
                    plugin_id: block.plugin_id.clone(),
                    extension_id: block.extension_id.clone(),
                    property: self.resolver.resolve(block.property.as_ref(), None, row)?,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Ok(Infobox { property, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{DatasetTables, ExtensionCatalog};

    fn item(id: &str, visible: bool) -> RawLayer {
        RawLayer {
            id: LayerId::new(id),
            plugin_id: Some("builtin".into()),
            extension_id: Some("marker".into()),
            title: id.to_string(),
            visible,
            property: None,
            merged: None,
            infobox: None,
            linked_dataset_id: None,
            kind: RawLayerKind::Item,
        }
    }

    fn group(id: &str, visible: bool, children: Vec<Option<RawLayer>>) -> RawLayer {
        RawLayer {
            plugin_id: None,
            extension_id: None,
            kind: RawLayerKind::Group {
                children,
                linked_dataset_schema_id: None,
            },
            ..item(id, visible)
        }
    }

    fn compose(raw: &RawLayer) -> Layer {
        let catalog = ExtensionCatalog::new();
        let datasets = DatasetTables::new();
        let config = EngineConfig::default();
        let resolver = PropertyResolver::new(&catalog, &datasets, &config);
        let compositor = LayerCompositor::new(&resolver, &config);
        compositor.compose(Some(raw), true).unwrap().unwrap()
    }

    #[test]
    fn holes_are_skipped() {
        let root = group("root", true, vec![None, Some(item("a", true)), None]);
        let layer = compose(&root);
        let children = layer.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, LayerId::new("a"));
    }

    #[test]
    fn missing_root_is_none() {
        let catalog = ExtensionCatalog::new();
        let datasets = DatasetTables::new();
        let config = EngineConfig::default();
        let resolver = PropertyResolver::new(&catalog, &datasets, &config);
        let compositor = LayerCompositor::new(&resolver, &config);
        assert!(compositor.compose(None, true).unwrap().is_none());
    }

    #[test]
    fn flatten_prunes_hidden_subtrees() {
        let root = group(
            "root",
            true,
            vec![
                Some(group("hidden", false, vec![Some(item("h1", true))])),
                Some(item("a", true)),
                Some(item("b", false)),
                Some(group("g", true, vec![Some(item("c", true))])),
                Some(group("empty", true, vec![])),
            ],
        );
        let layer = compose(&root);
        let flat = layer.flatten();
        let rows: Vec<(&str, bool)> = flat.iter().map(|l| (l.id.as_str(), l.boundary)).collect();
        // The empty group is bound to no extension, so it is dropped too.
        assert_eq!(rows, vec![("a", false), ("g", true), ("c", false)]);
    }

    #[test]
    fn find_reaches_nested_layers() {
        let root = group("root", true, vec![Some(group("g", true, vec![Some(item("deep", false))]))]);
        let layer = compose(&root);
        let deep = layer.find(&LayerId::new("deep")).unwrap();
        assert!(!deep.own_visible);
        assert!(layer.find(&LayerId::new("nope")).is_none());
    }

    #[test]
    fn dataset_schema_ids_walk_the_tree() {
        use strata_core::property::{Field, PropertyGroup};

        let mut linked = item("linked", true);
        linked.property = Some(PropertyInstance::new("p", "marker").with_group(
            PropertyGroup::new("g", "default").with_field(Field::new("location", "LATLNG", 0.0).with_link("DS1", "f")),
        ));
        let mut root = group("root", true, vec![Some(group("g", true, vec![Some(linked), None]))]);
        if let RawLayerKind::Group {
            linked_dataset_schema_id,
            ..
        } = &mut root.kind
        {
            *linked_dataset_schema_id = Some(DatasetSchemaId::new("DS2"));
        }

        let ids: Vec<String> = root.dataset_schema_ids().into_iter().map(|id| id.into_string()).collect();
        assert_eq!(ids, vec!["DS1", "DS2"]);
    }
}
