use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ExtensionKey, SchemaId};
use crate::schema::PropertySchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionKind {
    Primitive,
    Widget,
    Block,
    Visualizer,
    Infobox,
    StoryPage,
    StoryBlock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extendable {
    #[serde(default)]
    pub horizontally: bool,
    #[serde(default)]
    pub vertically: bool,
}

/// Widget layout rules declared by the extension manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConstraint {
    #[serde(default)]
    pub extendable: Extendable,
    #[serde(default)]
    pub floating: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    pub plugin_id: String,
    pub extension_id: String,
    pub kind: ExtensionKind,
    #[serde(default)]
    pub schema_id: Option<SchemaId>,
    #[serde(default)]
    pub widget_layout: Option<LayoutConstraint>,
}

impl ExtensionManifest {
    pub fn key(&self) -> ExtensionKey {
        ExtensionKey::new(&self.plugin_id, &self.extension_id)
    }
}

/// Source of plugin-declared schemas and layout rules.
pub trait SchemaRegistry {
    fn schema(&self, schema_id: &SchemaId) -> Option<&PropertySchema>;

    fn layout_constraint(&self, key: &ExtensionKey) -> Option<LayoutConstraint>;

    /// Every declared widget layout constraint.
    fn layout_constraints(&self) -> BTreeMap<ExtensionKey, LayoutConstraint>;
}

/// In-memory registry built from plugin manifests.
#[derive(Debug, Clone, Default)]
pub struct ExtensionCatalog {
    schemas: BTreeMap<SchemaId, PropertySchema>,
    extensions: BTreeMap<ExtensionKey, ExtensionManifest>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schema(&mut self, schema: PropertySchema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    pub fn add_extension(&mut self, manifest: ExtensionManifest) {
        self.extensions.insert(manifest.key(), manifest);
    }

    pub fn extension(&self, key: &ExtensionKey) -> Option<&ExtensionManifest> {
        self.extensions.get(key)
    }

    /// Schema declared by an extension, if the extension declares one.
    pub fn extension_schema(&self, key: &ExtensionKey) -> Option<&PropertySchema> {
        let schema_id = self.extensions.get(key)?.schema_id.as_ref()?;
        self.schemas.get(schema_id)
    }
}

impl SchemaRegistry for ExtensionCatalog {
    fn schema(&self, schema_id: &SchemaId) -> Option<&PropertySchema> {
        self.schemas.get(schema_id)
    }

    fn layout_constraint(&self, key: &ExtensionKey) -> Option<LayoutConstraint> {
        self.extensions.get(key).and_then(|e| e.widget_layout)
    }

    fn layout_constraints(&self) -> BTreeMap<ExtensionKey, LayoutConstraint> {
        self.extensions
            .iter()
            .filter_map(|(key, e)| e.widget_layout.map(|layout| (key.clone(), layout)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(plugin: &str, extension: &str, floating: bool) -> ExtensionManifest {
        ExtensionManifest {
            plugin_id: plugin.into(),
            extension_id: extension.into(),
            kind: ExtensionKind::Widget,
            schema_id: Some(SchemaId::new(format!("{plugin}/{extension}"))),
            widget_layout: Some(LayoutConstraint {
                extendable: Extendable::default(),
                floating,
            }),
        }
    }

    #[test]
    fn layout_constraints_only_cover_widgets() {
        let mut catalog = ExtensionCatalog::new();
        catalog.add_extension(widget("builtin", "menu", false));
        catalog.add_extension(widget("builtin", "splash", true));
        catalog.add_extension(ExtensionManifest {
            plugin_id: "builtin".into(),
            extension_id: "marker".into(),
            kind: ExtensionKind::Primitive,
            schema_id: None,
            widget_layout: None,
        });

        let constraints = catalog.layout_constraints();
        assert_eq!(constraints.len(), 2);
        assert!(constraints[&ExtensionKey::new("builtin", "splash")].floating);
        assert!(!constraints[&ExtensionKey::new("builtin", "menu")].floating);
        assert!(catalog.layout_constraint(&ExtensionKey::new("builtin", "marker")).is_none());
    }

    #[test]
    fn extension_schema_requires_registered_schema() {
        let mut catalog = ExtensionCatalog::new();
        catalog.add_extension(widget("builtin", "menu", false));
        assert!(catalog.extension_schema(&ExtensionKey::new("builtin", "menu")).is_none());

        catalog.add_schema(PropertySchema {
            id: SchemaId::new("builtin/menu"),
            groups: Vec::new(),
        });
        assert!(catalog.extension_schema(&ExtensionKey::new("builtin", "menu")).is_some());
    }
}
