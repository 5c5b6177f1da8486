//! Builders for catalogs, property instances, layers and widgets used across
//! the integration tests.

use strata_core::extension::{Extendable, ExtensionKind};
use strata_core::property::{Field, PropertyGroup, PropertyGroupList};
use strata_core::schema::{LocalizedText, SchemaField, SchemaGroup};
use strata_core::{
    ExtensionCatalog, ExtensionManifest, LayerId, LayoutConstraint, PropertyInstance, PropertySchema, SchemaId,
    ValueType, WidgetId,
};
use strata_engine::widgets::{RawArea, RawSection, RawZone};
use strata_engine::{RawAlignSystem, RawLayer, RawLayerKind, RawWidget};

pub const MARKER_SCHEMA: &str = "builtin/marker";
pub const SCENE_SCHEMA: &str = "builtin/scene";
pub const MENU_SCHEMA: &str = "builtin/menu";

pub fn single_group(id: &str, fields: Vec<SchemaField>) -> SchemaGroup {
    SchemaGroup {
        id: id.to_string(),
        is_list: false,
        title: LocalizedText::default(),
        fields,
    }
}

pub fn list_group(id: &str, fields: Vec<SchemaField>) -> SchemaGroup {
    SchemaGroup {
        is_list: true,
        ..single_group(id, fields)
    }
}

/// `default.size:number` (default 10), `default.location:latlng`,
/// `default.title:string` and a `markers` list of `label:string`.
pub fn marker_schema() -> PropertySchema {
    let mut size = SchemaField::new("size", ValueType::Number).with_default(10.0);
    size.ui = Some("slider".into());
    size.min = Some(0.0);
    size.max = Some(100.0);
    size.title = LocalizedText::new("en", "Size").with("ja", "サイズ");
    PropertySchema {
        id: SchemaId::new(MARKER_SCHEMA),
        groups: vec![
            single_group(
                "default",
                vec![
                    size,
                    SchemaField::new("location", ValueType::LatLng),
                    SchemaField::new("title", ValueType::String),
                ],
            ),
            list_group("markers", vec![SchemaField::new("label", ValueType::String)]),
        ],
    }
}

fn scene_schema() -> PropertySchema {
    PropertySchema {
        id: SchemaId::new(SCENE_SCHEMA),
        groups: vec![single_group(
            "default",
            vec![SchemaField::new("bgcolor", ValueType::String).with_default("#000000")],
        )],
    }
}

fn menu_schema() -> PropertySchema {
    PropertySchema {
        id: SchemaId::new(MENU_SCHEMA),
        groups: vec![single_group("default", vec![SchemaField::new("title", ValueType::String)])],
    }
}

fn widget_manifest(plugin_id: &str, extension_id: &str, floating: bool) -> ExtensionManifest {
    ExtensionManifest {
        plugin_id: plugin_id.into(),
        extension_id: extension_id.into(),
        kind: ExtensionKind::Widget,
        schema_id: Some(SchemaId::new(format!("{plugin_id}/{extension_id}"))),
        widget_layout: Some(LayoutConstraint {
            extendable: Extendable::default(),
            floating,
        }),
    }
}

/// Catalog with the marker primitive, the scene schema, docked `menu` and
/// `acme/clock` widgets and a floating `splash` widget.
pub fn catalog() -> ExtensionCatalog {
    let mut catalog = ExtensionCatalog::new();
    catalog.add_schema(marker_schema());
    catalog.add_schema(scene_schema());
    catalog.add_schema(menu_schema());
    catalog.add_extension(ExtensionManifest {
        plugin_id: "builtin".into(),
        extension_id: "marker".into(),
        kind: ExtensionKind::Primitive,
        schema_id: Some(SchemaId::new(MARKER_SCHEMA)),
        widget_layout: None,
    });
    catalog.add_extension(widget_manifest("builtin", "menu", false));
    catalog.add_extension(widget_manifest("builtin", "splash", true));
    catalog.add_extension(widget_manifest("acme", "clock", false));
    catalog
}

/// Marker property with `default.size` set when `size` is given.
pub fn marker_property(id: &str, size: Option<f64>) -> PropertyInstance {
    let property = PropertyInstance::new(id, MARKER_SCHEMA);
    match size {
        Some(size) => property.with_group(
            PropertyGroup::new(format!("{id}-default"), "default").with_field(Field::new("size", "NUMBER", size)),
        ),
        None => property,
    }
}

pub fn marker_list(id: &str, labels: &[&str]) -> PropertyGroupList {
    PropertyGroupList {
        id: format!("{id}-markers").into(),
        schema_group_id: "markers".into(),
        groups: labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                PropertyGroup::new(format!("{id}-marker-{i}"), "markers").with_field(Field::new("label", "STRING", *label))
            })
            .collect(),
    }
}

pub fn item_layer(id: &str, plugin_id: Option<&str>, visible: bool) -> RawLayer {
    RawLayer {
        id: LayerId::new(id),
        plugin_id: plugin_id.map(str::to_string),
        extension_id: plugin_id.map(|_| "marker".to_string()),
        title: id.to_string(),
        visible,
        property: None,
        merged: None,
        infobox: None,
        linked_dataset_id: None,
        kind: RawLayerKind::Item,
    }
}

pub fn group_layer(id: &str, visible: bool, children: Vec<RawLayer>) -> RawLayer {
    RawLayer {
        kind: RawLayerKind::Group {
            children: children.into_iter().map(Some).collect(),
            linked_dataset_schema_id: None,
        },
        ..item_layer(id, None, visible)
    }
}

pub fn widget(id: &str, plugin_id: &str, extension_id: &str) -> RawWidget {
    RawWidget {
        id: WidgetId::new(id),
        plugin_id: plugin_id.into(),
        extension_id: extension_id.into(),
        enabled: true,
        extended: false,
        property: None,
    }
}

pub fn area(widget_ids: &[&str]) -> RawArea {
    RawArea {
        widget_ids: widget_ids.iter().map(|id| WidgetId::new(*id)).collect(),
        ..RawArea::default()
    }
}

/// Align system with a single configured area at `outer.left.top`.
pub fn outer_left_top(area: RawArea) -> RawAlignSystem {
    RawAlignSystem {
        outer: Some(RawZone {
            left: Some(RawSection {
                top: Some(area),
                ..RawSection::default()
            }),
            ..RawZone::default()
        }),
        inner: None,
    }
}
