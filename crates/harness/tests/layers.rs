use strata_core::{DatasetRowId, DatasetTables, LayerId, SceneId, Value};
use strata_engine::layers::{self, RawInfobox, RawInfoboxBlock};
use strata_engine::{EngineConfig, LayerCompositor, MergeMode, PropertyResolver, RawLayer, RawScene};
use strata_harness::fixtures::{self, group_layer, item_layer};
use strata_harness::{TestWorkspace, init_tracing};

fn scene(root: RawLayer) -> RawScene {
    RawScene {
        id: SceneId::new("scene"),
        property: None,
        root_layer: Some(root),
        widgets: Vec::new(),
        align_system: None,
        stories: Vec::new(),
    }
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn hidden_group_hides_its_whole_subtree() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let root = group_layer(
        "root",
        true,
        vec![group_layer(
            "hidden",
            false,
            vec![group_layer("inner", true, vec![item_layer("leaf", Some("builtin"), true)])],
        )],
    );
    let view = TestWorkspace::new()?.compose(&scene(root))?;
    let root = view.root_layer.ok_or("no root")?;

    for id in ["hidden", "inner", "leaf"] {
        let layer = root.find(&LayerId::new(id)).ok_or("missing layer")?;
        assert!(!layer.effective_visible, "{id} should be hidden");
    }
    let leaf = root.find(&LayerId::new("leaf")).ok_or("missing leaf")?;
    assert!(leaf.own_visible);
    assert!(view.layers.is_empty());
    Ok(())
}

#[test]
fn invisible_ancestor_argument_hides_the_root() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = fixtures::catalog();
    let datasets = DatasetTables::new();
    let config = EngineConfig::default();
    let resolver = PropertyResolver::new(&catalog, &datasets, &config);
    let compositor = LayerCompositor::new(&resolver, &config);

    let root = group_layer("root", true, vec![item_layer("a", Some("builtin"), true)]);
    let layer = compositor.compose(Some(&root), false)?.ok_or("no root")?;
    assert!(!layer.effective_visible);
    assert!(layer.flatten().is_empty());
    Ok(())
}

// ============================================================================
// Flattening
// ============================================================================

#[test]
fn unbound_leaf_leaves_only_the_group_boundary() -> Result<(), Box<dyn std::error::Error>> {
    let root = group_layer("root", true, vec![group_layer("A", true, vec![item_layer("B", None, true)])]);
    let view = TestWorkspace::new()?.compose(&scene(root))?;

    assert_eq!(view.layers.len(), 1);
    assert_eq!(view.layers[0].id, LayerId::new("A"));
    assert!(view.layers[0].boundary);
    Ok(())
}

#[test]
fn flatten_keeps_draw_order() -> Result<(), Box<dyn std::error::Error>> {
    let root = group_layer(
        "root",
        true,
        vec![
            item_layer("a", Some("builtin"), true),
            group_layer(
                "g",
                true,
                vec![item_layer("b", Some("builtin"), true), item_layer("c", Some("builtin"), false)],
            ),
            item_layer("d", Some("builtin"), true),
        ],
    );
    let view = TestWorkspace::new()?.compose(&scene(root))?;
    let rows: Vec<(&str, bool)> = view.layers.iter().map(|l| (l.id.as_str(), l.boundary)).collect();
    assert_eq!(rows, vec![("a", false), ("g", true), ("b", false), ("d", false)]);

    let root = view.root_layer.as_ref().ok_or("no root")?;
    assert_eq!(layers::flatten(root.children.as_deref().unwrap_or_default()), view.layers);
    Ok(())
}

// ============================================================================
// Inheritance
// ============================================================================

#[test]
fn leaves_inherit_the_group_property() -> Result<(), Box<dyn std::error::Error>> {
    let mut group = group_layer("g", true, vec![item_layer("plain", Some("builtin"), true)]);
    group.property = Some(fixtures::marker_property("gp", Some(4.0)));
    let mut overriding = item_layer("overriding", Some("builtin"), true);
    overriding.property = Some(fixtures::marker_property("op", Some(8.0)));
    if let strata_engine::RawLayerKind::Group { children, .. } = &mut group.kind {
        children.push(Some(overriding));
    }

    let view = TestWorkspace::new()?.compose(&scene(group_layer("root", true, vec![group])))?;
    let root = view.root_layer.ok_or("no root")?;

    // The leaf has no property of its own, so only the group's applies.
    let plain = root.find(&LayerId::new("plain")).ok_or("missing")?;
    assert_eq!(
        plain.property.as_ref().and_then(|p| p.value("default", "size")),
        Some(&Value::Number(4.0))
    );
    let overriding = root.find(&LayerId::new("overriding")).ok_or("missing")?;
    assert_eq!(
        overriding.property.as_ref().and_then(|p| p.value("default", "size")),
        Some(&Value::Number(8.0))
    );
    Ok(())
}

#[test]
fn infobox_is_inherited_whole() -> Result<(), Box<dyn std::error::Error>> {
    let mut group = group_layer(
        "g",
        true,
        vec![item_layer("inherits", Some("builtin"), true), item_layer("owns", Some("builtin"), true)],
    );
    group.infobox = Some(RawInfobox {
        property: None,
        merged: None,
        blocks: vec![RawInfoboxBlock {
            id: "block".into(),
            plugin_id: "builtin".into(),
            extension_id: "textblock".into(),
            property: None,
        }],
    });
    if let strata_engine::RawLayerKind::Group { children, .. } = &mut group.kind {
        if let Some(Some(owns)) = children.get_mut(1) {
            owns.infobox = Some(RawInfobox::default());
        }
    }

    let view = TestWorkspace::new()?.compose(&scene(group_layer("root", true, vec![group])))?;
    let root = view.root_layer.ok_or("no root")?;
    let inherits = root.find(&LayerId::new("inherits")).ok_or("missing")?;
    let owns = root.find(&LayerId::new("owns")).ok_or("missing")?;
    assert_eq!(inherits.infobox.as_ref().map(|i| i.blocks.len()), Some(1));
    assert_eq!(owns.infobox.as_ref().map(|i| i.blocks.len()), Some(0));
    Ok(())
}

#[test]
fn group_property_of_another_schema_does_not_break_the_tree() -> Result<(), Box<dyn std::error::Error>> {
    let mut first = item_layer("first", Some("builtin"), true);
    first.property = Some(fixtures::marker_property("fp", Some(3.0)));
    let mut second = item_layer("second", Some("builtin"), true);
    second.property = Some(fixtures::marker_property("sp", None));

    let mut group = group_layer("g", true, vec![first, second]);
    group.property = Some(
        strata_core::PropertyInstance::new("gp", fixtures::SCENE_SCHEMA).with_group(
            strata_core::property::PropertyGroup::new("gpg", "default")
                .with_field(strata_core::property::Field::new("bgcolor", "STRING", "#ffffff")),
        ),
    );

    let view = TestWorkspace::new()?.compose(&scene(group_layer("root", true, vec![group])))?;
    let root = view.root_layer.ok_or("no root")?;

    let group = root.find(&LayerId::new("g")).ok_or("missing")?;
    assert_eq!(
        group.property.as_ref().and_then(|p| p.value("default", "bgcolor")),
        Some(&Value::from("#ffffff"))
    );
    let size = |id: &str| {
        root.find(&LayerId::new(id))
            .and_then(|l| l.property.as_ref())
            .and_then(|p| p.value("default", "size"))
            .cloned()
    };
    assert_eq!(size("first"), Some(Value::Number(3.0)));
    assert_eq!(size("second"), Some(Value::Number(10.0)));
    assert_eq!(view.layers.len(), 3);
    Ok(())
}

#[test]
fn merged_payload_is_used_only_in_server_merged_mode() -> Result<(), Box<dyn std::error::Error>> {
    let schema = fixtures::marker_schema();
    let original = fixtures::marker_property("op", Some(1.0));
    let mut leaf = item_layer("leaf", Some("builtin"), true);
    leaf.property = Some(fixtures::marker_property("stale", Some(50.0)));
    leaf.merged = strata_core::MergedProperty::merge(&schema, Some(&original), None, None);
    let raw = scene(group_layer("root", true, vec![leaf]));

    let size = |view: &strata_engine::SceneView| -> Option<Value> {
        view.root_layer
            .as_ref()?
            .find(&LayerId::new("leaf"))?
            .property
            .as_ref()?
            .value("default", "size")
            .cloned()
    };

    let server = TestWorkspace::new()?.compose(&raw)?;
    assert_eq!(size(&server), Some(Value::Number(1.0)));

    let client = TestWorkspace::new()?
        .with_config(EngineConfig::default().with_merge_mode(MergeMode::Client))
        .compose(&raw)?;
    assert_eq!(size(&client), Some(Value::Number(50.0)));
    Ok(())
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn recomposing_gives_identical_output() -> Result<(), Box<dyn std::error::Error>> {
    let mut leaf = item_layer("leaf", Some("builtin"), true);
    leaf.property = Some(fixtures::marker_property("lp", Some(3.0)));
    leaf.linked_dataset_id = Some(DatasetRowId::new("R1"));
    let raw = scene(group_layer(
        "root",
        true,
        vec![group_layer("g", true, vec![leaf, item_layer("hidden", Some("builtin"), false)])],
    ));

    let mut workspace = TestWorkspace::new()?;
    let first = workspace.compose(&raw)?;
    let second = workspace.compose(&raw)?;
    assert_eq!(first, second);
    assert_eq!(first.fingerprint()?, second.fingerprint()?);

    let root = first.root_layer.as_ref().ok_or("no root")?;
    assert_eq!(root.flatten(), root.flatten());

    let changed = scene(group_layer("root", true, vec![item_layer("other", Some("builtin"), true)]));
    let third = workspace.compose(&changed)?;
    assert_ne!(first.fingerprint()?, third.fingerprint()?);
    Ok(())
}
