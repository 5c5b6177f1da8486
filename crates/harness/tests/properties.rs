//! Property-based invariants of layer composition and property resolution.
//!
//! 1. Effective visibility is the conjunction of a layer's own flag and every
//!    ancestor's.
//! 2. Flattened output never contains an invisible layer.
//! 3. A set override beats the parent, which beats the schema default.
//! 4. Composition is deterministic.

use proptest::prelude::*;
use strata_core::{DatasetTables, Value};
use strata_engine::{EngineConfig, Layer, LayerCompositor, PropertyResolver, RawLayer};
use strata_harness::fixtures::{self, group_layer, item_layer};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Shape {
    Leaf(bool),
    Group(bool, Vec<Shape>),
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    any::<bool>().prop_map(Shape::Leaf).prop_recursive(4, 48, 5, |inner| {
        (any::<bool>(), prop::collection::vec(inner, 0..5)).prop_map(|(visible, children)| Shape::Group(visible, children))
    })
}

fn build(shape: &Shape, next_id: &mut usize) -> RawLayer {
    *next_id += 1;
    let id = format!("l{next_id}");
    match shape {
        Shape::Leaf(visible) => item_layer(&id, Some("builtin"), *visible),
        Shape::Group(visible, children) => {
            let children = children.iter().map(|c| build(c, next_id)).collect();
            group_layer(&id, *visible, children)
        }
    }
}

fn compose(raw: &RawLayer) -> Layer {
    let catalog = fixtures::catalog();
    let datasets = DatasetTables::new();
    let config = EngineConfig::default();
    let resolver = PropertyResolver::new(&catalog, &datasets, &config);
    let compositor = LayerCompositor::new(&resolver, &config);
    match compositor.compose(Some(raw), true) {
        Ok(Some(layer)) => layer,
        other => panic!("composition failed: {other:?}"),
    }
}

fn check_visibility(layer: &Layer, ancestors_visible: bool) -> Result<(), TestCaseError> {
    prop_assert_eq!(
        layer.effective_visible,
        layer.own_visible && ancestors_visible,
        "layer {} has the wrong effective visibility",
        layer.id
    );
    for child in layer.children.iter().flatten() {
        check_visibility(child, layer.effective_visible)?;
    }
    Ok(())
}

// ============================================================================
// 1-2. Visibility propagation
// ============================================================================

proptest! {
    #[test]
    fn visibility_propagates(shape in shape_strategy()) {
        let raw = build(&Shape::Group(true, vec![shape]), &mut 0);
        let root = compose(&raw);
        check_visibility(&root, true)?;
        prop_assert!(root.flatten().iter().all(|l| l.effective_visible));
    }
}

// ============================================================================
// 3. Override precedence
// ============================================================================

proptest! {
    #[test]
    fn override_beats_parent_beats_default(original in prop::option::of(0u8..100), parent in prop::option::of(0u8..100)) {
        let catalog = fixtures::catalog();
        let datasets = DatasetTables::new();
        let config = EngineConfig::default();
        let resolver = PropertyResolver::new(&catalog, &datasets, &config);

        let original = fixtures::marker_property("original", original.map(f64::from));
        let parent_property = fixtures::marker_property("parent", parent.map(f64::from));
        let resolved = resolver.resolve(Some(&original), Some(&parent_property), None);
        let size = match resolved {
            Ok(Some(resolved)) => resolved.value("default", "size").cloned(),
            other => return Err(TestCaseError::fail(format!("resolution failed: {other:?}"))),
        };

        let expected = original
            .items
            .first()
            .and_then(|i| i.as_group())
            .and_then(|g| g.field("size"))
            .and_then(|f| f.value.clone())
            .or_else(|| parent.map(|p| Value::Number(f64::from(p))))
            .unwrap_or(Value::Number(10.0));
        prop_assert_eq!(size, Some(expected));
    }
}

// ============================================================================
// 4. Determinism
// ============================================================================

proptest! {
    #[test]
    fn composition_is_deterministic(shape in shape_strategy()) {
        let raw = build(&shape, &mut 0);
        let first = compose(&raw);
        let second = compose(&raw);
        prop_assert_eq!(first.flatten(), second.flatten());
        prop_assert_eq!(first, second);
    }
}
