pub mod config;
pub mod error;
pub mod layers;
pub mod resolver;
pub mod story;
pub mod widgets;

pub use config::{Detail, EngineConfig, MergeMode, WidgetDefaults};
pub use error::EngineError;
pub use layers::{FlattenedLayer, Infobox, InfoboxBlock, Layer, LayerCompositor, RawInfobox, RawLayer, RawLayerKind};
pub use resolver::{PropertyResolver, PropertySource, ResolvedGroup, ResolvedProperty};
pub use story::{RawStory, Story};
pub use widgets::{RawAlignSystem, RawWidget, WidgetAlignSystem, WidgetLayout};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::{DatasetSchemaId, DatasetTables, PropertyInstance, SceneId, SchemaRegistry};
use strata_datasets::{DatasetCache, DatasetLoader};

/// A scene as the API delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScene {
    pub id: SceneId,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
    #[serde(default)]
    pub root_layer: Option<RawLayer>,
    #[serde(default)]
    pub widgets: Vec<RawWidget>,
    #[serde(default)]
    pub align_system: Option<RawAlignSystem>,
    #[serde(default)]
    pub stories: Vec<RawStory>,
}

impl RawScene {
    /// Dataset schemas linked from anywhere in the scene.
    pub fn dataset_schema_ids(&self) -> BTreeSet<DatasetSchemaId> {
        let mut ids = self
            .root_layer
            .as_ref()
            .map(RawLayer::dataset_schema_ids)
            .unwrap_or_default();
        let instances = self
            .property
            .iter()
            .chain(self.widgets.iter().filter_map(|w| w.property.as_ref()))
            .chain(self.stories.iter().flat_map(|s| {
                s.pages.iter().flat_map(|p| {
                    p.property
                        .iter()
                        .chain(p.blocks.iter().filter_map(|b| b.property.as_ref()))
                })
            }));
        for instance in instances {
            ids.extend(instance.links().map(|l| l.dataset_schema_id.clone()));
        }
        ids
    }
}

/// Everything a renderer needs to draw one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneView {
    pub scene_property: Option<ResolvedProperty>,
    pub root_layer: Option<Layer>,
    /// The root's descendants in draw order.
    pub layers: Vec<FlattenedLayer>,
    pub widgets: WidgetLayout,
    pub stories: Vec<Story>,
}

impl SceneView {
    /// BLAKE3 hash of the view's MessagePack encoding. Equal inputs give
    /// equal fingerprints.
    pub fn fingerprint(&self) -> Result<[u8; 32], EngineError> {
        let bytes = rmp_serde::to_vec_named(self).map_err(|e| EngineError::Serialization(e.to_string()))?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Entry point: composes raw scenes against a schema registry and the
/// dataset tables loaded so far.
pub struct SceneComposer<'a> {
    config: EngineConfig,
    registry: &'a dyn SchemaRegistry,
    datasets: &'a DatasetTables,
}

impl<'a> SceneComposer<'a> {
    pub fn new(config: EngineConfig, registry: &'a dyn SchemaRegistry, datasets: &'a DatasetTables) -> Self {
        Self {
            config,
            registry,
            datasets,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> PropertyResolver<'_> {
        PropertyResolver::new(self.registry, self.datasets, &self.config)
    }

    pub fn compose_scene(&self, raw: &RawScene) -> Result<SceneView, EngineError> {
        let resolver = self.resolver();
        let scene_property = resolver.resolve(raw.property.as_ref(), None, None)?;

        let compositor = LayerCompositor::new(&resolver, &self.config);
        let root_layer = compositor.compose(raw.root_layer.as_ref(), true)?;
        let layers = root_layer.as_ref().map(Layer::flatten).unwrap_or_default();

        let widgets = widgets::build(&raw.widgets, raw.align_system.as_ref(), &resolver, &self.config)?;
        let stories = raw
            .stories
            .iter()
            .map(|story| story::compose_story(story, &resolver))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            scene_id = %raw.id,
            layers = layers.len(),
            floating_widgets = widgets.floating.len(),
            stories = stories.len(),
            "scene composed"
        );

        Ok(SceneView {
            scene_property,
            root_layer,
            layers,
            widgets,
            stories,
        })
    }
}

/// Fetches every dataset table the scene links to and has not been
/// requested yet. Returns how many tables were fetched.
pub fn prefetch_datasets<L: DatasetLoader>(
    raw: &RawScene,
    cache: &mut DatasetCache,
    loader: &L,
) -> Result<usize, EngineError> {
    let ids = raw.dataset_schema_ids();
    Ok(cache.load_all(loader, &ids)?)
}
