//! Widget alignment: splits enabled widgets into floating and docked sets,
//! then fills the outer/inner × left/center/right × top/middle/bottom grid
//! with the docked ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_core::{CoreError, ExtensionKey, LayoutConstraint, PropertyInstance, WidgetId};

use crate::config::{EngineConfig, WidgetDefaults};
use crate::resolver::{PropertyResolver, ResolvedProperty};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Centered,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Padding {
    pub fn uniform(px: u32) -> Self {
        Self {
            top: px,
            bottom: px,
            left: px,
            right: px,
        }
    }
}

impl Default for Padding {
    fn default() -> Self {
        Self::uniform(6)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWidget {
    pub id: WidgetId,
    pub plugin_id: String,
    pub extension_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
}

impl RawWidget {
    pub fn key(&self) -> ExtensionKey {
        ExtensionKey::new(&self.plugin_id, &self.extension_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArea {
    #[serde(default)]
    pub widget_ids: Vec<WidgetId>,
    #[serde(default)]
    pub align: Option<Align>,
    #[serde(default)]
    pub padding: Option<Padding>,
    #[serde(default)]
    pub gap: Option<u32>,
    #[serde(default)]
    pub centered: Option<bool>,
    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSection {
    #[serde(default)]
    pub top: Option<RawArea>,
    #[serde(default)]
    pub middle: Option<RawArea>,
    #[serde(default)]
    pub bottom: Option<RawArea>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawZone {
    #[serde(default)]
    pub left: Option<RawSection>,
    #[serde(default)]
    pub center: Option<RawSection>,
    #[serde(default)]
    pub right: Option<RawSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAlignSystem {
    #[serde(default)]
    pub outer: Option<RawZone>,
    #[serde(default)]
    pub inner: Option<RawZone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPlacement {
    pub id: WidgetId,
    pub plugin_id: String,
    pub extension_id: String,
    pub property: Option<ResolvedProperty>,
    pub extended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Area {
    pub align: Align,
    pub padding: Padding,
    pub gap: u32,
    pub widgets: Vec<WidgetPlacement>,
    pub background: Option<String>,
    pub centered: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub top: Option<Area>,
    pub middle: Option<Area>,
    pub bottom: Option<Area>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub left: Option<Section>,
    pub center: Option<Section>,
    pub right: Option<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetAlignSystem {
    pub outer: Option<Zone>,
    pub inner: Option<Zone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetLayout {
    pub floating: Vec<WidgetPlacement>,
    pub align_system: Option<WidgetAlignSystem>,
    /// Every declared widget layout constraint, keyed `plugin/extension`.
    pub layout_constraint: BTreeMap<String, LayoutConstraint>,
    /// First-party extensions among the enabled widgets.
    pub own_extensions: Vec<ExtensionKey>,
}

impl WidgetAlignSystem {
    /// The area at `zone.section.area`, e.g. `("outer", "left", "top")`.
    pub fn area(&self, zone: &str, section: &str, area: &str) -> Option<&Area> {
        let zone = match zone {
            "outer" => self.outer.as_ref(),
            "inner" => self.inner.as_ref(),
            _ => None,
        }?;
        let section = match section {
            "left" => zone.left.as_ref(),
            "center" => zone.center.as_ref(),
            "right" => zone.right.as_ref(),
            _ => None,
        }?;
        match area {
            "top" => section.top.as_ref(),
            "middle" => section.middle.as_ref(),
            "bottom" => section.bottom.as_ref(),
            _ => None,
        }
    }
}

struct GridBuilder<'w> {
    docked: BTreeMap<&'w WidgetId, WidgetPlacement>,
    defaults: &'w WidgetDefaults,
}

impl GridBuilder<'_> {
    fn area(&self, raw: Option<&RawArea>) -> Option<Area> {
        let raw = raw?;
        let widgets: Vec<WidgetPlacement> = raw
            .widget_ids
            .iter()
            .filter_map(|id| {
                let placement = self.docked.get(id).cloned();
                if placement.is_none() {
                    debug!(widget_id = %id, "area references a widget that is not docked");
                }
                placement
            })
            .collect();
        if widgets.is_empty() {
            return None;
        }
        Some(Area {
            align: raw.align.unwrap_or(self.defaults.align),
            padding: raw.padding.unwrap_or(self.defaults.padding),
            gap: raw.gap.unwrap_or(self.defaults.gap),
            widgets,
            background: raw.background.clone(),
            centered: raw.centered,
        })
    }

    fn section(&self, raw: Option<&RawSection>) -> Option<Section> {
        let raw = raw?;
        let section = Section {
            top: self.area(raw.top.as_ref()),
            middle: self.area(raw.middle.as_ref()),
            bottom: self.area(raw.bottom.as_ref()),
        };
        (section.top.is_some() || section.middle.is_some() || section.bottom.is_some()).then_some(section)
    }

    fn zone(&self, raw: Option<&RawZone>) -> Option<Zone> {
        let raw = raw?;
        let zone = Zone {
            left: self.section(raw.left.as_ref()),
            center: self.section(raw.center.as_ref()),
            right: self.section(raw.right.as_ref()),
        };
        (zone.left.is_some() || zone.center.is_some() || zone.right.is_some()).then_some(zone)
    }

    fn align_system(&self, raw: Option<&RawAlignSystem>) -> Option<WidgetAlignSystem> {
        let raw = raw?;
        let system = WidgetAlignSystem {
            outer: self.zone(raw.outer.as_ref()),
            inner: self.zone(raw.inner.as_ref()),
        };
        (system.outer.is_some() || system.inner.is_some()).then_some(system)
    }
}

/// Builds the widget layout for a scene. Disabled widgets are dropped
/// entirely; areas, sections, zones and the system itself collapse to `None`
/// when they end up with no widgets.
pub fn build(
    widgets: &[RawWidget],
    align_system: Option<&RawAlignSystem>,
    resolver: &PropertyResolver<'_>,
    config: &EngineConfig,
) -> Result<WidgetLayout, CoreError> {
    let registry = resolver.registry();
    let mut floating = Vec::new();
    let mut docked = BTreeMap::new();
    let mut own_extensions: Vec<ExtensionKey> = Vec::new();

    for widget in widgets.iter().filter(|w| w.enabled) {
        let key = widget.key();
        let placement = WidgetPlacement {
            id: widget.id.clone(),
            plugin_id: widget.plugin_id.clone(),
            extension_id: widget.extension_id.clone(),
            property: resolver.resolve(widget.property.as_ref(), None, None)?,
            extended: widget.extended,
        };
        let is_floating = registry.layout_constraint(&key).is_some_and(|c| c.floating);
        if is_floating {
            floating.push(placement);
        } else {
            docked.insert(&widget.id, placement);
        }
        if config.is_builtin_plugin(&key.plugin_id) && !own_extensions.contains(&key) {
            own_extensions.push(key);
        }
    }

    let grid = GridBuilder {
        docked,
        defaults: &config.widgets,
    };
    let align_system = grid.align_system(align_system);

    let layout_constraint = registry
        .layout_constraints()
        .into_iter()
        .map(|(key, constraint)| (key.to_string(), constraint))
        .collect();

    Ok(WidgetLayout {
        floating,
        align_system,
        layout_constraint,
        own_extensions,
    })
}
