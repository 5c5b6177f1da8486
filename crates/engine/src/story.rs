use serde::{Deserialize, Serialize};
use tracing::trace;

use strata_core::{BlockId, CoreError, LayerId, PageId, PropertyInstance, StoryId};

use crate::config::Detail;
use crate::resolver::{PropertyResolver, ResolvedProperty};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStoryBlock {
    pub id: BlockId,
    pub plugin_id: String,
    pub extension_id: String,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStoryPage {
    pub id: PageId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub swipeable: bool,
    #[serde(default)]
    pub layer_ids: Vec<LayerId>,
    #[serde(default)]
    pub property: Option<PropertyInstance>,
    #[serde(default)]
    pub blocks: Vec<RawStoryBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStory {
    pub id: StoryId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pages: Vec<RawStoryPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryBlock {
    pub id: BlockId,
    pub plugin_id: String,
    pub extension_id: String,
    pub property: Option<ResolvedProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPage {
    pub id: PageId,
    pub title: String,
    pub swipeable: bool,
    pub layer_ids: Vec<LayerId>,
    pub property: Option<ResolvedProperty>,
    pub blocks: Vec<StoryBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub pages: Vec<StoryPage>,
}

/// Composes a story. Page and block properties always carry enriched
/// metadata, whatever detail the resolver was configured with.
pub fn compose_story(raw: &RawStory, resolver: &PropertyResolver<'_>) -> Result<Story, CoreError> {
    let resolver = (*resolver).with_detail(Detail::Enriched);
    let pages = raw
        .pages
        .iter()
        .map(|page| compose_page(page, &resolver))
        .collect::<Result<Vec<_>, _>>()?;
    trace!(story_id = %raw.id, pages = pages.len(), "story composed");
    Ok(Story {
        id: raw.id.clone(),
        title: raw.title.clone(),
        pages,
    })
}

fn compose_page(raw: &RawStoryPage, resolver: &PropertyResolver<'_>) -> Result<StoryPage, CoreError> {
    let blocks = raw
        .blocks
        .iter()
        .map(|block| {
            Ok(StoryBlock {
                id: block.id.clone(),
                plugin_id: block.plugin_id.clone(),
                extension_id: block.extension_id.clone(),
                property: resolver.resolve(block.property.as_ref(), None, None)?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;
    Ok(StoryPage {
        id: raw.id.clone(),
        title: raw.title.clone(),
        swipeable: raw.swipeable,
        layer_ids: raw.layer_ids.clone(),
        property: resolver.resolve(raw.property.as_ref(), None, None)?,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use strata_core::property::{Field, PropertyGroup};
    use strata_core::schema::{LocalizedText, SchemaField, SchemaGroup};
    use strata_core::value::ValueType;
    use strata_core::{DatasetTables, ExtensionCatalog, PropertySchema, Value};

    fn catalog() -> ExtensionCatalog {
        let mut catalog = ExtensionCatalog::new();
        let mut title = SchemaField::new("title", ValueType::String);
        title.title = LocalizedText::new("en", "Title");
        catalog.add_schema(PropertySchema {
            id: "builtin/textStoryBlock".into(),
            groups: vec![SchemaGroup {
                id: "default".into(),
                is_list: false,
                title: LocalizedText::default(),
                fields: vec![title],
            }],
        });
        catalog
    }

    fn block(id: &str, title: &str) -> RawStoryBlock {
        RawStoryBlock {
            id: BlockId::new(id),
            plugin_id: "builtin".into(),
            extension_id: "textStoryBlock".into(),
            property: Some(PropertyInstance::new(format!("p-{id}"), "builtin/textStoryBlock").with_group(
                PropertyGroup::new(format!("g-{id}"), "default").with_field(Field::new("title", "STRING", title)),
            )),
        }
    }

    #[test]
    fn story_properties_are_enriched_and_ordered() {
        let catalog = catalog();
        let datasets = DatasetTables::new();
        let config = EngineConfig::default();
        let resolver = PropertyResolver::new(&catalog, &datasets, &config);

        let raw = RawStory {
            id: StoryId::new("s1"),
            title: "Tour".into(),
            pages: vec![RawStoryPage {
                id: PageId::new("page1"),
                title: "First".into(),
                swipeable: true,
                layer_ids: vec![LayerId::new("l1")],
                property: None,
                blocks: vec![block("b2", "second"), block("b1", "first")],
            }],
        };

        let story = compose_story(&raw, &resolver).unwrap();
        let page = &story.pages[0];
        assert!(page.property.is_none());
        let ids: Vec<&str> = page.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b1"]);

        let json = page.blocks[0].property.as_ref().unwrap().to_json();
        assert_eq!(json["default"]["title"]["value"], "second");
        assert_eq!(json["default"]["title"]["title"], "Title");
        assert_eq!(
            page.blocks[1].property.as_ref().unwrap().value("default", "title"),
            Some(&Value::from("first"))
        );
        // The caller's resolver keeps its own detail.
        assert_eq!(resolver.detail(), Detail::Plain);
    }
}
