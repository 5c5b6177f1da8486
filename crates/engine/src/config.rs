use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::widgets::{Align, Padding};

/// How much of the schema travels with resolved values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detail {
    /// Values only; what renderers consume.
    #[default]
    Plain,
    /// Values plus ui hint, translated title/description, choices and range.
    Enriched,
}

/// Where layer property merging happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// Always merge raw original/parent instances locally.
    Client,
    /// Use a server-merged payload when the layer carries one.
    #[default]
    ServerMerged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetDefaults {
    pub align: Align,
    pub padding: Padding,
    pub gap: u32,
}

impl Default for WidgetDefaults {
    fn default() -> Self {
        Self {
            align: Align::Start,
            padding: Padding::uniform(6),
            gap: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub detail: Detail,
    pub merge_mode: MergeMode,
    /// Language used for enriched titles and descriptions.
    pub language: String,
    pub widgets: WidgetDefaults,
    /// Plugins whose extensions count as first-party.
    pub builtin_plugins: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detail: Detail::Plain,
            merge_mode: MergeMode::ServerMerged,
            language: "en".to_string(),
            widgets: WidgetDefaults::default(),
            builtin_plugins: vec!["builtin".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn from_toml(source: &str) -> Result<Self, EngineError> {
        toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_merge_mode(mut self, merge_mode: MergeMode) -> Self {
        self.merge_mode = merge_mode;
        self
    }

    pub fn is_builtin_plugin(&self, plugin_id: &str) -> bool {
        self.builtin_plugins.iter().any(|p| p == plugin_id)
    }
}
