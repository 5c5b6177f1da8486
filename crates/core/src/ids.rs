use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ids are minted server-side as opaque strings. `generate` mints a local
/// UUIDv7 id for records built outside the API (fixtures, previews).
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let short: String = self.0.chars().take(8).collect();
                write!(f, "{}({})", stringify!($name), short)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(SchemaId);
string_id!(PropertyId);
string_id!(ItemId);
string_id!(LayerId);
string_id!(WidgetId);
string_id!(BlockId);
string_id!(StoryId);
string_id!(PageId);
string_id!(SceneId);
string_id!(DatasetSchemaId);
string_id!(DatasetFieldId);
string_id!(DatasetRowId);

/// Identifies a plugin extension as `plugin/extension`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionKey {
    pub plugin_id: String,
    pub extension_id: String,
}

impl ExtensionKey {
    pub fn new(plugin_id: impl Into<String>, extension_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            extension_id: extension_id.into(),
        }
    }

    /// Parses `plugin/extension`. The plugin id may not contain a slash.
    pub fn parse(key: &str) -> Option<Self> {
        let (plugin_id, extension_id) = key.split_once('/')?;
        if plugin_id.is_empty() || extension_id.is_empty() {
            return None;
        }
        Some(Self::new(plugin_id, extension_id))
    }
}

impl fmt::Debug for ExtensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtensionKey({}/{})", self.plugin_id, self.extension_id)
    }
}

impl fmt::Display for ExtensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.plugin_id, self.extension_id)
    }
}
