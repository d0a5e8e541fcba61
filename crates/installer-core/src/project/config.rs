//! Project config file types

use crate::entity::{EntityKind, SourceFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted project descriptor.
///
/// `components` and `utils` are keyed by local name (the file stem on disk);
/// each value records which registry entity the file came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// CLI version that last wrote this file
    #[serde(default)]
    pub version: String,

    /// Registry references, first one is the default
    #[serde(default)]
    pub registries: Vec<String>,

    /// Source format for installed files; `None` when absent from the file
    #[serde(default)]
    pub format: Option<SourceFormat>,

    /// Whether the project uses React server components
    #[serde(default)]
    pub server_components: bool,

    /// Path to the tailwind config, relative to the project root
    #[serde(default)]
    pub tailwind_config: String,

    #[serde(default)]
    pub palette: BTreeMap<String, PaletteColor>,

    #[serde(default)]
    pub backgrounds: Backgrounds,

    #[serde(default)]
    pub paths: AliasPaths,

    #[serde(default)]
    pub components: BTreeMap<String, InstalledEntity>,

    #[serde(default)]
    pub utils: BTreeMap<String, InstalledEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backgrounds {
    #[serde(default)]
    pub dark: String,
    #[serde(default)]
    pub light: String,
}

/// Import aliases for the directories installed files are written to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasPaths {
    #[serde(default)]
    pub components: String,
    #[serde(default)]
    pub utils: String,
}

/// What the config remembers about one installed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledEntity {
    pub registry: String,
    pub id: String,
    pub version: String,
    pub hash: String,
}

impl ProjectConfig {
    pub fn entities(&self, kind: EntityKind) -> &BTreeMap<String, InstalledEntity> {
        match kind {
            EntityKind::Component => &self.components,
            EntityKind::Util => &self.utils,
        }
    }

    pub fn entities_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, InstalledEntity> {
        match kind {
            EntityKind::Component => &mut self.components,
            EntityKind::Util => &mut self.utils,
        }
    }

    pub fn alias(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Component => &self.paths.components,
            EntityKind::Util => &self.paths.utils,
        }
    }

    pub fn source_format(&self) -> SourceFormat {
        self.format.unwrap_or_default()
    }

    /// Local name an entity from `registry` is tracked under, if any.
    pub fn find_local_name(&self, kind: EntityKind, registry: &str, id: &str) -> Option<&str> {
        self.entities(kind)
            .iter()
            .find(|(_, entity)| entity.registry == registry && entity.id == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn default_registry(&self) -> Option<&str> {
        self.registries.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let config: ProjectConfig = serde_json::from_str(
            r##"{
                "version": "0.1.0",
                "registries": ["acme/ui@main"],
                "format": "tsx",
                "server_components": true,
                "tailwind_config": "tailwind.config.ts",
                "palette": { "primary": { "value": "#336699", "tag": "brand" } },
                "backgrounds": { "dark": "#000000", "light": "#ffffff" },
                "paths": { "components": "@/components/ui", "utils": "@/lib" },
                "components": {
                    "button": { "registry": "acme/ui@main", "id": "button", "version": "1.0.0", "hash": "abc" }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(config.source_format(), SourceFormat::Tsx);
        assert_eq!(config.alias(EntityKind::Util), "@/lib");
        assert_eq!(
            config.find_local_name(EntityKind::Component, "acme/ui@main", "button"),
            Some("button")
        );
        assert!(config.find_local_name(EntityKind::Component, "other@main", "button").is_none());
        assert!(config.utils.is_empty());
        assert_eq!(config.palette["primary"].tag.as_deref(), Some("brand"));
    }

    #[test]
    fn missing_format_is_none() {
        let config: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert!(config.format.is_none());
        assert_eq!(config.source_format(), SourceFormat::Tsx);
    }
}
