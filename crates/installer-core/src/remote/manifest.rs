//! Registry manifest types and validation

use super::error::ManifestError;
use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known manifest file at the root of every registry
pub const MANIFEST_FILE: &str = "registry.json";

/// Highest manifest schema version this library understands
pub const SUPPORTED_MANIFEST_VERSION: u64 = 1;

/// Whether a registry is meant for general use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Directories inside the registry holding component and util sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPaths {
    pub components: String,
    pub utils: String,
}

/// One published entity. Accepts `{ "version": "1.0.0" }` or `"1.0.0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry")]
pub struct ManifestEntry {
    pub version: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Detailed { version: String },
    Bare(String),
}

impl From<RawEntry> for ManifestEntry {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Detailed { version } | RawEntry::Bare(version) => Self { version },
        }
    }
}

/// Manifest as found on the wire, before validation
#[derive(Debug, Deserialize)]
struct RawManifest {
    version: Option<u64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    name: String,
    #[serde(default)]
    environment: Environment,
    #[serde(default)]
    paths: RawPaths,
    #[serde(default)]
    components: BTreeMap<String, ManifestEntry>,
    #[serde(default)]
    utils: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaths {
    components: Option<String>,
    utils: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// A validated registry manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryManifest {
    /// Manifest schema version
    pub version: u64,
    pub enabled: bool,
    /// Display name of the registry
    pub name: String,
    pub environment: Environment,
    pub paths: RegistryPaths,
    pub components: BTreeMap<String, ManifestEntry>,
    pub utils: BTreeMap<String, ManifestEntry>,
}

impl RegistryManifest {
    /// Parse and structurally validate manifest text.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest =
            serde_json::from_str(content).map_err(|e| ManifestError::Malformed(e.to_string()))?;

        let version = raw.version.ok_or(ManifestError::MissingVersion)?;
        if version > SUPPORTED_MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_MANIFEST_VERSION,
            });
        }

        let components = non_empty(raw.paths.components).ok_or(ManifestError::MissingPath("components"))?;
        let utils = non_empty(raw.paths.utils).ok_or(ManifestError::MissingPath("utils"))?;

        if !raw.enabled {
            return Err(ManifestError::Disabled(raw.name));
        }

        Ok(Self {
            version,
            enabled: raw.enabled,
            name: raw.name,
            environment: raw.environment,
            paths: RegistryPaths { components, utils },
            components: raw.components,
            utils: raw.utils,
        })
    }

    /// Look up a published entity.
    pub fn entry(&self, kind: EntityKind, id: &str) -> Option<&ManifestEntry> {
        match kind {
            EntityKind::Component => self.components.get(id),
            EntityKind::Util => self.utils.get(id),
        }
    }

    /// Registry directory holding entities of `kind`.
    pub fn path_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Component => &self.paths.components,
            EntityKind::Util => &self.paths.utils,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Short lowercase tag for the registry, used to prefix local names when
    /// two registries publish the same id: the initials of a multi-word name
    /// ("Acme UI" -> "au"), or the first three characters of a single word.
    pub fn abbreviation(&self, fallback: &str) -> String {
        let source = if self.name.trim().is_empty() {
            fallback
        } else {
            self.name.as_str()
        };
        let words: Vec<&str> = source
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let abbr: String = match words.as_slice() {
            [] => "reg".to_string(),
            [single] => single.chars().take(3).collect(),
            many => many.iter().filter_map(|w| w.chars().next()).collect(),
        };
        abbr.to_ascii_lowercase()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "version": 1,
        "name": "Acme UI",
        "environment": "production",
        "paths": { "components": "src/components", "utils": "src/utils" },
        "components": { "button": { "version": "1.0.0" } },
        "utils": { "cn": "0.2.0" }
    }"#;

    #[test]
    fn parses_both_entry_shapes() {
        let manifest = RegistryManifest::parse(VALID).unwrap();
        assert_eq!(manifest.entry(EntityKind::Component, "button").unwrap().version, "1.0.0");
        assert_eq!(manifest.entry(EntityKind::Util, "cn").unwrap().version, "0.2.0");
        assert!(manifest.entry(EntityKind::Util, "button").is_none());
        assert!(manifest.is_production());
        assert!(manifest.enabled);
        assert_eq!(manifest.path_for(EntityKind::Util), "src/utils");
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = RegistryManifest::parse(r#"{"paths": {"components": "c", "utils": "u"}}"#)
            .unwrap_err();
        assert_eq!(err, ManifestError::MissingVersion);
    }

    #[test]
    fn missing_paths_are_rejected() {
        let err = RegistryManifest::parse(r#"{"version": 1, "paths": {"components": "c"}}"#)
            .unwrap_err();
        assert_eq!(err, ManifestError::MissingPath("utils"));
        let err = RegistryManifest::parse(r#"{"version": 1}"#).unwrap_err();
        assert_eq!(err, ManifestError::MissingPath("components"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let err = RegistryManifest::parse(
            r#"{"version": 9, "paths": {"components": "c", "utils": "u"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn disabled_registry_is_rejected() {
        let err = RegistryManifest::parse(
            r#"{"version": 1, "name": "old", "enabled": false, "paths": {"components": "c", "utils": "u"}}"#,
        )
        .unwrap_err();
        assert_eq!(err, ManifestError::Disabled("old".to_string()));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            RegistryManifest::parse("{").unwrap_err(),
            ManifestError::Malformed(_)
        ));
    }

    #[test]
    fn abbreviations() {
        let mut manifest = RegistryManifest::parse(VALID).unwrap();
        assert_eq!(manifest.abbreviation("x"), "au");
        manifest.name = "Shadow".to_string();
        assert_eq!(manifest.abbreviation("x"), "sha");
        manifest.name = String::new();
        assert_eq!(manifest.abbreviation("acme/ui@main"), "aum");
    }
}
