//! The two installable unit kinds and the source formats they are written in.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static LOCAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

/// Whether `name` can be used as a local file name for an entity.
pub fn is_valid_name(name: &str) -> bool {
    LOCAL_NAME.is_match(name)
}

/// Component or util. Both are handled by the same logic, parameterized by
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Component,
    Util,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Component => "component",
            EntityKind::Util => "util",
        }
    }

    /// Extension of the entity's source file inside a registry.
    pub fn registry_extension(&self) -> &'static str {
        match self {
            EntityKind::Component => "tsx",
            EntityKind::Util => "ts",
        }
    }

    /// Extension of the entity's file inside a project of the given format.
    pub fn project_extension(&self, format: SourceFormat) -> &'static str {
        match (self, format) {
            (EntityKind::Component, SourceFormat::Jsx) => "jsx",
            (EntityKind::Util, SourceFormat::Jsx) => "js",
            (kind, _) => kind.registry_extension(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Source format a project is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Tsx,
    Jsx,
    #[serde(other)]
    Unknown,
}

impl SourceFormat {
    pub fn is_typescript(&self) -> bool {
        matches!(self, SourceFormat::Tsx)
    }
}

impl Default for SourceFormat {
    fn default() -> Self {
        SourceFormat::Tsx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_follow_format() {
        assert_eq!(EntityKind::Component.project_extension(SourceFormat::Tsx), "tsx");
        assert_eq!(EntityKind::Component.project_extension(SourceFormat::Jsx), "jsx");
        assert_eq!(EntityKind::Util.project_extension(SourceFormat::Tsx), "ts");
        assert_eq!(EntityKind::Util.project_extension(SourceFormat::Jsx), "js");
    }

    #[test]
    fn unknown_format_parses() {
        let format: SourceFormat = serde_json::from_str("\"vue\"").unwrap();
        assert_eq!(format, SourceFormat::Unknown);
        let format: SourceFormat = serde_json::from_str("\"jsx\"").unwrap();
        assert_eq!(format, SourceFormat::Jsx);
    }

    #[test]
    fn names_must_be_file_safe() {
        assert!(is_valid_name("fancy-button"));
        assert!(is_valid_name("au.button_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("-button"));
        assert!(!is_valid_name("ui/button"));
        assert!(!is_valid_name("my button"));
    }
}
