//! Per-entity source pipeline: template expansion, dependency scan, format
//! conversion, formatting.

use crate::entity::SourceFormat;
use crate::toolchain::{Toolchain, COMPONENTS_PLACEHOLDER, UTILS_PLACEHOLDER};
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

static USE_CLIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*["']use client["'];?[ \t]*(?:\r?\n)*"#).expect("valid regex")
});

/// Output of the pipeline. Dependency lists hold registry ids, the content
/// still references them through placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub content: String,
    pub component_deps: Vec<String>,
    pub util_deps: Vec<String>,
    pub packages: Vec<String>,
}

/// Drop a leading `"use client"` directive unless the project uses server
/// components.
pub fn expand_template(source: &str, server_components: bool) -> String {
    if server_components {
        return source.to_string();
    }
    USE_CLIENT.replace(source, "").into_owned()
}

pub async fn transform(
    toolchain: &Toolchain,
    source: &str,
    format: SourceFormat,
    server_components: bool,
) -> Result<Transformed> {
    let expanded = expand_template(source, server_components);

    let component_deps = toolchain
        .scanner
        .placeholder_imports(&expanded, COMPONENTS_PLACEHOLDER, true);
    let util_deps = toolchain
        .scanner
        .placeholder_imports(&expanded, UTILS_PLACEHOLDER, true);
    let packages = toolchain.scanner.imports(&expanded, &[]);

    let converted = if format.is_typescript() {
        expanded
    } else {
        toolchain
            .formatter
            .convert_to_js(&expanded)
            .await
            .context("Failed to convert to JavaScript")?
    };
    let content = toolchain
        .formatter
        .format(&converted, format.is_typescript())
        .await
        .context("Failed to format source")?;

    Ok(Transformed {
        content,
        component_deps,
        util_deps,
        packages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{NodePackageManager, PlainFormatter, RegexImportScanner};
    use pretty_assertions::assert_eq;

    fn toolchain() -> Toolchain {
        Toolchain::new(
            Box::new(PlainFormatter),
            Box::new(RegexImportScanner),
            Box::new(NodePackageManager),
        )
    }

    #[test]
    fn use_client_follows_server_components() {
        let source = "\"use client\";\n\nimport x from \"y\";\n";
        assert_eq!(expand_template(source, true), source);
        assert_eq!(expand_template(source, false), "import x from \"y\";\n");
        assert_eq!(expand_template("import x from \"y\";\n", false), "import x from \"y\";\n");
    }

    #[tokio::test]
    async fn collects_dependencies_and_packages() {
        let source = "'use client'\nimport { cn } from \"$utils/cn\";\nimport { Icon } from \"$components/icon\";\nimport { cva } from \"class-variance-authority\";\nexport const Button = () => null;";
        let out = transform(&toolchain(), source, SourceFormat::Tsx, false)
            .await
            .unwrap();

        assert_eq!(out.component_deps, vec!["icon"]);
        assert_eq!(out.util_deps, vec!["cn"]);
        assert_eq!(out.packages, vec!["class-variance-authority"]);
        assert!(out.content.starts_with("import { cn }"));
        assert!(out.content.ends_with("null;\n"));
    }
}
