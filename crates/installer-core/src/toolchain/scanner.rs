//! Regex-based import scanning.
//!
//! Only module specifiers in `import ... from`, `export ... from`, bare
//! `import "x"`, dynamic `import("x")` and `require("x")` are considered.
//! Specifiers built at runtime are invisible to the scanner.

use super::ImportScanner;
use regex::Regex;
use std::sync::LazyLock;

static SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bfrom\s+|\bimport\s*\(?\s*|\brequire\s*\(\s*)["']([^"'\n]+)["']"#)
        .expect("valid regex")
});

const SOURCE_EXTENSIONS: &[&str] = &[".tsx", ".ts", ".jsx", ".js"];

/// Default `ImportScanner`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexImportScanner;

impl RegexImportScanner {
    fn specifiers(code: &str) -> impl Iterator<Item = &str> {
        SPECIFIER
            .captures_iter(code)
            .filter_map(|captures| captures.get(1))
            .map(|m| m.as_str().trim())
    }
}

impl ImportScanner for RegexImportScanner {
    fn imports(&self, code: &str, local_aliases: &[&str]) -> Vec<String> {
        let mut packages = Vec::new();
        for specifier in Self::specifiers(code) {
            if is_under_alias(specifier, local_aliases) {
                continue;
            }
            if let Some(package) = package_name(specifier) {
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
        }
        packages
    }

    fn placeholder_imports(&self, code: &str, alias_path: &str, as_ids: bool) -> Vec<String> {
        let prefix = format!("{}/", alias_path.trim_end_matches('/'));
        let mut found = Vec::new();
        for specifier in Self::specifiers(code) {
            let Some(rest) = specifier.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let item = if as_ids {
                strip_source_extension(rest).to_string()
            } else {
                specifier.to_string()
            };
            if !found.contains(&item) {
                found.push(item);
            }
        }
        found
    }
}

/// npm package a specifier resolves to, `None` for relative, aliased,
/// placeholder and builtin specifiers.
pub fn package_name(specifier: &str) -> Option<String> {
    const LOCAL_PREFIXES: &[&str] = &[".", "/", "$", "@/", "~/", "#", "node:"];
    if specifier.is_empty() || LOCAL_PREFIXES.iter().any(|p| specifier.starts_with(p)) {
        return None;
    }

    let mut parts = specifier.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

fn is_under_alias(specifier: &str, aliases: &[&str]) -> bool {
    aliases.iter().any(|alias| {
        let alias = alias.trim_end_matches('/');
        !alias.is_empty()
            && specifier
                .strip_prefix(alias)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

fn strip_source_extension(name: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
"use client";
import * as React from "react";
import { cva } from 'class-variance-authority';
import { Slot } from "@radix-ui/react-slot/dist";
import { cn } from "$utils/cn";
import { Icon } from "$components/icon.tsx";
import "./button.css";
export { thing } from "$components/icon";
const lazy = import("framer-motion");
const fs = require("node:fs");
import type { Props } from "@/types";
"#;

    #[test]
    fn collects_external_packages_once() {
        let packages = RegexImportScanner.imports(SOURCE, &[]);
        assert_eq!(
            packages,
            vec![
                "react",
                "class-variance-authority",
                "@radix-ui/react-slot",
                "framer-motion"
            ]
        );
    }

    #[test]
    fn collects_placeholder_ids() {
        let scanner = RegexImportScanner;
        assert_eq!(scanner.placeholder_imports(SOURCE, "$components", true), vec!["icon"]);
        assert_eq!(scanner.placeholder_imports(SOURCE, "$utils", true), vec!["cn"]);
        assert_eq!(
            scanner.placeholder_imports(SOURCE, "$components", false),
            vec!["$components/icon.tsx", "$components/icon"]
        );
    }

    #[test]
    fn collects_local_alias_names() {
        let code = "import { Button } from \"@/components/ui/button\";\nimport { cn } from \"@/lib/cn\";\n";
        let scanner = RegexImportScanner;
        assert_eq!(
            scanner.placeholder_imports(code, "@/components/ui/", true),
            vec!["button"]
        );
        assert_eq!(scanner.placeholder_imports(code, "@/lib", true), vec!["cn"]);
        assert!(scanner.placeholder_imports(code, "@/hooks", true).is_empty());
    }

    #[test]
    fn bare_aliases_are_not_packages() {
        let code = "import { Button } from \"components/ui/button\";\nimport { cn } from \"lib/cn\";\nimport { clsx } from \"clsx\";\nimport { parse } from \"library\";\n";
        let scanner = RegexImportScanner;
        assert_eq!(
            scanner.imports(code, &["components/ui/", "lib"]),
            vec!["clsx", "library"]
        );
        assert_eq!(
            scanner.imports(code, &[]),
            vec!["components", "lib", "clsx", "library"]
        );
    }

    #[test]
    fn package_names() {
        assert_eq!(package_name("lodash/debounce").as_deref(), Some("lodash"));
        assert_eq!(package_name("@scope/pkg/sub").as_deref(), Some("@scope/pkg"));
        assert_eq!(package_name("@scope"), None);
        assert_eq!(package_name("../x"), None);
        assert_eq!(package_name("#internal"), None);
    }
}
