//! Resolve import aliases (`@/components/ui`) to directories on disk.
//!
//! Lookup order: `compilerOptions.paths` in `tsconfig.json` or
//! `jsconfig.json`, then the conventional `@/` and `~/` prefixes (mapped onto
//! `src/` when it exists), then the alias as a plain relative path.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const COMPILER_CONFIGS: &[&str] = &["tsconfig.json", "jsconfig.json"];

#[derive(Debug, Default, Deserialize)]
struct CompilerConfig {
    #[serde(default, rename = "compilerOptions")]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
struct CompilerOptions {
    #[serde(default, rename = "baseUrl")]
    base_url: Option<String>,
    #[serde(default)]
    paths: BTreeMap<String, Vec<String>>,
}

/// Resolve `alias` to an absolute directory under `root`.
pub fn resolve_alias(root: &Path, alias: &str) -> PathBuf {
    let alias = alias.trim().trim_end_matches('/');

    if let Some(resolved) = from_compiler_config(root, alias) {
        return resolved;
    }

    for prefix in ["@/", "~/"] {
        if let Some(rest) = alias.strip_prefix(prefix) {
            let src = root.join("src");
            let base = if src.is_dir() { src } else { root.to_path_buf() };
            return join_relative(&base, rest);
        }
    }

    join_relative(root, alias)
}

fn from_compiler_config(root: &Path, alias: &str) -> Option<PathBuf> {
    let config = COMPILER_CONFIGS
        .iter()
        .filter_map(|name| std::fs::read_to_string(root.join(name)).ok())
        .find_map(|content| serde_json::from_str::<CompilerConfig>(&strip_line_comments(&content)).ok())?;

    let options = config.compiler_options;
    let base = join_relative(root, options.base_url.as_deref().unwrap_or("."));

    // Longest matching pattern wins.
    let mut patterns: Vec<(&String, &Vec<String>)> = options.paths.iter().collect();
    patterns.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.len()));

    for (pattern, targets) in patterns {
        let Some(target) = targets.first() else {
            continue;
        };
        match pattern.strip_suffix('*') {
            Some(prefix) => {
                if let Some(rest) = alias.strip_prefix(prefix) {
                    return Some(join_relative(&base, &target.replacen('*', rest, 1)));
                }
                if alias == prefix.trim_end_matches('/') {
                    let target = target.trim_end_matches('*').trim_end_matches('/');
                    return Some(join_relative(&base, target));
                }
            }
            None if pattern == alias => return Some(join_relative(&base, target)),
            None => {}
        }
    }
    None
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                path.pop();
            }
            other => path.push(other),
        }
    }
    path
}

/// Drop whole-line `//` comments, which tsconfig files commonly carry.
fn strip_line_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_tsconfig_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
                // generated
                "compilerOptions": { "baseUrl": ".", "paths": { "@/*": ["./app/*"] } }
            }"#,
        )
        .unwrap();

        assert_eq!(
            resolve_alias(dir.path(), "@/components/ui"),
            dir.path().join("app").join("components").join("ui")
        );
    }

    #[test]
    fn falls_back_to_src_for_at_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        assert_eq!(
            resolve_alias(dir.path(), "@/lib"),
            dir.path().join("src").join("lib")
        );
    }

    #[test]
    fn falls_back_to_root_without_src() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_alias(dir.path(), "~/lib/"), dir.path().join("lib"));
    }

    #[test]
    fn plain_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_alias(dir.path(), "./components/ui"),
            dir.path().join("components").join("ui")
        );
    }
}
