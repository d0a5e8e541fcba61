//! Per-registry file cache.
//!
//! Every registry reference gets one JSON file under the cache root holding a
//! flat map of normalized path key to raw text content. Writes go straight to
//! disk. Entries never expire; `clear` is the only way to drop them.
//!
//! Layout:
//! ```text
//! <cache_root>/
//!   <sanitized-reference>-<hash-prefix>.json
//! ```

use crate::integrity::ContentHash;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Cached files for a single registry reference.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl RegistryCache {
    /// Open (or start) the cache for a registry reference under `root`.
    ///
    /// A corrupt cache file is discarded rather than treated as an error.
    pub fn open(root: &Path, reference: &str) -> Self {
        let path = root.join(Self::file_name(reference));
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding corrupt cache file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    /// Look up a file by its path segments.
    pub fn get_file(&self, segments: &[&str]) -> Option<&str> {
        let key = normalize_key(segments);
        let hit = self.entries.get(&key).map(String::as_str);
        tracing::debug!(key = %key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Store a file and persist the whole cache immediately.
    pub fn add_file(&mut self, segments: &[&str], content: &str) -> Result<()> {
        self.entries
            .insert(normalize_key(segments), content.to_string());
        self.persist()
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }
        let content =
            serde_json::to_string(&self.entries).context("Failed to serialize cache")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write cache file: {}", self.path.display()))
    }

    /// Remove every cache file under `root`. Returns how many were removed.
    pub fn clear(root: &Path) -> Result<usize> {
        if !root.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(root)
            .with_context(|| format!("Failed to read cache directory: {}", root.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cache file name for a reference: a readable slug plus a hash prefix so
    /// references that slug identically stay distinct.
    fn file_name(reference: &str) -> String {
        let slug: String = reference
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let slug = slug.trim_matches('_');
        let slug = &slug[..slug.len().min(64)];
        let hash = ContentHash::compute(reference.as_bytes());
        format!("{}-{}.json", slug, &hash.as_str()[..12])
    }
}

/// Join path segments into a single key with forward slashes, no empty or
/// `.` components, and no leading or trailing separator.
pub fn normalize_key(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|segment| segment.split(['/', '\\']))
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(
            normalize_key(&["src\\components\\", "button.tsx"]),
            "src/components/button.tsx"
        );
        assert_eq!(
            normalize_key(&["./src//utils/", "/cn.ts"]),
            "src/utils/cn.ts"
        );
    }

    #[test]
    fn add_and_get_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RegistryCache::open(dir.path(), "acme/ui@main");
        assert!(cache.get_file(&["components", "button.tsx"]).is_none());

        cache
            .add_file(&["components", "button.tsx"], "export {}")
            .unwrap();
        assert_eq!(
            cache.get_file(&["components/button.tsx"]),
            Some("export {}")
        );

        let reopened = RegistryCache::open(dir.path(), "acme/ui@main");
        assert_eq!(
            reopened.get_file(&["components", "button.tsx"]),
            Some("export {}")
        );
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn registries_do_not_share_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = RegistryCache::open(dir.path(), "acme/ui@main");
        first.add_file(&["registry.json"], "{}").unwrap();

        let second = RegistryCache::open(dir.path(), "acme/ui@next");
        assert!(second.is_empty());
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegistryCache::open(dir.path(), "/srv/registry");
        std::fs::write(cache.path(), "not json").unwrap();

        let reopened = RegistryCache::open(dir.path(), "/srv/registry");
        assert!(reopened.is_empty());
    }

    #[test]
    fn clear_removes_cache_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = RegistryCache::open(dir.path(), "https://example.com/r");
        cache.add_file(&["a.ts"], "a").unwrap();

        assert_eq!(RegistryCache::clear(dir.path()).unwrap(), 1);
        assert!(RegistryCache::open(dir.path(), "https://example.com/r").is_empty());
        assert_eq!(RegistryCache::clear(&dir.path().join("missing")).unwrap(), 0);
    }
}
