//! Registry access: manifests and entity sources, remote or local.
//!
//! Every file read from a registry goes through that registry's
//! `RegistryCache` first, so a manifest or source is fetched at most once per
//! cache lifetime. Fetch failures never propagate as errors from the public
//! getters: callers get `None` and a logged warning and decide what to skip.

pub mod error;
pub mod manifest;
pub mod reference;

use crate::cache::{normalize_key, RegistryCache};
use crate::decision::Decider;
use crate::entity::EntityKind;
use crate::product::ProductConfig;
use anyhow::Result;
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

pub use error::{ManifestError, RemoteError};
pub use manifest::{Environment, ManifestEntry, RegistryManifest, RegistryPaths, MANIFEST_FILE};
pub use reference::{format_remote_url, LocationKind, RemoteLocation};

/// Registry client with per-registry caches and session state.
pub struct Remote {
    client: reqwest::Client,
    cache_root: PathBuf,
    caches: HashMap<String, RegistryCache>,
    manifests: HashMap<String, RegistryManifest>,
    declined: HashSet<String>,
    default_registry: Option<String>,
    ignore_dev_warning: bool,
}

impl Remote {
    /// Create a client caching under `cache_root`, sending `headers` with
    /// every HTTP request.
    pub fn new(cache_root: PathBuf, user_agent: &str, headers: &[(String, String)]) -> Self {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    header_map.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "ignoring invalid registry header"),
            }
        }

        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .default_headers(header_map)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache_root,
            caches: HashMap::new(),
            manifests: HashMap::new(),
            declined: HashSet::new(),
            default_registry: None,
            ignore_dev_warning: false,
        }
    }

    /// Create a client from a product config
    pub fn from_config<C: ProductConfig>(config: &C) -> Self {
        Self::new(
            config.cache_dir(),
            config.user_agent(),
            &config.registry_headers(),
        )
    }

    /// Registry used when a getter is called without a reference.
    pub fn set_default_registry(&mut self, reference: Option<String>) {
        self.default_registry = reference;
    }

    /// Stop asking about development registries for the rest of the session.
    pub fn set_ignore_dev_warning(&mut self, ignore: bool) {
        self.ignore_dev_warning = ignore;
    }

    pub fn ignores_dev_warning(&self) -> bool {
        self.ignore_dev_warning
    }

    fn cache(&mut self, reference: &str) -> &mut RegistryCache {
        let root = &self.cache_root;
        self.caches
            .entry(reference.to_string())
            .or_insert_with(|| RegistryCache::open(root, reference))
    }

    /// Read one resolved location.
    async fn fetch_text(
        client: &reqwest::Client,
        location: &RemoteLocation,
    ) -> std::result::Result<String, RemoteError> {
        tracing::debug!(url = %location.url, kind = ?location.kind, "fetching registry file");
        match location.kind {
            LocationKind::Local => tokio::fs::read_to_string(&location.url)
                .await
                .map_err(|source| RemoteError::Io {
                    path: location.url.clone(),
                    source,
                }),
            LocationKind::Url => {
                let url = location.url.clone();
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|source| RemoteError::Http {
                        url: url.clone(),
                        source,
                    })?;

                match response.status().as_u16() {
                    401 => return Err(RemoteError::Unauthorized { url }),
                    404 => return Err(RemoteError::NotFound { url }),
                    _ if !response.status().is_success() => {
                        return Err(RemoteError::Status {
                            url,
                            status: response.status().as_u16(),
                        })
                    }
                    _ => {}
                }

                response
                    .text()
                    .await
                    .map_err(|source| RemoteError::Http { url, source })
            }
        }
    }

    /// Cache-or-fetch one file of a registry.
    async fn cached_fetch(
        &mut self,
        reference: &str,
        segments: &[&str],
    ) -> std::result::Result<String, RemoteError> {
        if let Some(hit) = self.cache(reference).get_file(segments) {
            return Ok(hit.to_string());
        }

        let location = format_remote_url(reference, &normalize_key(segments));
        if location.is_empty() {
            return Err(RemoteError::InvalidReference(reference.to_string()));
        }
        let text = Self::fetch_text(&self.client, &location).await?;

        if let Err(e) = self.cache(reference).add_file(segments, &text) {
            tracing::warn!(registry = reference, error = %e, "failed to persist registry cache");
        }
        Ok(text)
    }

    /// Fetch the manifests of all given registries concurrently, ahead of
    /// entity processing. Results land in the caches; validation happens on
    /// the first `get_remote_config` call per registry.
    pub async fn prefetch_configs(&mut self, references: &[String]) {
        let mut pending = Vec::new();
        for reference in references {
            if self.manifests.contains_key(reference)
                || pending.iter().any(|(r, _): &(String, RemoteLocation)| r == reference)
                || self.cache(reference).get_file(&[MANIFEST_FILE]).is_some()
            {
                continue;
            }
            let location = format_remote_url(reference, MANIFEST_FILE);
            if !location.is_empty() {
                pending.push((reference.clone(), location));
            }
        }
        if pending.is_empty() {
            return;
        }

        let client = &self.client;
        let results = join_all(pending.into_iter().map(|(reference, location)| async move {
            let result = Self::fetch_text(client, &location).await;
            (reference, result)
        }))
        .await;

        for (reference, result) in results {
            match result {
                Ok(text) => {
                    if let Err(e) = self.cache(&reference).add_file(&[MANIFEST_FILE], &text) {
                        tracing::warn!(registry = %reference, error = %e, "failed to persist registry cache");
                    }
                }
                Err(e) => tracing::debug!(registry = %reference, error = %e, "manifest prefetch failed"),
            }
        }
    }

    /// Fetch and validate a registry manifest.
    ///
    /// With `confirm` given, a non-production registry must be accepted by the
    /// decider unless the dev warning is being ignored; accepting once sets the
    /// sticky ignore flag. Returns `Ok(None)` on any fetch or validation
    /// failure and on decline. `Err` only carries a decider cancellation.
    pub async fn get_remote_config(
        &mut self,
        reference: Option<&str>,
        confirm: Option<&mut dyn Decider>,
        silent: bool,
    ) -> Result<Option<RegistryManifest>> {
        let Some(reference) = reference
            .map(str::to_string)
            .or_else(|| self.default_registry.clone())
        else {
            log_failure(silent, "<none>", "no registry configured");
            return Ok(None);
        };

        if self.declined.contains(&reference) {
            return Ok(None);
        }

        let manifest = match self.manifests.get(&reference) {
            Some(manifest) => manifest.clone(),
            None => {
                let parsed = match self.cached_fetch(&reference, &[MANIFEST_FILE]).await {
                    Ok(text) => RegistryManifest::parse(&text).map_err(RemoteError::from),
                    Err(e) => Err(e),
                };
                match parsed {
                    Ok(manifest) => {
                        self.manifests.insert(reference.clone(), manifest.clone());
                        manifest
                    }
                    Err(e) => {
                        log_failure(silent, &reference, &describe(&e));
                        return Ok(None);
                    }
                }
            }
        };

        if !manifest.is_production() && !self.ignore_dev_warning {
            if let Some(decider) = confirm {
                if decider.confirm_environment(&reference, &manifest)? {
                    self.ignore_dev_warning = true;
                } else {
                    self.declined.insert(reference);
                    return Ok(None);
                }
            }
        }

        Ok(Some(manifest))
    }

    /// Source text of a component published by `reference`.
    pub async fn get_remote_component(&mut self, id: &str, reference: &str) -> Option<String> {
        self.get_remote_entity(EntityKind::Component, id, reference).await
    }

    /// Source text of a util published by `reference`.
    pub async fn get_remote_util(&mut self, id: &str, reference: &str) -> Option<String> {
        self.get_remote_entity(EntityKind::Util, id, reference).await
    }

    pub async fn get_remote_entity(
        &mut self,
        kind: EntityKind,
        id: &str,
        reference: &str,
    ) -> Option<String> {
        let manifest = self
            .get_remote_config(Some(reference), None, true)
            .await
            .ok()
            .flatten()?;

        if manifest.entry(kind, id).is_none() {
            tracing::warn!(registry = reference, kind = %kind, id, "not published by registry");
            return None;
        }

        let file_name = format!("{}.{}", id, kind.registry_extension());
        let directory = manifest.path_for(kind).to_string();
        match self.cached_fetch(reference, &[&directory, &file_name]).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(registry = reference, kind = %kind, id, "{}", describe(&e));
                None
            }
        }
    }
}

fn log_failure(silent: bool, reference: &str, message: &str) {
    if silent {
        tracing::debug!(registry = reference, "{}", message);
    } else {
        tracing::warn!(registry = reference, "{}", message);
    }
}

/// User-facing text for a fetch failure. Only 401 and 404 get dedicated
/// wording.
pub fn describe(error: &RemoteError) -> String {
    match error {
        RemoteError::Unauthorized { url } => {
            format!("access denied to {} (check your registry token)", url)
        }
        RemoteError::NotFound { url } => format!("{} does not exist", url),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{ConflictResolution, NameConflict, OrphanCandidate, OverwriteRequest};
    use crate::components::Overview;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MANIFEST: &str = r#"{
        "version": 1,
        "name": "Acme UI",
        "environment": "production",
        "paths": { "components": "src/components", "utils": "src/utils" },
        "components": { "button": { "version": "1.0.0" } },
        "utils": { "cn": { "version": "0.1.0" } }
    }"#;

    struct Answer(bool, usize);

    impl Decider for Answer {
        fn confirm_environment(&mut self, _: &str, _: &RegistryManifest) -> Result<bool> {
            self.1 += 1;
            Ok(self.0)
        }
        fn confirm_overwrite(&mut self, _: &OverwriteRequest) -> Result<bool> {
            Ok(false)
        }
        fn resolve_conflict(&mut self, _: &NameConflict) -> Result<ConflictResolution> {
            Ok(ConflictResolution::Skip)
        }
        fn confirm_overview(&mut self, _: &Overview) -> Result<bool> {
            Ok(true)
        }
        fn select_orphans(&mut self, _: &[OrphanCandidate]) -> Result<Vec<usize>> {
            Ok(Vec::new())
        }
    }

    fn local_registry(manifest: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/components")).unwrap();
        std::fs::create_dir_all(dir.path().join("src/utils")).unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), manifest).unwrap();
        std::fs::write(
            dir.path().join("src/components/button.tsx"),
            "export const Button = () => null;\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("src/utils/cn.ts"), "export const cn = 1;\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_local_registry_and_caches() {
        let registry = local_registry(MANIFEST);
        let cache = tempfile::tempdir().unwrap();
        let reference = registry.path().to_string_lossy().to_string();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);

        let manifest = remote
            .get_remote_config(Some(reference.as_str()), None, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manifest.name, "Acme UI");

        let source = remote.get_remote_component("button", &reference).await;
        assert_eq!(source.as_deref(), Some("export const Button = () => null;\n"));

        // Served from cache after the registry file disappears.
        std::fs::remove_file(registry.path().join("src/components/button.tsx")).unwrap();
        let mut fresh_session = Remote::new(cache.path().to_path_buf(), "test", &[]);
        let cached = fresh_session.get_remote_component("button", &reference).await;
        assert_eq!(cached.as_deref(), Some("export const Button = () => null;\n"));
    }

    #[tokio::test]
    async fn unknown_ids_and_missing_files_are_none() {
        let registry = local_registry(MANIFEST);
        let cache = tempfile::tempdir().unwrap();
        let reference = registry.path().to_string_lossy().to_string();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);

        assert!(remote.get_remote_component("dialog", &reference).await.is_none());
        std::fs::remove_file(registry.path().join("src/utils/cn.ts")).unwrap();
        assert!(remote.get_remote_util("cn", &reference).await.is_none());
    }

    #[tokio::test]
    async fn invalid_manifest_is_none() {
        let registry = local_registry(r#"{"paths": {"components": "c", "utils": "u"}}"#);
        let cache = tempfile::tempdir().unwrap();
        let reference = registry.path().to_string_lossy().to_string();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);

        assert!(remote
            .get_remote_config(Some(reference.as_str()), None, true)
            .await
            .unwrap()
            .is_none());
        assert!(remote
            .get_remote_config(Some("no such shape"), None, true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn default_registry_is_used_without_reference() {
        let registry = local_registry(MANIFEST);
        let cache = tempfile::tempdir().unwrap();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);
        assert!(remote.get_remote_config(None, None, true).await.unwrap().is_none());

        remote.set_default_registry(Some(registry.path().to_string_lossy().to_string()));
        assert!(remote.get_remote_config(None, None, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn development_registry_needs_confirmation_once() {
        let registry = local_registry(&MANIFEST.replace("production", "development"));
        let cache = tempfile::tempdir().unwrap();
        let reference = registry.path().to_string_lossy().to_string();

        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);
        let mut decline = Answer(false, 0);
        let declined = remote
            .get_remote_config(Some(reference.as_str()), Some(&mut decline), false)
            .await
            .unwrap();
        assert!(declined.is_none());
        // Declined registries stay declined without asking again.
        let again = remote
            .get_remote_config(Some(reference.as_str()), Some(&mut decline), false)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(decline.1, 1);

        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);
        let mut accept = Answer(true, 0);
        for _ in 0..2 {
            let accepted = remote
                .get_remote_config(Some(reference.as_str()), Some(&mut accept), false)
                .await
                .unwrap();
            assert!(accepted.is_some());
        }
        assert_eq!(accept.1, 1);
        assert!(remote.ignores_dev_warning());
    }

    #[tokio::test]
    async fn fetches_over_http_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/registry.json"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/src/components/button.tsx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("export {}\n"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = tempfile::tempdir().unwrap();
        let headers = vec![("Authorization".to_string(), "Bearer secret".to_string())];
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &headers);
        let reference = server.uri();

        for _ in 0..2 {
            let source = remote.get_remote_component("button", &reference).await;
            assert_eq!(source.as_deref(), Some("export {}\n"));
        }
    }

    #[tokio::test]
    async fn http_errors_are_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/registry.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/src/components/button.tsx"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let cache = tempfile::tempdir().unwrap();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);
        assert!(remote
            .get_remote_component("button", &server.uri())
            .await
            .is_none());
        assert!(remote.get_remote_util("cn", &server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn prefetch_fills_caches_for_each_registry() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        for server in [&first, &second] {
            Mock::given(method("GET"))
                .and(path("/registry.json"))
                .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
                .expect(1)
                .mount(server)
                .await;
        }

        let cache = tempfile::tempdir().unwrap();
        let mut remote = Remote::new(cache.path().to_path_buf(), "test", &[]);
        let references = vec![first.uri(), second.uri(), first.uri()];
        remote.prefetch_configs(&references).await;

        for reference in &references {
            assert!(remote
                .get_remote_config(Some(reference.as_str()), None, true)
                .await
                .unwrap()
                .is_some());
        }
    }

    #[test]
    fn describes_auth_and_missing_distinctly() {
        let unauthorized = describe(&RemoteError::Unauthorized {
            url: "u".to_string(),
        });
        let missing = describe(&RemoteError::NotFound {
            url: "u".to_string(),
        });
        assert!(unauthorized.contains("access denied"));
        assert!(missing.contains("does not exist"));
    }
}
