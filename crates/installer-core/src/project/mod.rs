//! Project state: the config file plus the installed files it describes.
//!
//! `Project` owns the config for the duration of a command. The config is read
//! lazily on first use and written back in full after every mutation. Nothing
//! guards against two processes mutating the same project at once; the last
//! write wins.

pub mod alias;
pub mod config;
pub mod status;

use crate::entity::EntityKind;
use crate::integrity::ContentHash;
use crate::product::ProductConfig;
use crate::version;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

pub use config::{AliasPaths, Backgrounds, InstalledEntity, PaletteColor, ProjectConfig};
pub use status::{InstallStatus, ValidationResult};

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("valid regex")
});

const TAILWIND_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts", "cts", "mts"];

/// A consumer project rooted at a directory.
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config_path: PathBuf,
    config: Option<ProjectConfig>,
    cli_version: Option<String>,
}

impl Project {
    /// Open a project without reading anything yet.
    pub fn new(root: PathBuf, config_file_name: &str) -> Self {
        let config_path = root.join(config_file_name);
        Self {
            root,
            config_path,
            config: None,
            cli_version: None,
        }
    }

    /// Open the project for a product, stamping saves with the CLI version.
    pub fn from_config<C: ProductConfig>(product: &C, root: PathBuf, cli_version: &str) -> Self {
        Self::new(root, product.config_file_name()).with_cli_version(cli_version)
    }

    pub fn with_cli_version(mut self, cli_version: &str) -> Self {
        self.cli_version = Some(cli_version.to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Replace the in-memory config; call `save` to persist.
    pub fn set_config(&mut self, config: ProjectConfig) {
        self.config = Some(config);
    }

    /// The config, read from disk on first access.
    pub fn config(&mut self) -> Result<&mut ProjectConfig> {
        if self.config.is_none() {
            let content = std::fs::read_to_string(&self.config_path).with_context(|| {
                format!(
                    "Failed to read project config: {}",
                    self.config_path.display()
                )
            })?;
            let parsed: ProjectConfig = serde_json::from_str(&content).with_context(|| {
                format!(
                    "Failed to parse project config: {}",
                    self.config_path.display()
                )
            })?;
            self.config = Some(parsed);
        }
        self.config
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Project config is not loaded"))
    }

    /// Write the whole config back to disk.
    pub fn save(&mut self) -> Result<()> {
        let cli_version = self.cli_version.clone();
        let path = self.config_path.clone();
        let config = self.config()?;

        if let Some(cli_version) = cli_version {
            let stale = version::parse_version(&config.version)
                .map(|recorded| {
                    version::parse_version(&cli_version).is_ok_and(|cli| cli > recorded)
                })
                .unwrap_or(true);
            if stale {
                config.version = cli_version;
            }
        }

        let mut content =
            serde_json::to_string_pretty(&*config).context("Failed to serialize project config")?;
        content.push('\n');
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write project config: {}", path.display()))
    }

    /// Warning when this CLI is older than the one that wrote the config.
    pub fn compatibility_warning(&mut self, upgrade_command: &str) -> Option<String> {
        let cli_version = self.cli_version.clone()?;
        let config = self.config().ok()?;
        version::check_compatibility(&cli_version, &config.version, upgrade_command)
    }

    /// Run the precondition chain. The first failing check is returned.
    pub fn validate(&mut self) -> ValidationResult {
        if self.config.is_none() && !self.config_path.is_file() {
            return ValidationResult::ConfigurationMissing;
        }
        let root = self.root.clone();
        let config = match self.config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "project config failed to load");
                return ValidationResult::Failed;
            }
        };

        if config.paths.components.trim().is_empty() || config.paths.utils.trim().is_empty() {
            return ValidationResult::PathsNotConfigured;
        }
        match config.format {
            Some(format) if format != crate::entity::SourceFormat::Unknown => {}
            _ => return ValidationResult::FormatInvalid,
        }
        if config.registries.iter().all(|r| r.trim().is_empty()) {
            return ValidationResult::RemoteMissing;
        }

        let tailwind = root.join(&config.tailwind_config);
        if config.tailwind_config.trim().is_empty() || !tailwind.is_file() {
            return ValidationResult::TailwindConfigMissing;
        }
        let module_extension = tailwind
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| TAILWIND_EXTENSIONS.contains(&ext));
        let has_content = std::fs::read_to_string(&tailwind)
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if !module_extension || !has_content {
            return ValidationResult::TailwindConfigInvalid;
        }

        if config.palette.is_empty()
            || config
                .palette
                .values()
                .any(|color| !HEX_COLOR.is_match(color.value.trim()))
        {
            return ValidationResult::PaletteMissing;
        }
        if config.backgrounds.dark.trim().is_empty() || config.backgrounds.light.trim().is_empty() {
            return ValidationResult::BackgroundsMissing;
        }

        ValidationResult::Passed
    }

    /// Directory entities of `kind` are written to.
    pub fn entity_dir(&mut self, kind: EntityKind) -> Result<PathBuf> {
        let root = self.root.clone();
        let config = self.config()?;
        Ok(alias::resolve_alias(&root, config.alias(kind)))
    }

    /// File an entity with local name `name` lives in.
    pub fn entity_path(&mut self, kind: EntityKind, name: &str) -> Result<PathBuf> {
        let format = self.config()?.source_format();
        let dir = self.entity_dir(kind)?;
        Ok(dir.join(format!("{}.{}", name, kind.project_extension(format))))
    }

    /// Config entry for a local name.
    pub fn entry(&mut self, kind: EntityKind, name: &str) -> Result<Option<InstalledEntity>> {
        Ok(self.config()?.entities(kind).get(name).cloned())
    }

    /// Local name an entity from `registry` is tracked under, if any.
    pub fn find_local_name(
        &mut self,
        kind: EntityKind,
        registry: &str,
        id: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .config()?
            .find_local_name(kind, registry, id)
            .map(str::to_string))
    }

    /// Cross-reference the config entry for `name` with the filesystem.
    ///
    /// With `registry` given, an entry recorded for any other registry makes
    /// the name conflicting. Without it, any entry counts as ours.
    pub fn install_status(
        &mut self,
        kind: EntityKind,
        name: &str,
        registry: Option<&str>,
    ) -> Result<InstallStatus> {
        let file_exists = self.entity_path(kind, name)?.is_file();
        let entry = self.entry(kind, name)?;

        Ok(match entry {
            Some(entry) if registry.is_some_and(|r| r != entry.registry) => {
                InstallStatus::NotInstalledAndConflicting
            }
            Some(_) if file_exists => InstallStatus::FullyInstalled,
            Some(_) => InstallStatus::FileDoesNotExistInstalled,
            None if file_exists => InstallStatus::FileExistsNotInstalled,
            None => InstallStatus::NotInstalled,
        })
    }

    pub fn get_component_install_status(
        &mut self,
        name: &str,
        registry: Option<&str>,
    ) -> Result<InstallStatus> {
        self.install_status(EntityKind::Component, name, registry)
    }

    pub fn get_util_install_status(
        &mut self,
        name: &str,
        registry: Option<&str>,
    ) -> Result<InstallStatus> {
        self.install_status(EntityKind::Util, name, registry)
    }

    /// Whether the file on disk still hashes to the recorded hash.
    pub fn verify_integrity(&mut self, kind: EntityKind, name: &str) -> bool {
        let Ok(Some(entry)) = self.entry(kind, name) else {
            return false;
        };
        let Ok(path) = self.entity_path(kind, name) else {
            return false;
        };
        match std::fs::read(&path) {
            Ok(bytes) => ContentHash::matches(&entry.hash, &bytes),
            Err(_) => false,
        }
    }

    pub fn verify_component_integrity(&mut self, name: &str) -> bool {
        self.verify_integrity(EntityKind::Component, name)
    }

    pub fn verify_util_integrity(&mut self, name: &str) -> bool {
        self.verify_integrity(EntityKind::Util, name)
    }

    /// Current content of an installed file, `None` if it is missing.
    pub fn read_installed(&mut self, kind: EntityKind, name: &str) -> Result<Option<String>> {
        let path = self.entity_path(kind, name)?;
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Write an entity's file and record it. This is the only path through
    /// which installed content reaches disk.
    pub fn add_entity(
        &mut self,
        kind: EntityKind,
        name: &str,
        id: &str,
        registry: &str,
        version: &str,
        content: &str,
    ) -> Result<PathBuf> {
        let path = self.entity_path(kind, name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        let entity = InstalledEntity {
            registry: registry.to_string(),
            id: id.to_string(),
            version: version.to_string(),
            hash: ContentHash::compute(content.as_bytes()).into(),
        };
        self.config()?
            .entities_mut(kind)
            .insert(name.to_string(), entity);
        self.save()?;

        tracing::info!(kind = %kind, name, id, registry, version, path = %path.display(), "wrote entity");
        Ok(path)
    }

    pub fn add_component(
        &mut self,
        name: &str,
        id: &str,
        registry: &str,
        version: &str,
        content: &str,
    ) -> Result<PathBuf> {
        self.add_entity(EntityKind::Component, name, id, registry, version, content)
    }

    pub fn add_util(
        &mut self,
        name: &str,
        id: &str,
        registry: &str,
        version: &str,
        content: &str,
    ) -> Result<PathBuf> {
        self.add_entity(EntityKind::Util, name, id, registry, version, content)
    }

    /// Delete an entity's file (if it is a file) and its config entry.
    pub fn remove_entity(&mut self, kind: EntityKind, name: &str) -> Result<()> {
        let path = self.entity_path(kind, name)?;
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        } else if path.is_dir() {
            tracing::warn!(path = %path.display(), "entity path is a directory, leaving it in place");
        }
        self.config()?.entities_mut(kind).remove(name);
        self.save()?;
        tracing::info!(kind = %kind, name, "removed entity");
        Ok(())
    }

    pub fn remove_component(&mut self, name: &str) -> Result<()> {
        self.remove_entity(EntityKind::Component, name)
    }

    pub fn remove_util(&mut self, name: &str) -> Result<()> {
        self.remove_entity(EntityKind::Util, name)
    }

    /// Whether the recorded version is at least `remote_version`.
    pub fn is_up_to_date(&mut self, kind: EntityKind, name: &str, remote_version: &str) -> bool {
        match self.entry(kind, name) {
            Ok(Some(entry)) => version::is_up_to_date(&entry.version, remote_version),
            _ => false,
        }
    }

    pub fn is_component_up_to_date(&mut self, name: &str, remote_version: &str) -> bool {
        self.is_up_to_date(EntityKind::Component, name, remote_version)
    }

    pub fn is_util_up_to_date(&mut self, name: &str, remote_version: &str) -> bool {
        self.is_up_to_date(EntityKind::Util, name, remote_version)
    }

    /// Files in the component and util directories the config does not track.
    pub fn untracked_files(&mut self) -> Result<Vec<(EntityKind, PathBuf)>> {
        let mut untracked = Vec::new();
        for kind in [EntityKind::Component, EntityKind::Util] {
            let dir = self.entity_dir(kind)?;
            if !dir.is_dir() {
                continue;
            }
            let format = self.config()?.source_format();
            let extension = kind.project_extension(format);
            let tracked = self.config()?.entities(kind).clone();

            for entry in WalkDir::new(&dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(extension)
                {
                    continue;
                }
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                if !tracked.contains_key(stem) {
                    untracked.push((kind, path.to_path_buf()));
                }
            }
        }
        untracked.sort();
        Ok(untracked)
    }

    /// Add a registry reference. Returns false if it was already configured.
    pub fn add_registry(&mut self, reference: &str) -> Result<bool> {
        let reference = reference.trim();
        let config = self.config()?;
        if config.registries.iter().any(|r| r == reference) {
            return Ok(false);
        }
        config.registries.push(reference.to_string());
        self.save()?;
        Ok(true)
    }

    /// Remove a registry reference. Installed entities from it stay tracked.
    pub fn remove_registry(&mut self, reference: &str) -> Result<bool> {
        let config = self.config()?;
        let before = config.registries.len();
        config.registries.retain(|r| r != reference.trim());
        if config.registries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SourceFormat;
    use std::collections::BTreeMap;

    fn valid_config() -> ProjectConfig {
        let mut palette = BTreeMap::new();
        palette.insert(
            "primary".to_string(),
            PaletteColor {
                value: "#336699".to_string(),
                tag: None,
            },
        );
        ProjectConfig {
            version: "0.1.0".to_string(),
            registries: vec!["acme/ui@main".to_string()],
            format: Some(SourceFormat::Tsx),
            server_components: false,
            tailwind_config: "tailwind.config.ts".to_string(),
            palette,
            backgrounds: Backgrounds {
                dark: "#000000".to_string(),
                light: "#ffffff".to_string(),
            },
            paths: AliasPaths {
                components: "components/ui".to_string(),
                utils: "lib".to_string(),
            },
            ..Default::default()
        }
    }

    fn project_with(config: ProjectConfig) -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tailwind.config.ts"),
            "export default { content: [] }",
        )
        .unwrap();
        let mut project = Project::new(dir.path().to_path_buf(), "uikit.json");
        project.set_config(config);
        project.save().unwrap();
        let reopened = Project::new(dir.path().to_path_buf(), "uikit.json");
        (dir, reopened)
    }

    #[test]
    fn validate_passes_for_complete_config() {
        let (_dir, mut project) = project_with(valid_config());
        assert_eq!(project.validate(), ValidationResult::Passed);
    }

    #[test]
    fn validate_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::new(dir.path().to_path_buf(), "uikit.json");
        assert_eq!(project.validate(), ValidationResult::ConfigurationMissing);
    }

    #[test]
    fn validate_reports_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uikit.json"), "{ nope").unwrap();
        let mut project = Project::new(dir.path().to_path_buf(), "uikit.json");
        assert_eq!(project.validate(), ValidationResult::Failed);
    }

    #[test]
    fn validate_checks_in_order() {
        let mut config = valid_config();
        config.paths.utils.clear();
        config.registries.clear();
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::PathsNotConfigured);

        let mut config = valid_config();
        config.format = Some(SourceFormat::Unknown);
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::FormatInvalid);

        let mut config = valid_config();
        config.registries.clear();
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::RemoteMissing);

        let mut config = valid_config();
        config.tailwind_config = "missing.config.ts".to_string();
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::TailwindConfigMissing);

        let mut config = valid_config();
        config.palette.get_mut("primary").unwrap().value = "blue".to_string();
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::PaletteMissing);

        let mut config = valid_config();
        config.backgrounds.light.clear();
        let (_dir, mut project) = project_with(config);
        assert_eq!(project.validate(), ValidationResult::BackgroundsMissing);
    }

    #[test]
    fn validate_rejects_non_module_tailwind_config() {
        let mut config = valid_config();
        config.tailwind_config = "tailwind.json".to_string();
        let (dir, mut project) = project_with(config);
        std::fs::write(dir.path().join("tailwind.json"), "{}").unwrap();
        assert_eq!(project.validate(), ValidationResult::TailwindConfigInvalid);
    }

    #[test]
    fn integrity_round_trip() {
        let (dir, mut project) = project_with(valid_config());
        let path = project
            .add_component("button", "button", "acme/ui@main", "1.0.0", "export const Button = 1;\n")
            .unwrap();
        assert_eq!(path, dir.path().join("components/ui/button.tsx"));
        assert!(project.verify_component_integrity("button"));

        std::fs::write(&path, "export const Button = 2;\n").unwrap();
        assert!(!project.verify_component_integrity("button"));

        std::fs::remove_file(&path).unwrap();
        assert!(!project.verify_component_integrity("button"));
    }

    #[test]
    fn add_records_entry_and_persists() {
        let (dir, mut project) = project_with(valid_config());
        project
            .add_util("cn", "cn", "acme/ui@main", "0.2.0", "export {}\n")
            .unwrap();

        let mut reopened = Project::new(dir.path().to_path_buf(), "uikit.json");
        let entry = reopened.entry(EntityKind::Util, "cn").unwrap().unwrap();
        assert_eq!(entry.id, "cn");
        assert_eq!(entry.version, "0.2.0");
        assert_eq!(entry.hash, ContentHash::compute(b"export {}\n").to_string());
    }

    #[test]
    fn install_status_transitions() {
        let (dir, mut project) = project_with(valid_config());
        let status = |p: &mut Project, r: Option<&str>| {
            p.get_component_install_status("button", r).unwrap()
        };

        assert_eq!(status(&mut project, Some("acme/ui@main")), InstallStatus::NotInstalled);

        std::fs::create_dir_all(dir.path().join("components/ui")).unwrap();
        std::fs::write(dir.path().join("components/ui/button.tsx"), "x").unwrap();
        assert_eq!(
            status(&mut project, Some("acme/ui@main")),
            InstallStatus::FileExistsNotInstalled
        );

        project
            .add_component("button", "button", "acme/ui@main", "1.0.0", "x")
            .unwrap();
        assert_eq!(status(&mut project, Some("acme/ui@main")), InstallStatus::FullyInstalled);
        assert_eq!(status(&mut project, None), InstallStatus::FullyInstalled);
        assert_eq!(
            status(&mut project, Some("other/ui@main")),
            InstallStatus::NotInstalledAndConflicting
        );

        std::fs::remove_file(dir.path().join("components/ui/button.tsx")).unwrap();
        assert_eq!(
            status(&mut project, Some("acme/ui@main")),
            InstallStatus::FileDoesNotExistInstalled
        );
    }

    #[test]
    fn remove_deletes_file_and_entry() {
        let (dir, mut project) = project_with(valid_config());
        let path = project
            .add_component("card", "card", "acme/ui@main", "1.0.0", "x")
            .unwrap();
        project.remove_component("card").unwrap();
        assert!(!path.exists());
        assert!(project.entry(EntityKind::Component, "card").unwrap().is_none());

        // A directory where the file should be is left alone.
        std::fs::create_dir_all(dir.path().join("components/ui/odd.tsx")).unwrap();
        project
            .config()
            .unwrap()
            .components
            .insert(
                "odd".to_string(),
                InstalledEntity {
                    registry: "acme/ui@main".to_string(),
                    id: "odd".to_string(),
                    version: "1.0.0".to_string(),
                    hash: String::new(),
                },
            );
        project.remove_component("odd").unwrap();
        assert!(dir.path().join("components/ui/odd.tsx").is_dir());
        assert!(project.entry(EntityKind::Component, "odd").unwrap().is_none());
    }

    #[test]
    fn up_to_date_compares_recorded_version() {
        let (_dir, mut project) = project_with(valid_config());
        project
            .add_component("button", "button", "acme/ui@main", "1.2.0", "x")
            .unwrap();
        assert!(project.is_component_up_to_date("button", "1.2.0"));
        assert!(project.is_component_up_to_date("button", "1.1.0"));
        assert!(!project.is_component_up_to_date("button", "1.3.0"));
        assert!(!project.is_util_up_to_date("button", "0.0.1"));
    }

    #[test]
    fn untracked_files_are_listed() {
        let (dir, mut project) = project_with(valid_config());
        project
            .add_component("button", "button", "acme/ui@main", "1.0.0", "x")
            .unwrap();
        std::fs::write(dir.path().join("components/ui/stray.tsx"), "x").unwrap();
        std::fs::write(dir.path().join("components/ui/notes.md"), "x").unwrap();

        let untracked = project.untracked_files().unwrap();
        assert_eq!(
            untracked,
            vec![(EntityKind::Component, dir.path().join("components/ui/stray.tsx"))]
        );
    }

    #[test]
    fn registries_are_managed() {
        let (_dir, mut project) = project_with(valid_config());
        assert!(!project.add_registry("acme/ui@main").unwrap());
        assert!(project.add_registry("/srv/registry").unwrap());
        assert!(project.remove_registry("acme/ui@main").unwrap());
        assert!(!project.remove_registry("acme/ui@main").unwrap());
        assert_eq!(project.config().unwrap().registries, vec!["/srv/registry"]);
    }

    #[test]
    fn save_stamps_newer_cli_version() {
        let (dir, _) = project_with(valid_config());
        let mut project =
            Project::new(dir.path().to_path_buf(), "uikit.json").with_cli_version("0.3.0");
        project.add_registry("/srv/r").unwrap();
        assert_eq!(project.config().unwrap().version, "0.3.0");

        let mut older =
            Project::new(dir.path().to_path_buf(), "uikit.json").with_cli_version("0.2.0");
        assert!(older.compatibility_warning("upgrade").is_some());
    }
}
