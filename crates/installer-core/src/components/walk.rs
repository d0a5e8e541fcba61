//! Dependency walk for install, update and repair.
//!
//! Entities are processed from a FIFO worklist. Each `(kind, registry, id)`
//! is entered into the memo before it is processed, so cycles and diamonds
//! terminate and produce at most one record per entity. A memo value of
//! `None` marks an entity that was skipped or failed; parents depending on it
//! end up with that id in `missing`.

use super::report::{ItemReport, Mode, Outcome, PlannedAction, PlannedItem, Report};
use super::rewrite::rewrite_imports;
use super::transform::transform;
use super::{skip, Components};
use crate::decision::{ConflictOption, ConflictResolution, NameConflict, OverwriteReason};
use crate::entity::{self, EntityKind};
use crate::project::InstallStatus;
use crate::remote::RegistryManifest;
use crate::toolchain::{COMPONENTS_PLACEHOLDER, UTILS_PLACEHOLDER};
use crate::version;
use anyhow::Result;
use std::collections::{HashMap, VecDeque};

/// Answers accepted for one naming conflict before giving up on the entity.
const MAX_CONFLICT_ROUNDS: usize = 5;

type Key = (EntityKind, String, String);

#[derive(Debug, Clone)]
pub(super) struct Task {
    pub kind: EntityKind,
    pub id: String,
    pub registry: String,
    pub requested: bool,
    /// Name override on install, tracked local name on update
    pub name: Option<String>,
    pub version_req: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Dependency {
    pub kind: EntityKind,
    pub registry: String,
    pub id: String,
}

/// Everything known about one entity once the walk has planned it.
#[derive(Debug, Clone)]
pub(super) struct ContentRecord {
    pub kind: EntityKind,
    pub id: String,
    pub registry: String,
    pub name: String,
    pub version: String,
    /// Transformed source with placeholders, or the installed file for `Keep`
    pub content: String,
    pub dependencies: Vec<Dependency>,
    pub packages: Vec<String>,
    pub action: PlannedAction,
    pub requested: bool,
    pub missing: Vec<String>,
}

impl ContentRecord {
    pub fn subject(&self) -> String {
        format!("{} {}", self.kind, self.name)
    }

    pub fn planned_item(&self) -> PlannedItem {
        PlannedItem {
            kind: self.kind,
            name: self.name.clone(),
            id: self.id.clone(),
            registry: self.registry.clone(),
            version: self.version.clone(),
            action: self.action.clone(),
        }
    }

    pub fn item(&self, outcome: Outcome) -> ItemReport {
        ItemReport {
            kind: self.kind,
            name: self.name.clone(),
            registry: self.registry.clone(),
            outcome,
            missing: self.missing.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct Walk {
    queue: VecDeque<Task>,
    memo: HashMap<Key, Option<String>>,
    /// Local names taken by records of this run
    claims: HashMap<(EntityKind, String), Key>,
    /// Dependencies skipped in this run that are still installed locally
    installed: HashMap<Key, String>,
    pub records: Vec<ContentRecord>,
}

impl Walk {
    /// Local name an entity of this run resolved to.
    /// Falls back to the installed name of a dependency that was skipped.
    pub fn local_name(&self, kind: EntityKind, registry: &str, id: &str) -> Option<&str> {
        let key = (kind, registry.to_string(), id.to_string());
        self.memo
            .get(&key)
            .and_then(|name| name.as_deref())
            .or_else(|| self.installed.get(&key).map(String::as_str))
    }

    /// A record's content with placeholder imports pointed at local names.
    /// Unresolved dependencies keep their registry id.
    pub fn rewritten_content(
        &self,
        record: &ContentRecord,
        components_alias: &str,
        utils_alias: &str,
    ) -> String {
        let resolve = |kind: EntityKind, id: &str| -> String {
            self.local_name(kind, &record.registry, id)
                .unwrap_or(id)
                .to_string()
        };
        let content = rewrite_imports(
            &record.content,
            COMPONENTS_PLACEHOLDER,
            components_alias,
            |id| resolve(EntityKind::Component, id),
        );
        rewrite_imports(&content, UTILS_PLACEHOLDER, utils_alias, |id| {
            resolve(EntityKind::Util, id)
        })
    }

    /// Registry of whatever else claimed `name` in this run.
    fn claimed_by_other(&self, kind: EntityKind, name: &str, key: &Key) -> Option<String> {
        self.claims
            .get(&(kind, name.to_string()))
            .filter(|claim| *claim != key)
            .map(|claim| claim.1.clone())
    }
}

/// What the walk decided for one entity.
type Plan = Option<(String, PlannedAction)>;

impl Components<'_> {
    pub(super) async fn walk(
        &mut self,
        mode: Mode,
        tasks: Vec<Task>,
        report: &mut Report,
    ) -> Result<Walk> {
        let mut walk = Walk::default();
        walk.queue.extend(tasks);
        while let Some(task) = walk.queue.pop_front() {
            self.process(mode, task, &mut walk, report).await?;
        }
        self.resolve_missing(&mut walk)?;
        Ok(walk)
    }

    /// Fill in `missing` for every record. A dependency that was skipped in
    /// this run but is still installed keeps its local name and is not
    /// missing.
    fn resolve_missing(&mut self, walk: &mut Walk) -> Result<()> {
        let mut skipped: Vec<Key> = walk
            .records
            .iter()
            .flat_map(|record| record.dependencies.iter())
            .map(|dep| (dep.kind, dep.registry.clone(), dep.id.clone()))
            .filter(|key| !matches!(walk.memo.get(key), Some(Some(_))))
            .collect();
        skipped.sort();
        skipped.dedup();

        for key in skipped {
            let Some(name) = self.project.find_local_name(key.0, &key.1, &key.2)? else {
                continue;
            };
            if self.project.entity_path(key.0, &name)?.is_file() {
                tracing::debug!(kind = %key.0, id = %key.2, name = %name, "keeping installed dependency");
                walk.installed.insert(key, name);
            }
        }

        for record in &mut walk.records {
            record.missing = record
                .dependencies
                .iter()
                .filter(|dep| {
                    let key = (dep.kind, dep.registry.clone(), dep.id.clone());
                    !matches!(walk.memo.get(&key), Some(Some(_)))
                        && !walk.installed.contains_key(&key)
                })
                .map(|dep| dep.id.clone())
                .collect();
        }
        Ok(())
    }

    /// Plan one entity and queue its dependencies. `Err` is reserved for
    /// cancellation and fatal project errors.
    async fn process(
        &mut self,
        mode: Mode,
        task: Task,
        walk: &mut Walk,
        report: &mut Report,
    ) -> Result<()> {
        let key: Key = (task.kind, task.registry.clone(), task.id.clone());
        if walk.memo.contains_key(&key) {
            return Ok(());
        }
        walk.memo.insert(key.clone(), None);

        let display = task.name.clone().unwrap_or_else(|| task.id.clone());
        let fail = |report: &mut Report, reason: String| {
            skip(report, task.kind, &display, &task.registry, reason)
        };

        let Some(manifest) = self
            .remote
            .get_remote_config(Some(task.registry.as_str()), Some(&mut *self.decider), false)
            .await?
        else {
            fail(report, format!("registry {} is unavailable", task.registry));
            return Ok(());
        };

        let Some(entry) = manifest.entry(task.kind, &task.id) else {
            fail(report, format!("is not published by {}", task.registry));
            return Ok(());
        };
        let remote_version = entry.version.trim().to_string();
        let Ok(published) = semver::Version::parse(&remote_version) else {
            fail(report, format!("has an invalid version \"{}\"", entry.version));
            return Ok(());
        };
        if let Some(requirement) = &task.version_req {
            match semver::VersionReq::parse(requirement) {
                Ok(req) if req.matches(&published) => {}
                Ok(_) => {
                    fail(
                        report,
                        format!("version {} does not satisfy {}", published, requirement),
                    );
                    return Ok(());
                }
                Err(_) => {
                    fail(
                        report,
                        format!("\"{}\" is not a valid version requirement", requirement),
                    );
                    return Ok(());
                }
            }
        }

        let tracked = match (mode, &task.name) {
            (Mode::Install, _) => None,
            (_, Some(name)) if task.requested => Some(name.clone()),
            _ => self
                .project
                .find_local_name(task.kind, &task.registry, &task.id)?,
        };
        let plan = match tracked {
            Some(name) => self.plan_update(mode, &task, name, &remote_version, report)?,
            None => self.plan_install(&task, &key, &manifest, walk, report)?,
        };
        let Some((name, action)) = plan else {
            return Ok(());
        };
        let subject = format!("{} {}", task.kind, name);

        let (content, dependencies, packages) = if action == PlannedAction::Keep {
            let content = match self.project.read_installed(task.kind, &name) {
                Ok(content) => content.unwrap_or_default(),
                Err(e) => {
                    fail(report, format!("could not be read: {:#}", e));
                    return Ok(());
                }
            };
            let mut dependencies = Vec::new();
            for (kind, local) in self.local_dependencies(&content)? {
                if kind == task.kind && local == name {
                    report.warn(&subject, "imports itself, ignoring the self-reference");
                    continue;
                }
                if let Some(entry) = self.project.entry(kind, &local)? {
                    dependencies.push(Dependency {
                        kind,
                        registry: entry.registry,
                        id: entry.id,
                    });
                }
            }
            let packages = self.local_packages(&content)?;
            (content, dependencies, packages)
        } else {
            let Some(source) = self
                .remote
                .get_remote_entity(task.kind, &task.id, &task.registry)
                .await
            else {
                fail(
                    report,
                    format!("could not be fetched from {}", task.registry),
                );
                return Ok(());
            };

            let (format, server_components) = {
                let config = self.project.config()?;
                (config.source_format(), config.server_components)
            };
            let transformed =
                match transform(self.toolchain, &source, format, server_components).await {
                    Ok(transformed) => transformed,
                    Err(e) => {
                        report.warn(&subject, format!("failed to process: {:#}", e));
                        report.items.push(ItemReport {
                            kind: task.kind,
                            name: name.clone(),
                            registry: task.registry.clone(),
                            outcome: Outcome::Failed(format!("{:#}", e)),
                            missing: Vec::new(),
                        });
                        return Ok(());
                    }
                };

            let mut dependencies = Vec::new();
            let declared = transformed
                .component_deps
                .iter()
                .map(|id| (EntityKind::Component, id))
                .chain(
                    transformed
                        .util_deps
                        .iter()
                        .map(|id| (EntityKind::Util, id)),
                );
            for (kind, id) in declared {
                if kind == task.kind && *id == task.id {
                    report.warn(&subject, "declares itself as a dependency, ignoring it");
                    continue;
                }
                dependencies.push(Dependency {
                    kind,
                    registry: task.registry.clone(),
                    id: id.clone(),
                });
            }
            (transformed.content, dependencies, transformed.packages)
        };

        tracing::debug!(
            kind = %task.kind,
            id = %task.id,
            registry = %task.registry,
            name = %name,
            action = ?action,
            dependencies = dependencies.len(),
            "planned entity"
        );

        for dependency in &dependencies {
            walk.queue.push_back(Task {
                kind: dependency.kind,
                id: dependency.id.clone(),
                registry: dependency.registry.clone(),
                requested: false,
                name: None,
                version_req: None,
            });
        }
        walk.memo.insert(key.clone(), Some(name.clone()));
        walk.claims.insert((task.kind, name.clone()), key);

        let version = if action == PlannedAction::Keep {
            self.project
                .entry(task.kind, &name)?
                .map(|entry| entry.version)
                .unwrap_or(remote_version)
        } else {
            remote_version
        };
        walk.records.push(ContentRecord {
            kind: task.kind,
            id: task.id,
            registry: task.registry,
            name,
            version,
            content,
            dependencies,
            packages,
            action,
            requested: task.requested,
            missing: Vec::new(),
        });
        Ok(())
    }

    /// Decide the local name and action for an entity not tracked from its
    /// registry yet.
    fn plan_install(
        &mut self,
        task: &Task,
        key: &Key,
        manifest: &RegistryManifest,
        walk: &Walk,
        report: &mut Report,
    ) -> Result<Plan> {
        let name = match &task.name {
            Some(name) => name.clone(),
            None => self
                .project
                .find_local_name(task.kind, &task.registry, &task.id)?
                .unwrap_or_else(|| task.id.clone()),
        };

        if let Some(owner) = self.name_owner(walk, task.kind, &name, key)? {
            if task.name.is_some() {
                skip(
                    report,
                    task.kind,
                    &name,
                    &task.registry,
                    format!("cannot use the name \"{}\", it belongs to an entity from {}", name, owner),
                );
                return Ok(None);
            }
            return self.resolve_conflict(task, key, manifest, walk, name, owner, report);
        }

        let action = match self
            .project
            .install_status(task.kind, &name, Some(task.registry.as_str()))?
        {
            InstallStatus::FullyInstalled => PlannedAction::Keep,
            InstallStatus::NotInstalled | InstallStatus::FileDoesNotExistInstalled => {
                PlannedAction::Install
            }
            InstallStatus::FileExistsNotInstalled => {
                if !self.allow_overwrite(task.kind, &name, OverwriteReason::Untracked)? {
                    skip(
                        report,
                        task.kind,
                        &name,
                        &task.registry,
                        "already exists and is not tracked (use --force to overwrite)".to_string(),
                    );
                    return Ok(None);
                }
                PlannedAction::Overwrite
            }
            InstallStatus::NotInstalledAndConflicting => {
                let owner = self
                    .project
                    .entry(task.kind, &name)?
                    .map(|entry| entry.registry)
                    .unwrap_or_default();
                return self.resolve_conflict(task, key, manifest, walk, name, owner, report);
            }
        };
        Ok(Some((name, action)))
    }

    /// Decide what update or repair does with a tracked entity.
    fn plan_update(
        &mut self,
        mode: Mode,
        task: &Task,
        name: String,
        remote_version: &str,
        report: &mut Report,
    ) -> Result<Plan> {
        let Some(entry) = self.project.entry(task.kind, &name)? else {
            skip(
                report,
                task.kind,
                &name,
                &task.registry,
                "is not installed".to_string(),
            );
            return Ok(None);
        };

        let file_present = self.project.entity_path(task.kind, &name)?.is_file();
        let up_to_date = version::is_up_to_date(&entry.version, remote_version);
        let rewrite = if up_to_date {
            PlannedAction::Repair
        } else {
            PlannedAction::Update {
                from: entry.version.clone(),
            }
        };

        if file_present && !self.project.verify_integrity(task.kind, &name) {
            if !self.allow_overwrite(task.kind, &name, OverwriteReason::Modified)? {
                skip(
                    report,
                    task.kind,
                    &name,
                    &task.registry,
                    "has been modified since it was installed (use --force to overwrite)"
                        .to_string(),
                );
                return Ok(None);
            }
            return Ok(Some((name, rewrite)));
        }

        if mode == Mode::Update && up_to_date && file_present {
            return Ok(Some((name, PlannedAction::Keep)));
        }
        Ok(Some((name, rewrite)))
    }

    /// Ask for another name until one is free, the entity is skipped, or the
    /// rounds run out.
    #[allow(clippy::too_many_arguments)]
    fn resolve_conflict(
        &mut self,
        task: &Task,
        key: &Key,
        manifest: &RegistryManifest,
        walk: &Walk,
        name: String,
        owner: String,
        report: &mut Report,
    ) -> Result<Plan> {
        let prefixed = format!("{}-{}", manifest.abbreviation(&task.registry), task.id);
        let subject = format!("{} {}", task.kind, task.id);
        let mut options = vec![ConflictOption::Prefixed];
        if self.options.force {
            options.push(ConflictOption::RawId);
        }
        options.extend([ConflictOption::Custom, ConflictOption::Skip]);

        let mut rejected: Option<String> = None;
        for _ in 0..MAX_CONFLICT_ROUNDS {
            let resolution = if self.options.yes {
                match rejected {
                    None => ConflictResolution::Prefixed,
                    Some(_) => ConflictResolution::Skip,
                }
            } else {
                self.decider.resolve_conflict(&NameConflict {
                    kind: task.kind,
                    id: task.id.clone(),
                    registry: task.registry.clone(),
                    name: name.clone(),
                    owner_registry: owner.clone(),
                    prefixed_name: prefixed.clone(),
                    options: options.clone(),
                    rejected: rejected.clone(),
                })?
            };

            let candidate = match resolution {
                ConflictResolution::Prefixed => prefixed.clone(),
                ConflictResolution::RawId if self.options.force => {
                    if walk.claimed_by_other(task.kind, &task.id, key).is_none() {
                        report.warn(
                            &subject,
                            format!("replaces the entity from {} installed as \"{}\"", owner, task.id),
                        );
                        return Ok(Some((task.id.clone(), PlannedAction::Overwrite)));
                    }
                    task.id.clone()
                }
                ConflictResolution::RawId => {
                    report.warn(&subject, "installing under the raw id requires --force");
                    rejected = Some(task.id.clone());
                    continue;
                }
                ConflictResolution::Custom(custom) => {
                    let custom = custom.trim().to_string();
                    if !entity::is_valid_name(&custom) {
                        report.warn(&subject, format!("\"{}\" is not a valid name", custom));
                        rejected = Some(custom);
                        continue;
                    }
                    custom
                }
                ConflictResolution::Skip => {
                    skip(
                        report,
                        task.kind,
                        &task.id,
                        &task.registry,
                        format!("skipped, the name \"{}\" belongs to {}", name, owner),
                    );
                    return Ok(None);
                }
            };

            if self.name_owner(walk, task.kind, &candidate, key)?.is_none() {
                match self
                    .project
                    .install_status(task.kind, &candidate, Some(task.registry.as_str()))?
                {
                    InstallStatus::NotInstalled | InstallStatus::FileDoesNotExistInstalled => {
                        return Ok(Some((candidate, PlannedAction::Install)));
                    }
                    InstallStatus::FullyInstalled => {
                        return Ok(Some((candidate, PlannedAction::Keep)));
                    }
                    _ => {}
                }
            }
            tracing::debug!(name = %candidate, "conflict answer is taken as well");
            rejected = Some(candidate);
        }

        skip(
            report,
            task.kind,
            &task.id,
            &task.registry,
            format!("the name \"{}\" belongs to {} and no free name was chosen", name, owner),
        );
        Ok(None)
    }

    /// Registry of a different entity already holding `name`, in the config
    /// or among this run's records.
    fn name_owner(
        &mut self,
        walk: &Walk,
        kind: EntityKind,
        name: &str,
        key: &Key,
    ) -> Result<Option<String>> {
        if let Some(owner) = walk.claimed_by_other(kind, name, key) {
            return Ok(Some(owner));
        }
        Ok(self
            .project
            .entry(kind, name)?
            .filter(|entry| entry.registry != key.1 || entry.id != key.2)
            .map(|entry| entry.registry))
    }
}
