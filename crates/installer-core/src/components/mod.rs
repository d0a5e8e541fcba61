//! The installer engine.
//!
//! A run has three phases. The walk resolves the transitive dependency
//! closure of the requested entities, deciding per entity what to do and
//! fetching and transforming its source. The overview of everything planned
//! is then confirmed through the `Decider`. Finally files are written (or
//! removed) one entity at a time and packages are installed. Nothing is
//! written before the overview is confirmed; after that, completion is per
//! entity, not transactional.

pub mod report;
pub mod rewrite;
pub mod transform;

mod uninstall;
mod walk;

use crate::decision::{Decider, OverwriteReason, OverwriteRequest};
use crate::entity::EntityKind;
use crate::project::Project;
use crate::remote::Remote;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

pub use report::{
    BlockedItem, ItemReport, Mode, Outcome, Overview, PlannedAction, PlannedItem, Report, Warning,
};

use walk::{Task, Walk};

/// Flags shared by every engine command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Skip confirmations; never overwrite without `force`
    pub yes: bool,
    /// Overwrite untracked or modified files, allow raw-id conflict resolution
    pub force: bool,
    /// Do not touch npm packages
    pub skip_package: bool,
    /// Plan and report without writing anything
    pub dry_run: bool,
}

/// An entity to install, addressed by registry id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: EntityKind,
    pub id: String,
    /// Registry reference; the project's first registry when `None`
    pub registry: Option<String>,
    /// Semver requirement the published version must satisfy
    pub version: Option<String>,
    /// Local name to install under instead of the id
    pub name: Option<String>,
}

impl Request {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            registry: None,
            version: None,
            name: None,
        }
    }

    pub fn component(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Component, id)
    }

    pub fn util(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Util, id)
    }

    pub fn from_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn at_version(mut self, requirement: impl Into<String>) -> Self {
        self.version = Some(requirement.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// An installed entity, addressed by local name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target {
    pub kind: EntityKind,
    pub name: String,
}

impl Target {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Engine bound to one project for the duration of a command.
pub struct Components<'a> {
    project: &'a mut Project,
    remote: &'a mut Remote,
    toolchain: &'a Toolchain,
    decider: &'a mut dyn Decider,
    options: Options,
}

impl<'a> Components<'a> {
    pub fn new(
        project: &'a mut Project,
        remote: &'a mut Remote,
        toolchain: &'a Toolchain,
        decider: &'a mut dyn Decider,
        options: Options,
    ) -> Self {
        Self {
            project,
            remote,
            toolchain,
            decider,
            options,
        }
    }

    /// Install entities and everything they depend on.
    pub async fn install(&mut self, requests: &[Request]) -> Result<Report> {
        let mut report = self.new_report(Mode::Install);
        let default_registry = self
            .project
            .config()?
            .default_registry()
            .map(str::to_string);

        let mut tasks = Vec::new();
        for request in requests {
            let id = request.id.trim().to_string();
            let Some(registry) = request.registry.clone().or_else(|| default_registry.clone())
            else {
                skip(
                    &mut report,
                    request.kind,
                    &id,
                    "",
                    "no registry is configured".to_string(),
                );
                continue;
            };
            tasks.push(Task {
                kind: request.kind,
                id,
                registry,
                requested: true,
                name: request.name.as_ref().map(|n| n.trim().to_string()),
                version_req: request.version.clone(),
            });
        }

        self.run(Mode::Install, tasks, report).await
    }

    /// Bring installed entities to the registry's current version.
    pub async fn update(&mut self, targets: &[Target]) -> Result<Report> {
        self.refresh(Mode::Update, targets).await
    }

    /// Re-fetch and rewrite installed entities even when they are current.
    pub async fn repair(&mut self, targets: &[Target]) -> Result<Report> {
        self.refresh(Mode::Repair, targets).await
    }

    async fn refresh(&mut self, mode: Mode, targets: &[Target]) -> Result<Report> {
        let mut report = self.new_report(mode);
        let mut tasks = Vec::new();
        for target in targets {
            match self.project.entry(target.kind, &target.name)? {
                Some(entry) => tasks.push(Task {
                    kind: target.kind,
                    id: entry.id,
                    registry: entry.registry,
                    requested: true,
                    name: Some(target.name.clone()),
                    version_req: None,
                }),
                None => skip(
                    &mut report,
                    target.kind,
                    &target.name,
                    "",
                    "is not installed".to_string(),
                ),
            }
        }
        self.run(mode, tasks, report).await
    }

    /// Every installed entity of `kind`, for commands run without names.
    pub fn installed_targets(&mut self, kind: EntityKind) -> Result<Vec<Target>> {
        Ok(self
            .project
            .config()?
            .entities(kind)
            .keys()
            .map(|name| Target::new(kind, name.clone()))
            .collect())
    }

    fn new_report(&self, mode: Mode) -> Report {
        let mut report = Report::new(mode);
        report.dry_run = self.options.dry_run;
        report
    }

    async fn run(&mut self, mode: Mode, tasks: Vec<Task>, mut report: Report) -> Result<Report> {
        let mut registries: Vec<String> = Vec::new();
        for task in &tasks {
            if !registries.contains(&task.registry) {
                registries.push(task.registry.clone());
            }
        }
        self.remote.prefetch_configs(&registries).await;

        let walk = self.walk(mode, tasks, &mut report).await?;
        self.apply(mode, walk, report).await
    }

    /// Confirm the overview, write records, install the package delta.
    async fn apply(&mut self, mode: Mode, walk: Walk, mut report: Report) -> Result<Report> {
        let root = self.project.root().to_path_buf();

        let wanted: BTreeSet<String> = walk
            .records
            .iter()
            .flat_map(|record| record.packages.iter().cloned())
            .collect();
        let packages_to_install: Vec<String> = if self.options.skip_package || wanted.is_empty() {
            Vec::new()
        } else {
            let existing = self.existing_packages(&mut report);
            wanted.difference(&existing).cloned().collect()
        };

        let mut overview = Overview {
            mode,
            requested: Vec::new(),
            dependencies: Vec::new(),
            packages_to_install: packages_to_install.clone(),
            packages_to_remove: Vec::new(),
            blocked: Vec::new(),
        };
        for record in &walk.records {
            let item = record.planned_item();
            if record.requested {
                overview.requested.push(item);
            } else {
                overview.dependencies.push(item);
            }
            if mode == Mode::Install && record.requested && record.action == PlannedAction::Keep {
                report.warn(record.subject(), "is already installed");
            }
        }

        if !self.confirmed(&overview)? {
            report.cancelled = true;
            for record in &walk.records {
                report.items.push(record.item(Outcome::Skipped("cancelled".to_string())));
            }
            return Ok(report);
        }

        let (components_alias, utils_alias) = {
            let config = self.project.config()?;
            (
                config.alias(EntityKind::Component).to_string(),
                config.alias(EntityKind::Util).to_string(),
            )
        };

        for record in &walk.records {
            let outcome = match &record.action {
                PlannedAction::Keep if mode == Mode::Install => Outcome::AlreadyInstalled,
                PlannedAction::Keep => Outcome::UpToDate,
                action if self.options.dry_run => Outcome::Planned(action.clone()),
                action => {
                    let content =
                        walk.rewritten_content(record, &components_alias, &utils_alias);

                    self.project
                        .add_entity(
                            record.kind,
                            &record.name,
                            &record.id,
                            &record.registry,
                            &record.version,
                            &content,
                        )
                        .with_context(|| format!("Failed to install {}", record.subject()))?;

                    match action {
                        PlannedAction::Update { from } => Outcome::Updated {
                            from: from.clone(),
                            to: record.version.clone(),
                        },
                        PlannedAction::Repair => Outcome::Repaired {
                            version: record.version.clone(),
                        },
                        _ => Outcome::Installed {
                            version: record.version.clone(),
                        },
                    }
                }
            };

            if !record.missing.is_empty() {
                report.warn(
                    record.subject(),
                    format!(
                        "is incomplete, unresolved dependencies: {}",
                        record.missing.join(", ")
                    ),
                );
            }
            report.items.push(record.item(outcome));
        }

        if !packages_to_install.is_empty() {
            match self
                .toolchain
                .packages
                .install(&root, &packages_to_install, self.options.dry_run)
                .await
            {
                Ok(()) => report.packages_installed = packages_to_install,
                Err(e) => report.warn(
                    "packages",
                    format!(
                        "failed to install {}: {:#}",
                        packages_to_install.join(", "),
                        e
                    ),
                ),
            }
        }

        Ok(report)
    }

    /// Ask for the overview unless there is nothing to confirm or `yes` is set.
    fn confirmed(&mut self, overview: &Overview) -> Result<bool> {
        if !overview.has_changes() && overview.blocked.is_empty() {
            return Ok(true);
        }
        if self.options.yes {
            return Ok(true);
        }
        self.decider.confirm_overview(overview)
    }

    fn existing_packages(&self, report: &mut Report) -> BTreeSet<String> {
        match self.toolchain.packages.existing(self.project.root()) {
            Ok(existing) => existing,
            Err(e) => {
                report.warn("package.json", format!("{:#}", e));
                BTreeSet::new()
            }
        }
    }

    /// Overwrite policy: `force` always overwrites, `yes` alone never does,
    /// otherwise the decider chooses.
    fn allow_overwrite(
        &mut self,
        kind: EntityKind,
        name: &str,
        reason: OverwriteReason,
    ) -> Result<bool> {
        if self.options.force {
            return Ok(true);
        }
        if self.options.yes {
            return Ok(false);
        }
        let path = self.project.entity_path(kind, name)?;
        self.decider.confirm_overwrite(&OverwriteRequest {
            kind,
            name: name.to_string(),
            path,
            reason,
        })
    }

    /// Packages imported by an installed file. Imports through the project
    /// aliases are local files even when an alias looks like a package name.
    fn local_packages(&mut self, content: &str) -> Result<Vec<String>> {
        let config = self.project.config()?;
        let aliases = [
            config.alias(EntityKind::Component),
            config.alias(EntityKind::Util),
        ];
        Ok(self.toolchain.scanner.imports(content, &aliases))
    }

    /// Tracked entities imported from `content` through the project aliases.
    fn local_dependencies(&mut self, content: &str) -> Result<Vec<(EntityKind, String)>> {
        let config = self.project.config()?;
        let mut found = Vec::new();
        for kind in [EntityKind::Component, EntityKind::Util] {
            for name in self
                .toolchain
                .scanner
                .placeholder_imports(content, config.alias(kind), true)
            {
                if config.entities(kind).contains_key(&name) {
                    found.push((kind, name));
                }
            }
        }
        Ok(found)
    }
}

/// Record a skipped entity and say why.
fn skip(report: &mut Report, kind: EntityKind, name: &str, registry: &str, reason: String) {
    report.warn(format!("{} {}", kind, name), reason.clone());
    report.items.push(ItemReport {
        kind,
        name: name.to_string(),
        registry: registry.to_string(),
        outcome: Outcome::Skipped(reason),
        missing: Vec::new(),
    });
}
