//! Uninstall: removal only proceeds for entities nothing surviving depends on.
//!
//! The dependency graph is rebuilt from the installed files themselves
//! (imports through the project aliases), not from the registry.

use super::report::{BlockedItem, ItemReport, Mode, Outcome, Overview, PlannedAction, PlannedItem, Report};
use super::{skip, Components, Target};
use crate::decision::OrphanCandidate;
use crate::entity::EntityKind;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

type Node = (EntityKind, String);

#[derive(Debug, Default)]
struct NodeInfo {
    dependencies: BTreeSet<Node>,
    packages: BTreeSet<String>,
}

fn label((kind, name): &Node) -> String {
    format!("{} {}", kind, name)
}

impl Components<'_> {
    /// Remove installed entities, offering their orphaned dependencies.
    pub async fn uninstall(&mut self, targets: &[Target]) -> Result<Report> {
        let mut report = self.new_report(Mode::Uninstall);
        let graph = self.installed_graph(&mut report)?;

        let mut dependents: BTreeMap<Node, BTreeSet<Node>> = BTreeMap::new();
        for (node, info) in &graph {
            for dependency in &info.dependencies {
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(node.clone());
            }
        }
        let empty = BTreeSet::new();
        let dependents_of = |node: &Node| dependents.get(node).unwrap_or(&empty);

        let mut requested = BTreeSet::new();
        for target in targets {
            let node = (target.kind, target.name.clone());
            if graph.contains_key(&node) {
                requested.insert(node);
            } else {
                skip(
                    &mut report,
                    target.kind,
                    &target.name,
                    "",
                    "is not installed".to_string(),
                );
            }
        }
        let mut removal = requested.clone();

        // Transitive dependencies of what was asked for.
        let mut pulled = BTreeSet::new();
        let mut queue: VecDeque<Node> = requested.iter().cloned().collect();
        while let Some(node) = queue.pop_front() {
            let Some(info) = graph.get(&node) else {
                continue;
            };
            for dependency in &info.dependencies {
                if !requested.contains(dependency) && pulled.insert(dependency.clone()) {
                    queue.push_back(dependency.clone());
                }
            }
        }

        // Orphans: pulled dependencies referenced only from the removal set.
        let mut orphans: BTreeSet<Node> = BTreeSet::new();
        loop {
            let found: Vec<Node> = pulled
                .iter()
                .filter(|node| !orphans.contains(*node))
                .filter(|node| {
                    dependents_of(node)
                        .iter()
                        .all(|d| removal.contains(d) || orphans.contains(d))
                })
                .cloned()
                .collect();
            if found.is_empty() {
                break;
            }
            orphans.extend(found);
        }

        if !orphans.is_empty() {
            if self.options.yes {
                tracing::debug!(count = orphans.len(), "keeping orphaned dependencies");
            } else {
                let candidates: Vec<OrphanCandidate> = orphans
                    .iter()
                    .map(|node| OrphanCandidate {
                        kind: node.0,
                        name: node.1.clone(),
                        dependents: dependents_of(node).iter().map(label).collect(),
                    })
                    .collect();
                for index in self.decider.select_orphans(&candidates)? {
                    if let Some(candidate) = candidates.get(index) {
                        removal.insert((candidate.kind, candidate.name.clone()));
                    }
                }
            }
        }

        // Anything still referenced from outside the removal set stays.
        let mut blocked: BTreeMap<Node, Vec<String>> = BTreeMap::new();
        loop {
            let blocking: Vec<(Node, Vec<String>)> = removal
                .iter()
                .filter_map(|node| {
                    let outside: Vec<String> = dependents_of(node)
                        .iter()
                        .filter(|d| !removal.contains(*d))
                        .map(label)
                        .collect();
                    (!outside.is_empty()).then(|| (node.clone(), outside))
                })
                .collect();
            if blocking.is_empty() {
                break;
            }
            for (node, by) in blocking {
                removal.remove(&node);
                blocked.insert(node, by);
            }
        }

        let packages_to_remove = if self.options.skip_package {
            Vec::new()
        } else {
            let freed: BTreeSet<String> = removal
                .iter()
                .filter_map(|node| graph.get(node))
                .flat_map(|info| info.packages.iter().cloned())
                .collect();
            let still_used: BTreeSet<String> = graph
                .iter()
                .filter(|(node, _)| !removal.contains(*node))
                .flat_map(|(_, info)| info.packages.iter().cloned())
                .collect();
            let existing = if freed.is_empty() {
                BTreeSet::new()
            } else {
                self.existing_packages(&mut report)
            };
            freed
                .difference(&still_used)
                .filter(|package| existing.contains(*package))
                .cloned()
                .collect()
        };

        let config = self.project.config()?.clone();
        let planned = |node: &Node| {
            let entry = config.entities(node.0).get(&node.1);
            PlannedItem {
                kind: node.0,
                name: node.1.clone(),
                id: entry.map(|e| e.id.clone()).unwrap_or_else(|| node.1.clone()),
                registry: entry.map(|e| e.registry.clone()).unwrap_or_default(),
                version: entry.map(|e| e.version.clone()).unwrap_or_default(),
                action: PlannedAction::Remove,
            }
        };
        let overview = Overview {
            mode: Mode::Uninstall,
            requested: removal
                .iter()
                .filter(|node| requested.contains(*node))
                .map(planned)
                .collect(),
            dependencies: removal
                .iter()
                .filter(|node| !requested.contains(*node))
                .map(planned)
                .collect(),
            packages_to_install: Vec::new(),
            packages_to_remove: packages_to_remove.clone(),
            blocked: blocked
                .iter()
                .map(|(node, by)| BlockedItem {
                    kind: node.0,
                    name: node.1.clone(),
                    dependents: by.clone(),
                })
                .collect(),
        };

        for (node, by) in &blocked {
            let registry = config
                .entities(node.0)
                .get(&node.1)
                .map(|e| e.registry.clone())
                .unwrap_or_default();
            report.warn(
                label(node),
                format!("cannot be uninstalled, still depended upon by {}", by.join(", ")),
            );
            report.items.push(ItemReport {
                kind: node.0,
                name: node.1.clone(),
                registry,
                outcome: Outcome::Blocked {
                    dependents: by.clone(),
                },
                missing: Vec::new(),
            });
        }

        if removal.is_empty() {
            return Ok(report);
        }

        if !self.confirmed(&overview)? {
            report.cancelled = true;
            for item in overview.items() {
                report.items.push(ItemReport {
                    kind: item.kind,
                    name: item.name.clone(),
                    registry: item.registry.clone(),
                    outcome: Outcome::Skipped("cancelled".to_string()),
                    missing: Vec::new(),
                });
            }
            return Ok(report);
        }

        for item in overview.items() {
            let outcome = if self.options.dry_run {
                Outcome::Planned(PlannedAction::Remove)
            } else {
                self.project
                    .remove_entity(item.kind, &item.name)
                    .with_context(|| format!("Failed to uninstall {} {}", item.kind, item.name))?;
                Outcome::Removed
            };
            report.items.push(ItemReport {
                kind: item.kind,
                name: item.name.clone(),
                registry: item.registry.clone(),
                outcome,
                missing: Vec::new(),
            });
        }

        if !packages_to_remove.is_empty() {
            if self.options.dry_run {
                report.packages_removed = packages_to_remove;
            } else {
                let root = self.project.root().to_path_buf();
                match self
                    .toolchain
                    .packages
                    .uninstall(&root, &packages_to_remove)
                    .await
                {
                    Ok(()) => report.packages_removed = packages_to_remove,
                    Err(e) => report.warn(
                        "packages",
                        format!(
                            "failed to remove {}: {:#}",
                            packages_to_remove.join(", "),
                            e
                        ),
                    ),
                }
            }
        }

        Ok(report)
    }

    /// Dependencies and packages of every installed entity, read from disk.
    fn installed_graph(&mut self, report: &mut Report) -> Result<BTreeMap<Node, NodeInfo>> {
        let config = self.project.config()?.clone();
        let mut graph = BTreeMap::new();

        for kind in [EntityKind::Component, EntityKind::Util] {
            for name in config.entities(kind).keys() {
                let node = (kind, name.clone());
                let content = match self.project.read_installed(kind, name) {
                    Ok(content) => content.unwrap_or_default(),
                    Err(e) => {
                        report.warn(label(&node), format!("could not be read: {:#}", e));
                        String::new()
                    }
                };

                let mut info = NodeInfo::default();
                for dependency in self.local_dependencies(&content)? {
                    if dependency == node {
                        report.warn(label(&node), "imports itself, ignoring the self-reference");
                        continue;
                    }
                    info.dependencies.insert(dependency);
                }
                info.packages.extend(self.local_packages(&content)?);
                graph.insert(node, info);
            }
        }
        Ok(graph)
    }
}
