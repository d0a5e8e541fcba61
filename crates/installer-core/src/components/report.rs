//! What an engine run plans (`Overview`) and what it did (`Report`).

use crate::entity::EntityKind;
use std::fmt;

/// Engine operation. Repair is an update that re-fetches even current entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Install,
    Update,
    Repair,
    Uninstall,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Install => "install",
            Mode::Update => "update",
            Mode::Repair => "repair",
            Mode::Uninstall => "uninstall",
        }
    }
}

/// What will happen to one entity once the overview is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Fresh write
    Install,
    /// Write over an untracked file or another registry's entity
    Overwrite,
    /// Write a newer version
    Update { from: String },
    /// Rewrite with the registry's current content
    Repair,
    /// Already installed (install mode) or current (update mode); no write
    Keep,
    /// Delete file and config entry
    Remove,
}

impl PlannedAction {
    pub fn writes(&self) -> bool {
        matches!(
            self,
            PlannedAction::Install
                | PlannedAction::Overwrite
                | PlannedAction::Update { .. }
                | PlannedAction::Repair
        )
    }
}

/// One line of the overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub kind: EntityKind,
    pub name: String,
    pub id: String,
    pub registry: String,
    pub version: String,
    pub action: PlannedAction,
}

/// Entity that cannot be removed because something that stays depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedItem {
    pub kind: EntityKind,
    pub name: String,
    pub dependents: Vec<String>,
}

/// Everything the engine intends to do, shown before any irreversible write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub mode: Mode,
    /// Entities the caller asked for
    pub requested: Vec<PlannedItem>,
    /// Entities pulled in through dependencies
    pub dependencies: Vec<PlannedItem>,
    pub packages_to_install: Vec<String>,
    pub packages_to_remove: Vec<String>,
    pub blocked: Vec<BlockedItem>,
}

impl Overview {
    pub fn items(&self) -> impl Iterator<Item = &PlannedItem> {
        self.requested.iter().chain(self.dependencies.iter())
    }

    /// Whether confirming would change anything.
    pub fn has_changes(&self) -> bool {
        self.items()
            .any(|item| item.action != PlannedAction::Keep)
            || !self.packages_to_install.is_empty()
            || !self.packages_to_remove.is_empty()
    }
}

/// Final state of one entity after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed { version: String },
    Updated { from: String, to: String },
    Repaired { version: String },
    AlreadyInstalled,
    UpToDate,
    Removed,
    /// Would have been written or removed; nothing touched
    Planned(PlannedAction),
    Skipped(String),
    Blocked { dependents: Vec<String> },
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Outcome::Skipped(_) | Outcome::Blocked { .. } | Outcome::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub kind: EntityKind,
    pub name: String,
    pub registry: String,
    pub outcome: Outcome,
    /// Declared dependencies that could not be resolved. A successful item
    /// with missing dependencies is incomplete, not done.
    pub missing: Vec<String>,
}

impl ItemReport {
    pub fn is_incomplete(&self) -> bool {
        self.outcome.is_success() && !self.missing.is_empty()
    }
}

/// A human-readable problem tied to one entity or registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub mode: Mode,
    pub items: Vec<ItemReport>,
    pub warnings: Vec<Warning>,
    pub packages_installed: Vec<String>,
    pub packages_removed: Vec<String>,
    /// The overview was declined; nothing was written
    pub cancelled: bool,
    pub dry_run: bool,
}

impl Report {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            items: Vec::new(),
            warnings: Vec::new(),
            packages_installed: Vec::new(),
            packages_removed: Vec::new(),
            cancelled: false,
            dry_run: false,
        }
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        let warning = Warning {
            subject: subject.into(),
            message: message.into(),
        };
        tracing::warn!(subject = %warning.subject, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn item(&self, kind: EntityKind, name: &str) -> Option<&ItemReport> {
        self.items
            .iter()
            .find(|item| item.kind == kind && item.name == name)
    }

    pub fn has_warning(&self, fragment: &str) -> bool {
        self.warnings.iter().any(|w| w.message.contains(fragment))
    }
}
