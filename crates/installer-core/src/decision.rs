//! Decisions the engine cannot make on its own.
//!
//! The engine never talks to a terminal. Whenever it needs a human choice it
//! describes the situation to a `Decider` and continues with the answer. An
//! `Err` from any method is a cancellation and aborts the whole command;
//! files already written stay written.

use crate::components::Overview;
use crate::entity::EntityKind;
use crate::remote::RegistryManifest;
use anyhow::Result;
use std::path::PathBuf;

/// Why an existing file would be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteReason {
    /// A file with the target name exists but is not tracked
    Untracked,
    /// The tracked file was edited since it was written
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteRequest {
    pub kind: EntityKind,
    pub name: String,
    pub path: PathBuf,
    pub reason: OverwriteReason,
}

/// Ways out of a local-name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOption {
    /// Install under the registry-prefixed name
    Prefixed,
    /// Install under the raw id, replacing the other registry's entity
    RawId,
    /// Install under a name the user types
    Custom,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    Prefixed,
    RawId,
    Custom(String),
    Skip,
}

/// An entity whose local name is already claimed by another registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub kind: EntityKind,
    pub id: String,
    pub registry: String,
    /// The contested local name
    pub name: String,
    /// Registry currently holding the name
    pub owner_registry: String,
    pub prefixed_name: String,
    pub options: Vec<ConflictOption>,
    /// A previous answer that turned out to be taken as well
    pub rejected: Option<String>,
}

/// Transitive dependency that nothing surviving would reference any more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    pub kind: EntityKind,
    pub name: String,
    pub dependents: Vec<String>,
}

/// Answers the engine's questions.
pub trait Decider {
    /// A registry declares a non-production environment.
    fn confirm_environment(&mut self, registry: &str, manifest: &RegistryManifest) -> Result<bool>;

    fn confirm_overwrite(&mut self, request: &OverwriteRequest) -> Result<bool>;

    fn resolve_conflict(&mut self, conflict: &NameConflict) -> Result<ConflictResolution>;

    /// Last chance before files are written or removed.
    fn confirm_overview(&mut self, overview: &Overview) -> Result<bool>;

    /// Indices into `candidates` to remove as well.
    fn select_orphans(&mut self, candidates: &[OrphanCandidate]) -> Result<Vec<usize>>;
}

/// Non-interactive answers: never overwrite, prefix conflicting names, keep
/// orphans, accept development registries only when `yes` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecider {
    pub yes: bool,
}

impl AutoDecider {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }
}

impl Decider for AutoDecider {
    fn confirm_environment(&mut self, registry: &str, manifest: &RegistryManifest) -> Result<bool> {
        if !self.yes {
            tracing::warn!(registry, name = %manifest.name, "refusing development registry without confirmation");
        }
        Ok(self.yes)
    }

    fn confirm_overwrite(&mut self, _request: &OverwriteRequest) -> Result<bool> {
        Ok(false)
    }

    fn resolve_conflict(&mut self, conflict: &NameConflict) -> Result<ConflictResolution> {
        if conflict.rejected.is_some() {
            return Ok(ConflictResolution::Skip);
        }
        Ok(ConflictResolution::Prefixed)
    }

    fn confirm_overview(&mut self, _overview: &Overview) -> Result<bool> {
        Ok(true)
    }

    fn select_orphans(&mut self, _candidates: &[OrphanCandidate]) -> Result<Vec<usize>> {
        Ok(Vec::new())
    }
}
