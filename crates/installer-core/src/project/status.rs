//! Outcome enums for project validation and per-entity install status

use std::fmt;

/// Result of the precondition chain every mutating command runs first.
/// Checks run in declaration order and the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Passed,
    ConfigurationMissing,
    PathsNotConfigured,
    FormatInvalid,
    RemoteMissing,
    TailwindConfigMissing,
    TailwindConfigInvalid,
    PaletteMissing,
    BackgroundsMissing,
    Failed,
}

impl ValidationResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationResult::Passed)
    }

    /// Human-readable explanation of the failure.
    pub fn message(&self) -> &'static str {
        match self {
            ValidationResult::Passed => "Project configuration is valid",
            ValidationResult::ConfigurationMissing => "Project configuration file not found",
            ValidationResult::PathsNotConfigured => "Component and util paths are not configured",
            ValidationResult::FormatInvalid => "Format must be either \"tsx\" or \"jsx\"",
            ValidationResult::RemoteMissing => "No registries are configured",
            ValidationResult::TailwindConfigMissing => "Tailwind config file not found",
            ValidationResult::TailwindConfigInvalid => "Tailwind config file is not a JS/TS module",
            ValidationResult::PaletteMissing => "Palette is missing or contains invalid colors",
            ValidationResult::BackgroundsMissing => "Dark and light backgrounds are not configured",
            ValidationResult::Failed => "Project configuration could not be read",
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// How a local name relates to the config and the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    /// No config entry, no file
    NotInstalled,
    /// A file with this name exists but is not tracked
    FileExistsNotInstalled,
    /// Tracked, but the file is gone
    FileDoesNotExistInstalled,
    /// The name is tracked for a different registry's entity
    NotInstalledAndConflicting,
    /// Tracked and present
    FullyInstalled,
}

impl InstallStatus {
    /// Whether the config tracks the name for the asked-about registry.
    pub fn is_tracked(&self) -> bool {
        matches!(
            self,
            InstallStatus::FullyInstalled | InstallStatus::FileDoesNotExistInstalled
        )
    }
}
