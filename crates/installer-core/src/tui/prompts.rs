//! Interactive `Decider` answering the engine's questions with cliclack prompts

use super::render::overview_text;
use crate::components::Overview;
use crate::decision::{
    ConflictOption, ConflictResolution, Decider, NameConflict, OrphanCandidate, OverwriteReason,
    OverwriteRequest,
};
use crate::entity;
use crate::remote::RegistryManifest;
use anyhow::Result;
use colored::Colorize;

/// Asks the user in the terminal. Ctrl+C inside a prompt surfaces as an
/// `Err`, which the engine treats as cancelling the whole command.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptDecider;

impl PromptDecider {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictChoice {
    Prefixed,
    RawId,
    Custom,
    Skip,
}

impl Decider for PromptDecider {
    fn confirm_environment(&mut self, registry: &str, manifest: &RegistryManifest) -> Result<bool> {
        cliclack::log::warning(format!(
            "{} ({}) is a {} registry",
            manifest.name.bold(),
            registry,
            "development".yellow()
        ))?;
        let accepted: bool = cliclack::confirm("Use it anyway?")
            .initial_value(false)
            .interact()?;
        Ok(accepted)
    }

    fn confirm_overwrite(&mut self, request: &OverwriteRequest) -> Result<bool> {
        let why = match request.reason {
            OverwriteReason::Untracked => "exists but is not tracked",
            OverwriteReason::Modified => "has been modified since it was installed",
        };
        cliclack::log::warning(format!(
            "{} {} {}",
            request.kind,
            request.path.display().to_string().bold(),
            why
        ))?;
        let overwrite: bool = cliclack::confirm("Overwrite it?")
            .initial_value(false)
            .interact()?;
        Ok(overwrite)
    }

    fn resolve_conflict(&mut self, conflict: &NameConflict) -> Result<ConflictResolution> {
        match &conflict.rejected {
            Some(rejected) => cliclack::log::warning(format!(
                "\"{}\" cannot be used either, pick another name",
                rejected
            ))?,
            None => cliclack::log::warning(format!(
                "The {} name \"{}\" is already used by {}",
                conflict.kind,
                conflict.name.bold(),
                conflict.owner_registry
            ))?,
        }

        let mut select = cliclack::select(format!(
            "How should {} from {} be installed?",
            conflict.id, conflict.registry
        ));
        for option in &conflict.options {
            select = match option {
                ConflictOption::Prefixed => select.item(
                    ConflictChoice::Prefixed,
                    format!("As \"{}\"", conflict.prefixed_name),
                    "registry prefix",
                ),
                ConflictOption::RawId => select.item(
                    ConflictChoice::RawId,
                    format!("As \"{}\"", conflict.id),
                    "replaces the installed one",
                ),
                ConflictOption::Custom => {
                    select.item(ConflictChoice::Custom, "Under another name", "")
                }
                ConflictOption::Skip => select.item(ConflictChoice::Skip, "Skip it", ""),
            };
        }
        let choice: ConflictChoice = select.interact()?;

        Ok(match choice {
            ConflictChoice::Prefixed => ConflictResolution::Prefixed,
            ConflictChoice::RawId => ConflictResolution::RawId,
            ConflictChoice::Skip => ConflictResolution::Skip,
            ConflictChoice::Custom => {
                let name: String = cliclack::input("Local name")
                    .placeholder(&conflict.prefixed_name)
                    .validate(|input: &String| {
                        if entity::is_valid_name(input.trim()) {
                            Ok(())
                        } else {
                            Err("Use letters, digits, '.', '_' or '-'")
                        }
                    })
                    .interact()?;
                ConflictResolution::Custom(name)
            }
        })
    }

    fn confirm_overview(&mut self, overview: &Overview) -> Result<bool> {
        cliclack::note(
            format!("Ready to {}", overview.mode.label()),
            overview_text(overview),
        )?;
        let proceed: bool = cliclack::confirm("Continue?")
            .initial_value(true)
            .interact()?;
        Ok(proceed)
    }

    fn select_orphans(&mut self, candidates: &[OrphanCandidate]) -> Result<Vec<usize>> {
        let mut multi = cliclack::multiselect("These dependencies would no longer be used. Remove them too?");
        for (index, candidate) in candidates.iter().enumerate() {
            multi = multi.item(
                index,
                format!("{} {}", candidate.kind, candidate.name),
                format!("used by {}", candidate.dependents.join(", ")),
            );
        }
        let selected: Vec<usize> = multi.required(false).interact()?;
        Ok(selected)
    }
}
