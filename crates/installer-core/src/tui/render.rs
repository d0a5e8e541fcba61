//! Plain-text views of an overview and a report

use crate::components::{ItemReport, Outcome, Overview, PlannedAction, PlannedItem, Report};
use anyhow::Result;
use colored::Colorize;

fn action_label(action: &PlannedAction) -> String {
    match action {
        PlannedAction::Install => "install".to_string(),
        PlannedAction::Overwrite => "overwrite".to_string(),
        PlannedAction::Update { from } => format!("update from {}", from),
        PlannedAction::Repair => "repair".to_string(),
        PlannedAction::Keep => "keep".to_string(),
        PlannedAction::Remove => "remove".to_string(),
    }
}

fn planned_line(item: &PlannedItem) -> String {
    let version = if item.version.is_empty() {
        String::new()
    } else {
        format!("@{}", item.version)
    };
    let id = if item.id != item.name {
        format!(" ({})", item.id)
    } else {
        String::new()
    };
    format!(
        "  {} {}{}{}  {}",
        item.kind,
        item.name,
        id,
        version,
        action_label(&item.action)
    )
}

/// Body of the confirmation note.
pub fn overview_text(overview: &Overview) -> String {
    let mut lines = Vec::new();
    if !overview.requested.is_empty() {
        lines.push("Requested:".to_string());
        lines.extend(overview.requested.iter().map(planned_line));
    }
    if !overview.dependencies.is_empty() {
        lines.push("Dependencies:".to_string());
        lines.extend(overview.dependencies.iter().map(planned_line));
    }
    if !overview.packages_to_install.is_empty() {
        lines.push(format!(
            "Packages to install: {}",
            overview.packages_to_install.join(", ")
        ));
    }
    if !overview.packages_to_remove.is_empty() {
        lines.push(format!(
            "Packages to remove: {}",
            overview.packages_to_remove.join(", ")
        ));
    }
    if !overview.blocked.is_empty() {
        lines.push("Kept (still in use):".to_string());
        for blocked in &overview.blocked {
            lines.push(format!(
                "  {} {}  used by {}",
                blocked.kind,
                blocked.name,
                blocked.dependents.join(", ")
            ));
        }
    }
    lines.join("\n")
}

fn outcome_text(item: &ItemReport) -> String {
    let text = match &item.outcome {
        Outcome::Installed { version } => format!("installed {}", version),
        Outcome::Updated { from, to } => format!("updated {} -> {}", from, to),
        Outcome::Repaired { version } => format!("repaired {}", version),
        Outcome::AlreadyInstalled => "already installed".to_string(),
        Outcome::UpToDate => "up to date".to_string(),
        Outcome::Removed => "removed".to_string(),
        Outcome::Planned(action) => format!("would {}", action_label(action)),
        Outcome::Skipped(reason) => format!("skipped: {}", reason),
        Outcome::Blocked { dependents } => format!("kept, used by {}", dependents.join(", ")),
        Outcome::Failed(reason) => format!("failed: {}", reason),
    };
    if item.is_incomplete() {
        format!("{} (incomplete, missing {})", text, item.missing.join(", "))
    } else {
        text
    }
}

/// One uncolored line per item, in report order.
pub fn report_lines(report: &Report) -> Vec<String> {
    report
        .items
        .iter()
        .map(|item| format!("{} {}: {}", item.kind, item.name, outcome_text(item)))
        .collect()
}

/// Write the report through cliclack, one log line per item and warning.
pub fn print_report(report: &Report) -> Result<()> {
    if report.cancelled {
        cliclack::log::warning(format!("{} cancelled, nothing was changed", report.mode.label()))?;
        return Ok(());
    }

    for (item, line) in report.items.iter().zip(report_lines(report)) {
        match &item.outcome {
            Outcome::Failed(_) => cliclack::log::error(line.red())?,
            Outcome::Skipped(_) | Outcome::Blocked { .. } => {
                cliclack::log::warning(line.yellow())?
            }
            _ if item.is_incomplete() => cliclack::log::warning(line.yellow())?,
            Outcome::AlreadyInstalled | Outcome::UpToDate | Outcome::Planned(_) => {
                cliclack::log::info(line)?
            }
            _ => cliclack::log::success(line.green())?,
        }
    }

    if !report.packages_installed.is_empty() {
        let verb = if report.dry_run { "Would install" } else { "Installed" };
        cliclack::log::step(format!(
            "{} packages: {}",
            verb,
            report.packages_installed.join(", ")
        ))?;
    }
    if !report.packages_removed.is_empty() {
        let verb = if report.dry_run { "Would remove" } else { "Removed" };
        cliclack::log::step(format!(
            "{} packages: {}",
            verb,
            report.packages_removed.join(", ")
        ))?;
    }

    // Item skips are already shown above.
    for warning in report
        .warnings
        .iter()
        .filter(|w| !report.items.iter().any(|i| w.message == skip_reason(i)))
    {
        cliclack::log::remark(warning.to_string().dimmed())?;
    }
    Ok(())
}

fn skip_reason(item: &ItemReport) -> &str {
    match &item.outcome {
        Outcome::Skipped(reason) => reason,
        _ => "",
    }
}
