//! uikit CLI - Install UI components and utils from registries

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use installer_core::components::Outcome;
use installer_core::tui::{print_report, PromptDecider};
use installer_core::{
    AutoDecider, Components, Decider, EntityKind, Options, ProductConfig, Project, RegistryCache,
    Remote, Report, Request, Target, Toolchain,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// uikit product configuration
#[derive(Clone)]
pub struct UikitConfig;

impl ProductConfig for UikitConfig {
    fn name(&self) -> &'static str {
        "uikit"
    }

    fn display_name(&self) -> &'static str {
        "uikit"
    }

    fn config_file_name(&self) -> &'static str {
        "uikit.json"
    }

    fn default_registry(&self) -> &'static str {
        "https://registry.uikit.dev"
    }

    fn cache_dir_env(&self) -> &'static str {
        "UIKIT_CACHE_DIR"
    }

    fn token_env(&self) -> &'static str {
        "UIKIT_REGISTRY_TOKEN"
    }

    fn docs_url(&self) -> &'static str {
        "https://uikit.dev/docs"
    }

    fn cli_description(&self) -> &'static str {
        "CLI for installing UI components and utils from registries"
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install uikit-tools --force"
    }
}

#[derive(Parser, Debug)]
#[command(name = "uikit")]
#[command(about = "CLI for installing UI components and utils from registries")]
#[command(version)]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Log engine details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install components (or utils) and their dependencies
    Add(AddArgs),
    /// Update installed entities to the registry's current version
    Update(TargetArgs),
    /// Re-fetch and rewrite installed entities
    Repair(TargetArgs),
    /// Uninstall entities no other installed entity depends on
    Remove(TargetArgs),
    /// List installed entities and untracked files
    List,
    /// Check the project configuration
    Validate,
    /// Manage configured registries
    #[command(subcommand)]
    Registry(RegistryCommand),
    /// Manage the local registry cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct EngineFlags {
    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,

    /// Overwrite untracked or modified files
    #[arg(short, long)]
    pub force: bool,

    /// Do not install or remove npm packages
    #[arg(long = "skip-package")]
    pub skip_package: bool,

    /// Show what would change without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Operate on utils instead of components
    #[arg(long)]
    pub util: bool,
}

impl EngineFlags {
    fn kind(&self) -> EntityKind {
        if self.util {
            EntityKind::Util
        } else {
            EntityKind::Component
        }
    }
}

impl From<EngineFlags> for Options {
    fn from(flags: EngineFlags) -> Self {
        Options {
            yes: flags.yes,
            force: flags.force,
            skip_package: flags.skip_package,
            dry_run: flags.dry_run,
        }
    }
}

#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Registry ids, optionally with a version requirement (button@^1.2)
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Registry to install from (defaults to the project's first registry)
    #[arg(short, long)]
    pub registry: Option<String>,

    /// Local name to install under (single id only)
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub flags: EngineFlags,
}

#[derive(Parser, Debug)]
pub struct TargetArgs {
    /// Local names (all installed entities when omitted, except for remove)
    pub names: Vec<String>,

    #[command(flatten)]
    pub flags: EngineFlags,
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Add a registry (the default registry when omitted)
    Add { reference: Option<String> },
    /// Remove a registry
    Remove { reference: String },
    /// List configured registries
    List,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete every cached registry file
    Clear,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("UIKIT_LOG").unwrap_or_else(|_| EnvFilter::new("error"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `button@^1.2` -> (`button`, `^1.2`)
fn split_requirement(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('@') {
        Some((id, requirement)) if !id.is_empty() && !requirement.is_empty() => {
            (id, Some(requirement))
        }
        _ => (raw, None),
    }
}

fn add_requests(args: &AddArgs) -> Result<Vec<Request>> {
    if args.name.is_some() && args.ids.len() > 1 {
        anyhow::bail!("--name can only be used with a single id");
    }
    Ok(args
        .ids
        .iter()
        .map(|raw| {
            let (id, requirement) = split_requirement(raw);
            let mut request = Request::new(args.flags.kind(), id);
            if let Some(registry) = &args.registry {
                request = request.from_registry(registry);
            }
            if let Some(requirement) = requirement {
                request = request.at_version(requirement);
            }
            if let Some(name) = &args.name {
                request = request.named(name);
            }
            request
        })
        .collect())
}

/// Fail the command when the project configuration is unusable.
fn ensure_valid(project: &mut Project) -> Result<()> {
    let result = project.validate();
    if !result.is_passed() {
        cliclack::log::error(result.message())?;
        anyhow::bail!("Invalid project configuration: {}", project.config_path().display());
    }
    if let Some(warning) = project.compatibility_warning(UikitConfig.upgrade_command()) {
        cliclack::log::warning(format!(
            "Version warning: {}",
            warning.lines().next().unwrap_or(&warning)
        ))?;
    }
    Ok(())
}

async fn run_engine(config: &UikitConfig, root: PathBuf, command: Command) -> Result<()> {
    let mut project = Project::from_config(config, root.clone(), CLI_VERSION);
    ensure_valid(&mut project)?;

    let flags = match &command {
        Command::Add(args) => args.flags,
        Command::Update(args) | Command::Repair(args) | Command::Remove(args) => args.flags,
        _ => return Ok(()),
    };

    let mut remote = Remote::from_config(config);
    remote.set_default_registry(project.config()?.default_registry().map(str::to_string));
    let toolchain = Toolchain::node(&root);
    let mut auto = AutoDecider::new(flags.yes);
    let mut prompts = PromptDecider::new();
    let decider: &mut dyn Decider = if flags.yes { &mut auto } else { &mut prompts };

    let mut engine = Components::new(
        &mut project,
        &mut remote,
        &toolchain,
        decider,
        flags.into(),
    );

    let report = match command {
        Command::Add(args) => engine.install(&add_requests(&args)?).await?,
        Command::Update(args) => {
            let targets = targets(&mut engine, flags, &args.names)?;
            engine.update(&targets).await?
        }
        Command::Repair(args) => {
            let targets = targets(&mut engine, flags, &args.names)?;
            engine.repair(&targets).await?
        }
        Command::Remove(args) => {
            if args.names.is_empty() {
                anyhow::bail!("Name at least one entity to remove");
            }
            let targets = targets(&mut engine, flags, &args.names)?;
            engine.uninstall(&targets).await?
        }
        _ => return Ok(()),
    };

    finish(&report)
}

/// Named targets, or every installed entity of the kind when none are named.
fn targets(engine: &mut Components<'_>, flags: EngineFlags, names: &[String]) -> Result<Vec<Target>> {
    if names.is_empty() {
        return engine.installed_targets(flags.kind());
    }
    Ok(names
        .iter()
        .map(|name| Target::new(flags.kind(), name.trim()))
        .collect())
}

fn finish(report: &Report) -> Result<()> {
    print_report(report)?;
    let failed = report
        .items
        .iter()
        .filter(|item| matches!(item.outcome, Outcome::Failed(_)))
        .count();
    if failed > 0 {
        anyhow::bail!("{} of {} entities failed", failed, report.items.len());
    }
    if report.cancelled {
        cliclack::outro_cancel("Cancelled")?;
    } else {
        cliclack::outro("Done")?;
    }
    Ok(())
}

fn list(config: &UikitConfig, root: PathBuf) -> Result<()> {
    let mut project = Project::from_config(config, root, CLI_VERSION);
    ensure_valid(&mut project)?;

    for kind in [EntityKind::Component, EntityKind::Util] {
        let entities = project.config()?.entities(kind).clone();
        if entities.is_empty() {
            cliclack::log::info(format!("No {}s installed", kind))?;
            continue;
        }
        let mut lines = Vec::new();
        for (name, entity) in &entities {
            let drift = if project.verify_integrity(kind, name) {
                ""
            } else {
                "  (modified or missing)"
            };
            lines.push(format!(
                "{}  {}@{}  {}{}",
                name, entity.id, entity.version, entity.registry, drift
            ));
        }
        cliclack::note(format!("Installed {}s", kind), lines.join("\n"))?;
    }

    let untracked = project.untracked_files()?;
    if !untracked.is_empty() {
        let lines: Vec<String> = untracked
            .iter()
            .map(|(kind, path)| format!("{} {}", kind, path.display()))
            .collect();
        cliclack::note("Untracked files", lines.join("\n"))?;
    }
    Ok(())
}

fn registry(config: &UikitConfig, root: PathBuf, command: RegistryCommand) -> Result<()> {
    let mut project = Project::from_config(config, root, CLI_VERSION);
    match command {
        RegistryCommand::Add { reference } => {
            let reference = reference.unwrap_or_else(|| config.default_registry().to_string());
            if project.add_registry(&reference)? {
                cliclack::log::success(format!("Added registry {}", reference))?;
            } else {
                cliclack::log::info(format!("{} is already configured", reference))?;
            }
        }
        RegistryCommand::Remove { reference } => {
            if project.remove_registry(&reference)? {
                cliclack::log::success(format!("Removed registry {}", reference))?;
            } else {
                cliclack::log::warning(format!("{} is not configured", reference))?;
            }
        }
        RegistryCommand::List => {
            let registries = project.config()?.registries.clone();
            if registries.is_empty() {
                cliclack::log::info("No registries configured")?;
            }
            for (index, reference) in registries.iter().enumerate() {
                let marker = if index == 0 { " (default)" } else { "" };
                cliclack::log::info(format!("{}{}", reference, marker))?;
            }
        }
    }
    Ok(())
}

async fn run(config: &UikitConfig, cli: Cli) -> Result<()> {
    let root = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    tracing::debug!(root = %root.display(), version = CLI_VERSION, "starting");
    cliclack::intro(config.display_name())?;

    match cli.command {
        Command::List => list(config, root),
        Command::Validate => {
            let mut project = Project::from_config(config, root, CLI_VERSION);
            ensure_valid(&mut project)?;
            cliclack::outro(project.validate().message())?;
            Ok(())
        }
        Command::Registry(command) => registry(config, root, command),
        Command::Cache(CacheCommand::Clear) => {
            let removed = RegistryCache::clear(&config.cache_dir())?;
            cliclack::outro(format!("Removed {} cached registries", removed))?;
            Ok(())
        }
        command => run_engine(config, root, command).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(&UikitConfig, cli).await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_version_requirements() {
        assert_eq!(split_requirement("button@^1.2"), ("button", Some("^1.2")));
        assert_eq!(split_requirement("button"), ("button", None));
        assert_eq!(split_requirement("button@"), ("button@", None));
    }

    #[test]
    fn parses_add_flags() {
        let cli = Cli::parse_from([
            "uikit", "add", "button@1", "card", "--util", "--yes", "--registry", "./registry",
        ]);
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        let requests = add_requests(&args).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, EntityKind::Util);
        assert_eq!(requests[0].version.as_deref(), Some("1"));
        assert_eq!(requests[1].registry.as_deref(), Some("./registry"));
        assert!(Options::from(args.flags).yes);
    }

    #[test]
    fn name_needs_single_id() {
        let cli = Cli::parse_from(["uikit", "add", "button", "card", "--name", "fancy"]);
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert!(add_requests(&args).is_err());
    }
}
