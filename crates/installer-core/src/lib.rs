//! Installer Core - Shared library for registry component installers
//!
//! This library resolves UI components and utils published in remote (or
//! local) registries, transforms their sources for the consumer project and
//! keeps the project's config file in sync with what is installed. It is
//! designed to be used by CLI binaries that differ only in their
//! `ProductConfig`.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Storage and transport** - `RegistryCache`, `Remote`, `Project`
//! - **Layer 2: Engine** - `Components` (install, update, repair, uninstall),
//!   driven through the `Decider` trait and the `Toolchain` collaborators
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based `PromptDecider` and report rendering
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use installer_core::{AutoDecider, Components, Options, Project, Remote, Request, Toolchain};
//!
//! let mut project = Project::from_config(&MyConfig, root.clone(), CLI_VERSION);
//! let mut remote = Remote::from_config(&MyConfig);
//! let toolchain = Toolchain::node(&root);
//! let mut decider = AutoDecider::new(true);
//!
//! let report = Components::new(&mut project, &mut remote, &toolchain, &mut decider, Options::default())
//!     .install(&[Request::component("button")])
//!     .await?;
//! ```

pub mod cache;
pub mod components;
pub mod decision;
pub mod entity;
pub mod integrity;
pub mod product;
pub mod project;
pub mod remote;
pub mod toolchain;
pub mod version;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use cache::RegistryCache;
pub use components::{Components, Options, Outcome, Overview, Report, Request, Target};
pub use decision::{AutoDecider, Decider};
pub use entity::{EntityKind, SourceFormat};
pub use product::ProductConfig;
pub use project::{InstallStatus, Project, ProjectConfig, ValidationResult};
pub use remote::{RegistryManifest, Remote, RemoteError};
pub use toolchain::Toolchain;

#[cfg(feature = "tui")]
pub use tui::PromptDecider;

/// CLI version - used for config compatibility checking
/// Each binary should define its own version, but this provides a fallback
pub const DEFAULT_CLI_VERSION: &str = "0.1.0";
