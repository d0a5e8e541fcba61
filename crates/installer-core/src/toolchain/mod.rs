//! Collaborators the engine calls but does not implement: formatting,
//! import scanning and npm package management.

pub mod formatter;
pub mod packages;
pub mod scanner;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;

pub use formatter::{NodeFormatter, PlainFormatter};
pub use packages::{read_package_dependencies, NodePackageManager, PackageTool};
pub use scanner::{package_name, RegexImportScanner};

/// Placeholder prefix registry sources use to import components
pub const COMPONENTS_PLACEHOLDER: &str = "$components";

/// Placeholder prefix registry sources use to import utils
pub const UTILS_PLACEHOLDER: &str = "$utils";

#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, code: &str, is_typescript: bool) -> Result<String>;

    /// Strip TypeScript syntax, keeping JSX.
    async fn convert_to_js(&self, code: &str) -> Result<String>;
}

pub trait ImportScanner: Send + Sync {
    /// External package names imported by `code`, deduplicated. Specifiers
    /// equal to or under one of `local_aliases` are project files, not
    /// packages.
    fn imports(&self, code: &str, local_aliases: &[&str]) -> Vec<String>;

    /// Imports under `alias_path`. With `as_ids` only the trailing names are
    /// returned (extension stripped), otherwise the full specifiers.
    fn placeholder_imports(&self, code: &str, alias_path: &str, as_ids: bool) -> Vec<String>;
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Packages the project already depends on.
    fn existing(&self, root: &Path) -> Result<BTreeSet<String>>;

    async fn install(&self, root: &Path, packages: &[String], dry_run: bool) -> Result<()>;

    async fn uninstall(&self, root: &Path, packages: &[String]) -> Result<()>;
}

/// The set of collaborators one engine run uses.
pub struct Toolchain {
    pub formatter: Box<dyn Formatter>,
    pub scanner: Box<dyn ImportScanner>,
    pub packages: Box<dyn PackageManager>,
}

impl Toolchain {
    pub fn new(
        formatter: Box<dyn Formatter>,
        scanner: Box<dyn ImportScanner>,
        packages: Box<dyn PackageManager>,
    ) -> Self {
        Self {
            formatter,
            scanner,
            packages,
        }
    }

    /// Node-based collaborators for a project at `root`. Falls back to the
    /// plain formatter when `npx` is not installed.
    pub fn node(root: &Path) -> Self {
        let formatter: Box<dyn Formatter> = if NodeFormatter::is_available() {
            Box::new(NodeFormatter::new(root.to_path_buf()))
        } else {
            tracing::warn!("npx not found, installed files will not be formatted");
            Box::new(PlainFormatter)
        };
        Self::new(
            formatter,
            Box::new(RegexImportScanner),
            Box::new(NodePackageManager),
        )
    }
}
