//! npm package installation through the project's package manager.

use super::PackageManager;
use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Timeout for one install/remove run (5 minutes)
const PACKAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Package manager binaries, detected from lockfiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
    Bun,
    Pnpm,
    Yarn,
    Npm,
}

impl PackageTool {
    /// Detect from the lockfile in `root`, defaulting to npm.
    pub fn detect(root: &Path) -> Self {
        if root.join("bun.lockb").is_file() || root.join("bun.lock").is_file() {
            PackageTool::Bun
        } else if root.join("pnpm-lock.yaml").is_file() {
            PackageTool::Pnpm
        } else if root.join("yarn.lock").is_file() {
            PackageTool::Yarn
        } else {
            PackageTool::Npm
        }
    }

    pub fn binary(&self) -> &'static str {
        match self {
            PackageTool::Bun => "bun",
            PackageTool::Pnpm => "pnpm",
            PackageTool::Yarn => "yarn",
            PackageTool::Npm => "npm",
        }
    }

    fn add_command(&self) -> &'static str {
        match self {
            PackageTool::Npm => "install",
            _ => "add",
        }
    }

    fn remove_command(&self) -> &'static str {
        match self {
            PackageTool::Npm => "uninstall",
            _ => "remove",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

/// Names listed under `dependencies` and `devDependencies` of the
/// project's package.json. A missing file yields an empty set.
pub fn read_package_dependencies(root: &Path) -> Result<BTreeSet<String>> {
    let path = root.join("package.json");
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let manifest: PackageJson = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(manifest
        .dependencies
        .into_keys()
        .chain(manifest.dev_dependencies.into_keys())
        .collect())
}

/// Default `PackageManager`: shells out to bun, pnpm, yarn or npm.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePackageManager;

impl NodePackageManager {
    async fn run(root: &Path, tool: PackageTool, args: &[String]) -> Result<()> {
        let cmd = format!("{} {}", tool.binary(), args.join(" "));
        println!();
        println!("{} {}", "Running:".dimmed(), cmd.yellow());
        println!();

        let mut child = TokioCommand::new(tool.binary())
            .args(args)
            .current_dir(root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start `{}`", cmd))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr"))?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();
        let mut stderr_open = true;

        let output_task = async {
            loop {
                tokio::select! {
                    line = stdout_reader.next_line() => {
                        match line {
                            Ok(Some(line)) => println!("  {}", line),
                            Ok(None) => break,
                            Err(e) => {
                                eprintln!("{} {}", "Error reading stdout:".red(), e);
                                break;
                            }
                        }
                    }
                    line = stderr_reader.next_line(), if stderr_open => {
                        match line {
                            Ok(Some(line)) => eprintln!("  {}", line.yellow()),
                            Ok(None) => stderr_open = false,
                            Err(e) => {
                                eprintln!("{} {}", "Error reading stderr:".red(), e);
                                stderr_open = false;
                            }
                        }
                    }
                }
            }
        };

        if timeout(PACKAGE_TIMEOUT, output_task).await.is_err() {
            let _ = child.kill().await;
            anyhow::bail!(
                "`{}` timed out after {} seconds",
                cmd,
                PACKAGE_TIMEOUT.as_secs()
            );
        }

        match timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => anyhow::bail!(
                "`{}` failed with exit code: {}",
                cmd,
                status.code().unwrap_or(-1)
            ),
            Ok(Err(e)) => anyhow::bail!("Failed to wait for `{}`: {}", cmd, e),
            Err(_) => {
                let _ = child.kill().await;
                anyhow::bail!("`{}` hung after closing its output", cmd)
            }
        }
    }
}

#[async_trait]
impl PackageManager for NodePackageManager {
    fn existing(&self, root: &Path) -> Result<BTreeSet<String>> {
        read_package_dependencies(root)
    }

    async fn install(&self, root: &Path, packages: &[String], dry_run: bool) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let tool = PackageTool::detect(root);
        let mut args = vec![tool.add_command().to_string()];
        args.extend(packages.iter().cloned());

        if dry_run {
            println!(
                "{} {} {}",
                "Would run:".dimmed(),
                tool.binary().yellow(),
                args.join(" ").yellow()
            );
            return Ok(());
        }
        Self::run(root, tool, &args).await
    }

    async fn uninstall(&self, root: &Path, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let tool = PackageTool::detect(root);
        let mut args = vec![tool.remove_command().to_string()];
        args.extend(packages.iter().cloned());
        Self::run(root, tool, &args).await
    }
}
