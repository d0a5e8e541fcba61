//! Source formatters.

use super::Formatter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Timeout for one formatter invocation (60 seconds, `npx` may download)
const FORMAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Formats with `npx prettier` and strips types with `npx esbuild`, run from
/// the project root so the project's own prettier config applies.
#[derive(Debug, Clone)]
pub struct NodeFormatter {
    root: PathBuf,
}

impl NodeFormatter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Check if `npx` is available in PATH
    pub fn is_available() -> bool {
        std::process::Command::new("which")
            .arg("npx")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Pipe `input` through `npx <args>` and return stdout.
    async fn run(&self, args: &[&str], input: &str) -> Result<String> {
        pipe_through("npx", args, &self.root, input, FORMAT_TIMEOUT).await
    }
}

/// Run `program` with `input` on stdin and return its stdout. Stdin is fed
/// from a separate task so a child that writes before it has read all of
/// its input cannot block on a full pipe.
async fn pipe_through(
    program: &str,
    args: &[&str],
    cwd: &Path,
    input: &str,
    limit: Duration,
) -> Result<String> {
    let command = format!("{} {}", program, args.join(" "));
    tracing::debug!(command = %command, "running formatter");

    let mut child = TokioCommand::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start `{}`", command))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stdin of `{}`", command))?;
    let bytes = input.as_bytes().to_vec();
    let writer = tokio::spawn(async move {
        let written = stdin.write_all(&bytes).await;
        drop(stdin);
        written
    });

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(output) => output.with_context(|| format!("Failed to wait for `{}`", command))?,
        Err(_) => anyhow::bail!("`{}` timed out after {} seconds", command, limit.as_secs()),
    };

    if !output.status.success() {
        anyhow::bail!(
            "`{}` failed with exit code {}: {}",
            command,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    writer
        .await
        .with_context(|| format!("Stdin writer of `{}` panicked", command))?
        .with_context(|| format!("Failed to write to `{}`", command))?;

    String::from_utf8(output.stdout).with_context(|| format!("`{}` produced invalid UTF-8", command))
}

#[async_trait]
impl Formatter for NodeFormatter {
    async fn format(&self, code: &str, is_typescript: bool) -> Result<String> {
        let file = if is_typescript { "entity.tsx" } else { "entity.jsx" };
        self.run(&["--yes", "prettier", "--stdin-filepath", file], code)
            .await
    }

    async fn convert_to_js(&self, code: &str) -> Result<String> {
        self.run(
            &[
                "--yes",
                "esbuild",
                "--loader=tsx",
                "--jsx=preserve",
                "--format=esm",
                "--log-level=error",
            ],
            code,
        )
        .await
    }
}

/// Formatter that only normalizes line endings and the trailing newline.
/// Used when no Node toolchain is available; `convert_to_js` is the identity,
/// so it suits registries whose sources are already valid JavaScript.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

#[async_trait]
impl Formatter for PlainFormatter {
    async fn format(&self, code: &str, _is_typescript: bool) -> Result<String> {
        let mut normalized = code.replace("\r\n", "\n").trim_end().to_string();
        normalized.push('\n');
        Ok(normalized)
    }

    async fn convert_to_js(&self, code: &str) -> Result<String> {
        Ok(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_formatter_normalizes_endings() {
        let formatted = PlainFormatter
            .format("const a = 1;\r\nconst b = 2;\n\n\n", true)
            .await
            .unwrap();
        assert_eq!(formatted, "const a = 1;\nconst b = 2;\n");
        assert_eq!(PlainFormatter.convert_to_js("x").await.unwrap(), "x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_input_through_a_streaming_child() {
        let dir = tempfile::tempdir().unwrap();
        // Far beyond a pipe buffer, `cat` echoes while it is still reading.
        let input = "export const a = 1;\n".repeat(50_000);
        let output = pipe_through("cat", &[], dir.path(), &input, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(output, input);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_child_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = pipe_through("sh", &["-c", "echo broken >&2; exit 3"], dir.path(), "x", Duration::from_secs(30))
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("exit code 3"), "{}", message);
        assert!(message.contains("broken"), "{}", message);
    }
}
