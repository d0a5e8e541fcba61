//! Product configuration trait for CLI binaries
//!
//! This trait defines what a binary built on this library must provide: its
//! identity, where project state and the cache live, and how registries are
//! reached.

use std::path::PathBuf;

/// Configuration trait for CLI products
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// File name of the project config at the project root
    fn config_file_name(&self) -> &'static str;

    /// Registry used when a project has none configured yet
    fn default_registry(&self) -> &'static str;

    /// Environment variable overriding the cache directory
    fn cache_dir_env(&self) -> &'static str;

    /// Environment variable holding a bearer token for registry requests
    fn token_env(&self) -> &'static str;

    /// URL for product documentation
    fn docs_url(&self) -> &'static str;

    /// CLI description shown in help text
    fn cli_description(&self) -> &'static str;

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }

    /// Cache root: the override variable if set, else `~/.<name>/cache`.
    fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os(self.cache_dir_env()) {
            return PathBuf::from(dir);
        }
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join(format!(".{}", self.name()))
            .join("cache")
    }

    /// Extra headers sent with every registry request.
    fn registry_headers(&self) -> Vec<(String, String)> {
        match std::env::var(self.token_env()) {
            Ok(token) if !token.trim().is_empty() => vec![(
                "Authorization".to_string(),
                format!("Bearer {}", token.trim()),
            )],
            _ => Vec::new(),
        }
    }
}
