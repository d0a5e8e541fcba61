//! Version comparison for installed entities and project config compatibility

use anyhow::Result;
use semver::Version;

/// Compare the running CLI version against the version that last wrote the
/// project config. Returns a warning message if the CLI is older.
pub fn check_compatibility(
    cli_version: &str,
    config_version: &str,
    upgrade_command: &str,
) -> Option<String> {
    let cli_ver = parse_version(cli_version).ok()?;
    let config_ver = parse_version(config_version).ok()?;

    if cli_ver < config_ver {
        Some(format!(
            "Warning: This project was configured with CLI version {} or newer.\n\
             You are running version {}.\n\
             Consider updating: {}",
            config_version, cli_version, upgrade_command
        ))
    } else {
        None
    }
}

/// Parse version string, tolerating a leading 'v'
pub fn parse_version(version_str: &str) -> Result<Version> {
    let cleaned = version_str.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned).map_err(|e| anyhow::anyhow!("Invalid version '{}': {}", version_str, e))
}

/// Whether `local` is current with respect to `remote`: the remote version is
/// not strictly greater. An unparseable local version is never current; an
/// unparseable remote version offers nothing to update to.
pub fn is_up_to_date(local: &str, remote: &str) -> bool {
    let Ok(remote_ver) = parse_version(remote) else {
        return true;
    };
    match parse_version(local) {
        Ok(local_ver) => remote_ver <= local_ver,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_older_than_config() {
        let warning = check_compatibility("0.1.0", "0.2.0", "cargo install uikit-tools --force");
        assert!(warning.is_some());
        assert!(warning.unwrap().contains("0.2.0"));
    }

    #[test]
    fn test_cli_same_as_config() {
        assert!(check_compatibility("0.1.0", "0.1.0", "upgrade").is_none());
    }

    #[test]
    fn test_cli_newer_than_config() {
        assert!(check_compatibility("0.2.0", "v0.1.0", "upgrade").is_none());
    }

    #[test]
    fn test_invalid_versions() {
        assert!(check_compatibility("invalid", "0.1.0", "upgrade").is_none());
    }

    #[test]
    fn test_up_to_date() {
        assert!(is_up_to_date("1.0.0", "1.0.0"));
        assert!(is_up_to_date("1.2.0", "1.1.9"));
        assert!(!is_up_to_date("1.0.0", "1.0.1"));
        assert!(!is_up_to_date("garbage", "1.0.0"));
        assert!(is_up_to_date("1.0.0", "garbage"));
    }
}
