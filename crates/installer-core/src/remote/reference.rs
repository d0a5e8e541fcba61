//! Registry reference parsing.
//!
//! A reference is stored exactly as the user typed it and is only ever
//! resolved on demand, together with the file wanted from the registry.
//! Shapes are tried in order:
//!
//! 1. GitHub shorthand `owner/repo@branch`
//! 2. `http://` or `https://` URL
//! 3. Bare domain (`registry.example.com/ui`), coerced to `https://`
//! 4. Absolute Unix path or Windows drive path

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

static GITHUB_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<owner>[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/(?P<repo>[A-Za-z0-9._-]+)@(?P<branch>[A-Za-z0-9._/-]+)$",
    )
    .expect("valid regex")
});

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("valid regex"));

static BARE_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}(?::\d+)?(?:/\S*)?$")
        .expect("valid regex")
});

static FILESYSTEM_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:/|[A-Za-z]:[\\/])").expect("valid regex"));

/// How a resolved location is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// HTTP GET
    Url,
    /// Filesystem read
    Local,
}

/// A reference resolved against one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub url: String,
    pub kind: LocationKind,
}

impl RemoteLocation {
    fn unresolved() -> Self {
        Self {
            url: String::new(),
            kind: LocationKind::Url,
        }
    }

    /// An empty url means the reference could not be resolved.
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// Resolve `reference` to the location of `target_file` inside it.
///
/// Returns an empty url (kind `Url`) when the reference matches no shape.
pub fn format_remote_url(reference: &str, target_file: &str) -> RemoteLocation {
    let reference = reference.trim();
    let target_file = target_file.trim_start_matches(['/', '\\']);

    if let Some(caps) = GITHUB_SHORTHAND.captures(reference) {
        let base = format!(
            "https://raw.githubusercontent.com/{}/{}/{}/",
            &caps["owner"], &caps["repo"], &caps["branch"]
        );
        return remote(&base, target_file);
    }

    if HTTP_URL.is_match(reference) {
        return remote(reference, target_file);
    }

    if BARE_DOMAIN.is_match(reference) {
        return remote(&format!("https://{}", reference), target_file);
    }

    if FILESYSTEM_PATH.is_match(reference) {
        let mut path = PathBuf::from(reference);
        for segment in target_file.split(['/', '\\']).filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        return RemoteLocation {
            url: path.to_string_lossy().into_owned(),
            kind: LocationKind::Local,
        };
    }

    RemoteLocation::unresolved()
}

/// Append the target file's segments to a base URL, preserving any query
/// parameters on the base.
fn remote(base: &str, target_file: &str) -> RemoteLocation {
    let Ok(mut url) = Url::parse(base) else {
        return RemoteLocation::unresolved();
    };
    {
        let Ok(mut segments) = url.path_segments_mut() else {
            return RemoteLocation::unresolved();
        };
        segments.pop_if_empty();
        for segment in target_file.split(['/', '\\']).filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }
    RemoteLocation {
        url: url.to_string(),
        kind: LocationKind::Url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_shorthand_resolves_to_raw_content() {
        let location = format_remote_url("acme/ui-kit@main", "registry.json");
        assert_eq!(location.kind, LocationKind::Url);
        assert_eq!(
            location.url,
            "https://raw.githubusercontent.com/acme/ui-kit/main/registry.json"
        );
    }

    #[test]
    fn explicit_url_keeps_query() {
        let location =
            format_remote_url("https://example.com/registry/?token=abc", "src/button.tsx");
        assert_eq!(
            location.url,
            "https://example.com/registry/src/button.tsx?token=abc"
        );
    }

    #[test]
    fn bare_domain_is_coerced_to_https() {
        let location = format_remote_url("registry.example.com/ui", "registry.json");
        assert_eq!(location.url, "https://registry.example.com/ui/registry.json");
        assert_eq!(location.kind, LocationKind::Url);
    }

    #[test]
    fn dotted_owner_is_not_github() {
        let location = format_remote_url("example.com/ui@v2", "registry.json");
        assert_eq!(location.url, "https://example.com/ui@v2/registry.json");
    }

    #[test]
    fn unix_path_is_local() {
        let location = format_remote_url("/srv/registry", "components/button.tsx");
        assert_eq!(location.kind, LocationKind::Local);
        assert_eq!(
            PathBuf::from(&location.url),
            PathBuf::from("/srv/registry/components/button.tsx")
        );
    }

    #[test]
    fn windows_drive_path_is_local() {
        let location = format_remote_url("C:\\registry", "registry.json");
        assert_eq!(location.kind, LocationKind::Local);
        assert!(location.url.ends_with("registry.json"));
    }

    #[test]
    fn unknown_shape_is_empty() {
        let location = format_remote_url("not a registry", "registry.json");
        assert!(location.is_empty());
        assert_eq!(location.kind, LocationKind::Url);
        assert!(format_remote_url("relative/dir", "registry.json").is_empty());
    }
}
