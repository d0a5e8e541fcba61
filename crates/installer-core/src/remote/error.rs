//! Registry fetch error types.

/// Errors that can occur while reaching a registry.
///
/// None of these are fatal to an engine run: callers of the public `Remote`
/// getters only ever see `None` and a logged warning.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Reference matched none of the supported shapes.
    #[error("'{0}' is not a GitHub reference, URL or absolute path")]
    InvalidReference(String),

    /// Registry requires credentials.
    #[error("unauthorized: {url} (set a registry token and retry)")]
    Unauthorized { url: String },

    /// File missing at the registry.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Any other non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Transport failure.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Local registry read failure.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Manifest failed validation.
    #[error("invalid registry manifest: {0}")]
    InvalidManifest(#[from] ManifestError),
}

/// Structural problems with a registry manifest.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("missing or invalid 'version' field")]
    MissingVersion,

    #[error("manifest version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("missing 'paths.{0}' entry")]
    MissingPath(&'static str),

    #[error("registry '{0}' is disabled")]
    Disabled(String),
}
