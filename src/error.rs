use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to a remote host.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error during transfer: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Why no installed application version could be read.
#[derive(Debug, Error)]
pub enum InstallationError {
    #[error("Recaf jar file not found: '{0}'")]
    Missing(PathBuf),

    #[error("Recaf build config is not present in '{0}', the launcher only supports Recaf 4+")]
    MissingBuildInfo(PathBuf),

    #[error("Could not read the build config entry of '{path}': {reason}")]
    UnreadableBuildInfo { path: PathBuf, reason: String },

    #[error("Invalid build config model in '{path}': {reason}")]
    InvalidBuildInfo { path: PathBuf, reason: String },
}

/// Failures probing a Java runtime.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Could not run '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read bundled JavaFX info: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("Could not parse version from '{0}'")]
    Unparseable(String),
}

/// Configuration and directory lookup failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine a home for Recaf, set the RECAF environment variable")]
    NoRootDirectory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
