use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::error::ConfigError;
use crate::global::cache::CacheLimits;

/// Represents the contents of the launcher's `config.toml`.
///
/// Every field has a default, so partial files are fine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LauncherConfig {
    /// Java executable to launch with, instead of the one found through `JAVA_HOME`.
    pub java_executable: Option<PathBuf>,
    /// Launch even when the cached JavaFX has compatibility problems.
    pub allow_dependency_problems: bool,
    /// Only install snapshot builds of this branch.
    pub snapshot_branch: Option<String>,
    pub cache: CacheLimits,
    pub launch: LaunchConfig,
    pub network: NetworkConfig,
}

/// Process launch settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LaunchConfig {
    /// Seconds after which a still-running process counts as started. `0` disables the check.
    pub grace_seconds: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self { grace_seconds: 5 }
    }
}

impl LaunchConfig {
    pub fn grace_period(&self) -> Option<Duration> {
        (self.grace_seconds > 0).then(|| Duration::from_secs(self.grace_seconds))
    }
}

/// HTTP client settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl LauncherConfig {
    /// Loads the config at `path`, falling back to defaults when it is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> LauncherConfig {
        let path = path.as_ref();
        let Ok(content) = std::fs::read_to_string(path) else {
            return LauncherConfig::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid config '{}': {}", path.display(), e);
                LauncherConfig::default()
            }
        }
    }

    /// Saves the config to the given file path in pretty TOML format.
    ///
    /// # Errors
    /// Returns an error if the file can't be written or serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let toml_str = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
