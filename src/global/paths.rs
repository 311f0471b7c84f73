use std::ffi::OsString;
use std::path::{Path, PathBuf};
use directories::BaseDirs;
use crate::error::ConfigError;

/// Environment variable overriding the install root. Recaf itself reads the same variable.
pub const ROOT_ENV_VAR: &str = "RECAF";

/// Key locations under the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolves the install root from `RECAF`, falling back to `<config dir>/Recaf`.
    ///
    /// * Windows: `%APPDATA%\Recaf`
    /// * macOS: `$HOME/Library/Application Support/Recaf`
    /// * Linux: `$XDG_CONFIG_HOME/Recaf` or `$HOME/.config/Recaf`
    ///
    /// # Errors
    /// Returns [`ConfigError::NoRootDirectory`] when neither source yields a directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_dir = BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf());
        root_with_env(std::env::var_os(ROOT_ENV_VAR), config_dir)
            .map(LauncherPaths::new)
            .ok_or(ConfigError::NoRootDirectory)
    }

    /// The install root, also the working directory of the launched process.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The installed application jar.
    pub fn app_jar(&self) -> PathBuf {
        self.root.join("recaf.jar")
    }

    /// Directory holding the JavaFX module jars.
    pub fn dependencies_dir(&self) -> PathBuf {
        self.root.join("dependencies")
    }

    /// Directory for launcher bookkeeping files.
    pub fn launcher_dir(&self) -> PathBuf {
        self.root.join("launcher")
    }

    /// The launcher's TOML config.
    pub fn config_file(&self) -> PathBuf {
        self.launcher_dir().join("config.toml")
    }

    /// Marker holding the id of the last installed snapshot build.
    pub fn build_marker_file(&self) -> PathBuf {
        self.launcher_dir().join("installed-build.txt")
    }

    /// Creates the root, dependency and launcher directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.dependencies_dir())?;
        std::fs::create_dir_all(self.launcher_dir())?;
        Ok(())
    }
}

fn root_with_env(env_root: Option<OsString>, config_dir: Option<PathBuf>) -> Option<PathBuf> {
    env_root
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
        .or_else(|| config_dir.map(|dir| dir.join("Recaf")))
}
