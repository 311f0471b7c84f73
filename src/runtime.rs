use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use crate::error::ProbeError;
use crate::version::FxVersion;

/// What the launcher needs to know about a Java runtime.
pub trait RuntimeProbe {
    /// Feature release of the runtime (`8`, `17`, `21`...), `None` if it could not be determined.
    fn major_version(&self) -> Option<u32>;

    /// The JavaFX version bundled with the runtime, if it ships one.
    fn bundled_dependency_version(&self) -> Result<Option<FxVersion>, ProbeError>;
}

/// A Java installation, identified by its `java` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaInstall {
    executable: PathBuf,
}

impl JavaInstall {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }

    /// The executable inside a runtime home: `<home>/bin/java`.
    pub fn from_home<P: AsRef<Path>>(home: P) -> Self {
        let name = if cfg!(windows) { "java.exe" } else { "java" };
        Self::new(home.as_ref().join("bin").join(name))
    }

    /// `$JAVA_HOME/bin/java` when `JAVA_HOME` is set, otherwise `java` from the `PATH`.
    pub fn default_for_launcher() -> Self {
        match std::env::var_os("JAVA_HOME").filter(|home| !home.is_empty()) {
            Some(home) => Self::from_home(PathBuf::from(home)),
            None => Self::new("java"),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The runtime home, when the executable sits in a `bin` directory.
    pub fn home(&self) -> Option<PathBuf> {
        let bin = self.executable.parent()?;
        if bin.file_name()? != "bin" {
            return None;
        }
        bin.parent().map(Path::to_path_buf)
    }

    /// Runs `java -version` and returns the quoted version string it prints.
    pub fn query_version(&self) -> Result<String, ProbeError> {
        let output = Command::new(&self.executable)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ProbeError::Spawn {
                path: self.executable.clone(),
                source,
            })?;
        // The banner goes to stderr, but some wrappers print it to stdout.
        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        parse_java_version_output(&text).ok_or(ProbeError::Unparseable(text))
    }
}

impl RuntimeProbe for JavaInstall {
    fn major_version(&self) -> Option<u32> {
        match self.query_version() {
            Ok(version) => {
                let major = java_major(&version);
                debug!("Java at '{}' reports version {} (major {:?})", self.executable.display(), version, major);
                major
            }
            Err(e) => {
                warn!("Could not determine Java version: {}", e);
                None
            }
        }
    }

    fn bundled_dependency_version(&self) -> Result<Option<FxVersion>, ProbeError> {
        let Some(home) = self.home() else {
            return Ok(None);
        };
        let properties = home.join("lib").join("javafx.properties");
        if !properties.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&properties)?;
        Ok(parse_javafx_properties(&content))
    }
}

/// Extracts the quoted version from `java -version` output,
/// e.g. `openjdk version "21.0.1" 2023-10-17` gives `21.0.1`.
pub fn parse_java_version_output(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let start = line.find("version \"")? + "version \"".len();
        let rest = &line[start..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string()).filter(|v| !v.is_empty())
    })
}

/// Feature release of a Java version string. Legacy `1.x` strings map to `x`.
pub fn java_major(version: &str) -> Option<u32> {
    let version = version.strip_prefix("1.").unwrap_or(version);
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Reads `javafx.version` from the contents of a `javafx.properties` file.
pub fn parse_javafx_properties(content: &str) -> Option<FxVersion> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != "javafx.version" {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| FxVersion::new(value))
    })
}
