use std::fmt;

/// Platforms OpenJFX publishes native builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    LinuxAarch64,
    Windows,
    Mac,
    MacAarch64,
    Unsupported,
}

impl Platform {
    /// Returns the platform of the running host, based on the compile target's OS and architecture.
    pub fn current() -> Platform {
        Platform::from_os_arch(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps an OS / architecture pair (as in [`std::env::consts`]) to a platform.
    pub fn from_os_arch(os: &str, arch: &str) -> Platform {
        match (os, arch) {
            ("windows", "x86_64") => Platform::Windows,
            ("linux", "x86_64") => Platform::Linux,
            ("linux", "aarch64") => Platform::LinuxAarch64,
            ("macos", "x86_64") => Platform::Mac,
            ("macos", "aarch64") => Platform::MacAarch64,
            _ => Platform::Unsupported,
        }
    }

    /// Maven classifier of the native JavaFX artifacts for this platform.
    pub fn classifier(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::LinuxAarch64 => "linux-aarch64",
            Platform::Windows => "win",
            Platform::Mac => "mac",
            Platform::MacAarch64 => "mac-aarch64",
            Platform::Unsupported => "?",
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != Platform::Unsupported
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.classifier(), std::env::consts::OS, std::env::consts::ARCH)
    }
}
