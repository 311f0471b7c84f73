use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Suffix marking a Recaf snapshot build, matched case-insensitively.
pub const SNAPSHOT_SUFFIX: &str = "-snapshot";
/// Marker used by OpenJFX early-access builds, e.g. `24-ea+5`.
pub const EARLY_ACCESS_MARKER: &str = "-ea+";

/// Raised when a numeric major version is needed but the version string has no leading digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot map version '{0}' to a major version")]
pub struct MalformedVersionError(pub String);

/// Common behaviour of every version family.
///
/// Ordering between two values of *different* families only ever goes through
/// [`compare_versions`]; the family types add their own tie-breaks on top of it.
pub trait Version: fmt::Display {
    /// The raw version string.
    fn as_str(&self) -> &str;

    /// `true` when this is a pre-release build of its family.
    fn is_snapshot(&self) -> bool;

    /// Numeric groups of the version, most significant first.
    fn groups(&self) -> Vec<u64> {
        version_groups(self.as_str())
    }

    /// Leading digit run of the version string.
    ///
    /// # Errors
    /// Returns [`MalformedVersionError`] if the string does not start with a digit.
    fn major_version(&self) -> Result<u32, MalformedVersionError> {
        major_version(self.as_str())
    }

    /// `true` when `self` is newer than `other`. A missing `other` is infinitely old.
    fn is_newer(&self, other: Option<&Self>) -> bool
    where
        Self: Ord + Sized,
    {
        other.is_none_or(|other| self > other)
    }

    /// `true` when `self` is older than `other`. Nothing is older than a missing version.
    fn is_older(&self, other: Option<&Self>) -> bool
    where
        Self: Ord + Sized,
    {
        other.is_some_and(|other| self < other)
    }
}

/// Strips a snapshot or early-access marker and everything after it.
fn strip_marker(raw: &str) -> &str {
    if let Some(index) = raw.find(EARLY_ACCESS_MARKER) {
        if index > 0 {
            return &raw[..index];
        }
    }
    let lower = raw.to_ascii_lowercase();
    if lower.ends_with(SNAPSHOT_SUFFIX) {
        return &raw[..raw.len() - SNAPSHOT_SUFFIX.len()];
    }
    raw
}

/// Splits a version string into its numeric groups.
///
/// Any pre-release marker is removed first, then the remainder is split on runs
/// of non-digits. Never fails: groups too large for a `u64` saturate.
pub fn version_groups(raw: &str) -> Vec<u64> {
    strip_marker(raw)
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

/// Parses the leading digit run of `raw` as the major version.
pub fn major_version(raw: &str) -> Result<u32, MalformedVersionError> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<u32>()
        .map_err(|_| MalformedVersionError(raw.to_string()))
}

/// Family-independent ordering.
///
/// Groups are compared pairwise up to the shorter length. When they are all equal,
/// a stable build outranks a snapshot.
pub fn compare_versions<A, B>(a: &A, b: &B) -> Ordering
where
    A: Version + ?Sized,
    B: Version + ?Sized,
{
    let ours = a.groups();
    let theirs = b.groups();
    for (x, y) in ours.iter().zip(theirs.iter()) {
        match x.cmp(y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    match (a.is_snapshot(), b.is_snapshot()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Version of the launched application.
#[derive(Debug, Clone)]
pub struct AppVersion {
    version: String,
    revision: Option<u32>,
}

impl AppVersion {
    /// Creates a version with an optional build revision. A revision of `None` is "unknown".
    pub fn new(version: impl Into<String>, revision: Option<u32>) -> Self {
        Self {
            version: version.into(),
            revision,
        }
    }

    /// Build revision, if known.
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }
}

impl Version for AppVersion {
    fn as_str(&self) -> &str {
        &self.version
    }

    fn is_snapshot(&self) -> bool {
        self.version.to_ascii_lowercase().ends_with(SNAPSHOT_SUFFIX)
    }
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Option orders None first, so a known revision beats an unknown one.
        compare_versions(self, other).then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AppVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AppVersion {}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(revision) if revision > 0 => write!(f, "{} ({})", self.version, revision),
            _ => write!(f, "{}", self.version),
        }
    }
}

/// Version of the OpenJFX module bundle.
#[derive(Debug, Clone)]
pub struct FxVersion {
    version: String,
}

impl FxVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl From<u32> for FxVersion {
    fn from(major: u32) -> Self {
        FxVersion::new(major.to_string())
    }
}

impl From<&str> for FxVersion {
    fn from(version: &str) -> Self {
        FxVersion::new(version)
    }
}

impl Version for FxVersion {
    fn as_str(&self) -> &str {
        &self.version
    }

    fn is_snapshot(&self) -> bool {
        self.version.contains(EARLY_ACCESS_MARKER)
    }
}

impl Ord for FxVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(self, other)
    }
}

impl PartialOrd for FxVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FxVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FxVersion {}

impl fmt::Display for FxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}
