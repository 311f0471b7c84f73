use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::{debug, error, warn};
use walkdir::WalkDir;
use crate::registry::fetch_fx_versions;
use crate::version::{FxVersion, Version};
use crate::web::RemoteSource;

/// A named group of module files that are installed and versioned together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactFamily {
    pub name: &'static str,
    /// Every module name the scanner recognizes as belonging to the family.
    pub recognized: &'static [&'static str],
    /// Modules that must all be present, at the same version, for an install to count.
    pub required: &'static [&'static str],
}

/// The OpenJFX modules the application runs with.
pub const JAVAFX: ArtifactFamily = ArtifactFamily {
    name: "javafx",
    recognized: &[
        "javafx-base",
        "javafx-controls",
        "javafx-fxml",
        "javafx-graphics",
        "javafx-media",
        "javafx-swing",
        "javafx-web",
    ],
    required: &["javafx-base", "javafx-graphics", "javafx-controls", "javafx-media"],
};

/// File name of one module: `<module>-<version>-<classifier>.jar`.
pub fn module_file_name(module: &str, version: &str, classifier: &str) -> String {
    format!("{module}-{version}-{classifier}.jar")
}

/// Matches module file names of one family and classifier.
pub struct ModuleNamePattern {
    family: ArtifactFamily,
    regex: Regex,
}

impl ModuleNamePattern {
    pub fn new(family: ArtifactFamily, classifier: &str) -> Result<Self, regex::Error> {
        // Module names never contain digits, so the first '-<digit>' boundary starts the version.
        let regex = Regex::new(&format!(
            r"^([a-z]+(?:-[a-z]+)*)-(\d.*)-{}\.jar$",
            regex::escape(classifier)
        ))?;
        Ok(Self { family, regex })
    }

    /// Returns the module name and version a file name encodes, if it belongs to the family.
    pub fn parse(&self, file_name: &str) -> Option<(&'static str, FxVersion)> {
        let captures = self.regex.captures(file_name)?;
        let module = captures.get(1)?.as_str();
        let version = captures.get(2)?.as_str();
        let module = self.family.recognized.iter().find(|known| **known == module)?;
        Some((*module, FxVersion::new(version)))
    }
}

/// Returns the newest version for which every required module is present in `dir`.
///
/// Partial sets and sets mixing versions never resolve.
pub fn find_local_version(dir: &Path, family: ArtifactFamily, classifier: &str) -> Option<FxVersion> {
    if !dir.is_dir() {
        return None;
    }
    let pattern = match ModuleNamePattern::new(family, classifier) {
        Ok(pattern) => pattern,
        Err(e) => {
            error!("Invalid module name pattern for classifier '{}': {}", classifier, e);
            return None;
        }
    };

    let mut modules_by_version: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not read dependency cache entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if let Some((module, version)) = pattern.parse(&name) {
            modules_by_version
                .entry(version.to_string())
                .or_default()
                .insert(module);
        }
    }

    let newest = modules_by_version
        .into_iter()
        .filter(|(_, modules)| family.required.iter().all(|m| modules.contains(m)))
        .map(|(version, _)| FxVersion::new(version))
        // `22` and `22.0.2` compare equal, the more specific one wins.
        .max_by(|a, b| a.cmp(b).then_with(|| a.as_str().len().cmp(&b.as_str().len())));
    debug!("Newest complete local {} version: {:?}", family.name, newest);
    newest
}

/// Paths of the required module files of `version`, or `None` if any is missing.
pub fn module_files(
    dir: &Path,
    family: ArtifactFamily,
    version: &FxVersion,
    classifier: &str,
) -> Option<Vec<PathBuf>> {
    family
        .required
        .iter()
        .map(|module| {
            let path = dir.join(module_file_name(module, &version.to_string(), classifier));
            path.is_file().then_some(path)
        })
        .collect()
}

/// Scans a listing from its newest (last) entry backwards and returns the first one accepted.
pub fn select_newest<F>(listing: &[String], filter: F) -> Option<FxVersion>
where
    F: Fn(&FxVersion) -> bool,
{
    listing
        .iter()
        .rev()
        .map(|raw| FxVersion::new(raw.as_str()))
        .find(|version| filter(version))
}

/// Fetches the remote version listing and returns the newest entry accepted by `filter`.
///
/// Fetch and parse failures are logged and resolve to `None`.
pub fn find_remote_version<F>(source: &dyn RemoteSource, metadata_url: &str, filter: F) -> Option<FxVersion>
where
    F: Fn(&FxVersion) -> bool,
{
    let listing = match fetch_fx_versions(source, metadata_url) {
        Ok(listing) => listing,
        Err(e) => {
            error!("Failed to retrieve remote JavaFX versions: {}", e);
            return None;
        }
    };
    let selected = select_newest(&listing, filter);
    if selected.is_none() {
        error!("No compatible remote JavaFX version found");
    }
    selected
}
