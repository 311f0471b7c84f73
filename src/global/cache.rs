use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use crate::resolver::{find_local_version, ArtifactFamily, ModuleNamePattern, JAVAFX};
use crate::session::Session;
use crate::version::Version;

/// When the dependency cache gets cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    pub max_files: usize,
    pub max_bytes: u64,
    /// Keep the newest complete install when clearing.
    pub keep_latest: bool,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_files: 30,
            max_bytes: 64_000_000,
            keep_latest: true,
        }
    }
}

fn cached_files(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
}

/// Number of files in the cache directory.
pub fn cached_file_count(dir: &Path) -> usize {
    cached_files(dir).count()
}

/// Total size of the files in the cache directory, in bytes.
pub fn cached_file_size(dir: &Path) -> u64 {
    cached_files(dir)
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Deletes cached files and returns how many were removed.
///
/// With `keep_latest`, only files that are not a module of `family` or that are older
/// than the newest complete install are deleted.
pub fn clear_cache(dir: &Path, family: ArtifactFamily, classifier: &str, keep_latest: bool) -> usize {
    let latest = if keep_latest {
        find_local_version(dir, family, classifier)
    } else {
        None
    };
    let pattern = ModuleNamePattern::new(family, classifier).ok();
    debug!(
        "Clearing dependency cache{}",
        if keep_latest { ", keeping latest entries" } else { "" }
    );

    let doomed: Vec<PathBuf> = cached_files(dir)
        .filter(|entry| {
            if !keep_latest {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            match pattern.as_ref().and_then(|pattern| pattern.parse(&name)) {
                Some((_, version)) => version.is_older(latest.as_ref()),
                None => true,
            }
        })
        .map(|entry| entry.into_path())
        .collect();

    let mut removed = 0;
    for path in doomed {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted dependency {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed deleting '{}': {}", path.display(), e),
        }
    }
    removed
}

/// Clears the session's dependency cache when `clear` is set or a limit is exceeded.
///
/// Returns `true` if the cache was cleared.
pub fn check_clear_cache(session: &mut Session, clear: bool, limits: &CacheLimits) -> bool {
    let dir = session.paths().dependencies_dir();
    let count = cached_file_count(&dir);
    let size = cached_file_size(&dir);
    debug!("Dependency cache: {} files, {} bytes", count, size);
    if !(clear || count > limits.max_files || size > limits.max_bytes) {
        return false;
    }
    let removed = clear_cache(&dir, JAVAFX, session.platform().classifier(), limits.keep_latest);
    info!("Removed {} files from the dependency cache", removed);
    session.invalidate();
    true
}
