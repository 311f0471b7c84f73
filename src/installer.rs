use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PersistError};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use zip::ZipArchive;
use crate::error::WebError;
use crate::jar::installed_version;
use crate::registry::{
    fetch_latest_release, fetch_snapshot_artifacts, fx_module_url, select_snapshot, FX_METADATA_URL,
    LATEST_RELEASE_URL, RECAF_REPOSITORY_ID, SNAPSHOT_ARTIFACTS_URL,
};
use crate::resolver::{find_remote_version, module_file_name, JAVAFX};
use crate::session::Session;
use crate::util::{file_digest, file_matches, DigestAlgorithm, ExpectedDigest};
use crate::version::{AppVersion, FxVersion, Version};
use crate::web::{RemoteSource, TransferListener};

/// Download attempts per artifact before giving up.
pub const MAX_ATTEMPTS: u32 = 5;
/// Rough upper bound of the application jar size, for progress when no size is announced.
pub const FALLBACK_APP_SIZE: u64 = 80_000_000;

/// Outcome category of an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Updated,
    FailedToFetch,
    FailedToWrite,
    FailedVerification,
    NoCandidates,
    UnsupportedPlatform,
}

impl UpdateStatus {
    pub fn is_success(self) -> bool {
        matches!(self, UpdateStatus::UpToDate | UpdateStatus::Updated)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateStatus::UpToDate => "up to date",
            UpdateStatus::Updated => "updated",
            UpdateStatus::FailedToFetch => "failed to fetch",
            UpdateStatus::FailedToWrite => "failed to write",
            UpdateStatus::FailedVerification => "failed verification",
            UpdateStatus::NoCandidates => "no candidates",
            UpdateStatus::UnsupportedPlatform => "unsupported platform",
        };
        f.write_str(text)
    }
}

/// Result of updating one artifact family. Update operations never fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult<V> {
    /// Version installed before the attempt.
    pub from: Option<V>,
    /// Version the attempt targeted, or installed.
    pub to: Option<V>,
    pub status: UpdateStatus,
    pub error: Option<String>,
}

impl<V> UpdateResult<V> {
    fn up_to_date(current: Option<V>) -> Self
    where
        V: Clone,
    {
        Self {
            from: current.clone(),
            to: current,
            status: UpdateStatus::UpToDate,
            error: None,
        }
    }

    fn failed(from: Option<V>, to: Option<V>, status: UpdateStatus, error: impl ToString) -> Self {
        Self {
            from,
            to,
            status,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The version installed after the attempt: the new one when updated, the prior one otherwise.
    pub fn current(&self) -> Option<&V> {
        match self.status {
            UpdateStatus::Updated => self.to.as_ref(),
            _ => self.from.as_ref(),
        }
    }
}

/// What a dependency update should install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FxUpdateRequest {
    /// Pinned version, `None` for the newest compatible one.
    pub target: Option<FxVersion>,
    /// Re-download even when the local files already match.
    pub force: bool,
    /// Java release the dependency must run on. `None` accepts any release.
    pub runtime_major: Option<u32>,
}

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Network(#[from] WebError),

    #[error("Failed writing '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{url}' failed verification after {attempts} attempts")]
    Verification { url: String, attempts: u32 },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),
}

impl FetchError {
    fn write(path: &Path) -> impl FnOnce(io::Error) -> FetchError + '_ {
        move |source| FetchError::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    fn status(&self) -> UpdateStatus {
        match self {
            FetchError::Network(_) => UpdateStatus::FailedToFetch,
            FetchError::Write { .. } => UpdateStatus::FailedToWrite,
            FetchError::Verification { .. } | FetchError::InvalidArchive(_) => UpdateStatus::FailedVerification,
        }
    }
}

/// Installs the JavaFX modules for the session's platform.
///
/// Modules are fetched one at a time. A module whose file already matches the published
/// SHA-1 is skipped unless `force` is set. A failed module never leaves a partial file behind.
pub fn update_dependency(
    session: &mut Session,
    source: &dyn RemoteSource,
    request: &FxUpdateRequest,
    listener: &dyn TransferListener,
) -> UpdateResult<FxVersion> {
    let local = session.local_fx_version();
    let platform = session.platform();
    if !platform.is_supported() {
        warn!(
            "No JavaFX build exists for this system ({} / {})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        return UpdateResult::failed(local, None, UpdateStatus::UnsupportedPlatform, "Unsupported platform");
    }

    let target = match &request.target {
        Some(target) => target.clone(),
        None => {
            let policy = session.policy();
            let runtime = request.runtime_major;
            let found = find_remote_version(source, FX_METADATA_URL, |version| {
                !version.is_snapshot() && runtime.is_none_or(|runtime| policy.accepts(runtime, version))
            });
            match found {
                Some(version) => version,
                None => {
                    return UpdateResult::failed(
                        local,
                        None,
                        UpdateStatus::NoCandidates,
                        "No compatible remote JavaFX version found",
                    );
                }
            }
        }
    };

    let needed = request.force
        || match &local {
            None => true,
            // Versions like `22` and `22.0.2` compare equal, a pin must match exactly.
            Some(local) if request.target.is_some() => target.as_str() != local.as_str(),
            Some(local) => target.is_newer(Some(local)),
        };
    if !needed {
        info!("Current JavaFX is up-to-date: '{}'", target);
        return UpdateResult::up_to_date(local);
    }

    let result = install_fx_modules(session, source, &target, request.force, listener);
    session.invalidate();
    match result {
        Ok(()) => {
            info!("Updated to JavaFX '{}'", target);
            if let Some(selected) = session.local_fx_version().filter(|v| v.as_str() != target.as_str()) {
                warn!(
                    "JavaFX '{}' is installed, but the newer cached '{}' will be used. Clear the cache to use it",
                    target, selected
                );
            }
            UpdateResult {
                from: local,
                to: Some(target),
                status: UpdateStatus::Updated,
                error: None,
            }
        }
        Err(e) => {
            error!("Failed updating JavaFX to '{}': {}", target, e);
            UpdateResult::failed(local, Some(target), e.status(), e)
        }
    }
}

fn install_fx_modules(
    session: &Session,
    source: &dyn RemoteSource,
    version: &FxVersion,
    force: bool,
    listener: &dyn TransferListener,
) -> Result<(), FetchError> {
    let dir = session.paths().dependencies_dir();
    std::fs::create_dir_all(&dir).map_err(FetchError::write(&dir))?;
    let classifier = session.platform().classifier();
    for module in JAVAFX.required {
        let file_name = module_file_name(module, version.as_str(), classifier);
        let url = fx_module_url(module, version.as_str(), &file_name);
        let body = source.get_text(&format!("{url}.sha1"))?;
        let expected = ExpectedDigest::from_sidecar(DigestAlgorithm::Sha1, &body)
            .ok_or_else(|| WebError::InvalidResponse(format!("Invalid SHA-1 for '{url}'")))?;

        let dest = dir.join(&file_name);
        if !force && file_matches(&dest, &expected) {
            debug!("'{}' already matches the published digest", file_name);
            continue;
        }
        download_verified(source, &url, &dest, Some(&expected), None, listener)?;
        info!("Installed {}", file_name);
    }
    Ok(())
}

/// Downloads `url` over `dest`, gated on `expected` when one is known.
///
/// Each attempt writes a fresh temporary sibling of `dest`, so `dest` only ever holds
/// complete content: the prior file, or the verified download.
fn download_verified(
    source: &dyn RemoteSource,
    url: &str,
    dest: &Path,
    expected: Option<&ExpectedDigest>,
    declared_size: Option<u64>,
    listener: &dyn TransferListener,
) -> Result<(), FetchError> {
    let temp = download_with_retries(source, url, dest, declared_size, listener, |path| {
        let Some(expected) = expected else {
            return Ok(true);
        };
        let actual = file_digest(path, expected.algorithm)?;
        if expected.matches(&actual) {
            return Ok(true);
        }
        warn!(
            "Digest of '{}' did not match (expected={} vs local={})",
            url, expected.hex, actual
        );
        Ok(false)
    })?;
    atomic_replace(temp, dest).map_err(FetchError::write(dest))
}

/// Downloads into a temporary sibling of `dest` until `accept` approves the content.
fn download_with_retries<F>(
    source: &dyn RemoteSource,
    url: &str,
    dest: &Path,
    declared_size: Option<u64>,
    listener: &dyn TransferListener,
    accept: F,
) -> Result<NamedTempFile, FetchError>
where
    F: Fn(&Path) -> io::Result<bool>,
{
    let mut last_error = None;
    for attempt in 1..=MAX_ATTEMPTS {
        let mut temp = temp_sibling(dest).map_err(FetchError::write(dest))?;
        if let Err(e) = source.download(url, temp.as_file_mut(), declared_size, listener) {
            warn!("Download attempt {}/{} of '{}' failed: {}", attempt, MAX_ATTEMPTS, url, e);
            last_error = Some(FetchError::Network(e));
            continue;
        }
        if accept(temp.path()).map_err(FetchError::write(temp.path()))? {
            return Ok(temp);
        }
        warn!("Attempt {}/{} of '{}' was rejected, retrying", attempt, MAX_ATTEMPTS, url);
        last_error = Some(FetchError::Verification {
            url: url.to_string(),
            attempts: attempt,
        });
    }
    Err(last_error.unwrap_or(FetchError::Verification {
        url: url.to_string(),
        attempts: MAX_ATTEMPTS,
    }))
}

/// A hidden `.part` file next to `dest`. The dependency scanner never matches these names.
fn temp_sibling(dest: &Path) -> io::Result<NamedTempFile> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    let name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".part")
        .tempfile_in(dir)
}

/// Renames `temp` over `dest`.
fn atomic_replace(temp: NamedTempFile, dest: &Path) -> io::Result<()> {
    replace_with(temp, dest, |temp, dest| temp.persist(dest))
}

/// When the rename over an existing `dest` is refused (e.g. a locked file on Windows), `dest`
/// is removed and the rename retried. `dest` is never written in place, so it either holds
/// complete content or is absent. A temp file that could not be moved is deleted on drop.
fn replace_with<F>(temp: NamedTempFile, dest: &Path, mut persist: F) -> io::Result<()>
where
    F: FnMut(NamedTempFile, &Path) -> Result<File, PersistError>,
{
    let temp = match persist(temp, dest) {
        Ok(_) => return Ok(()),
        Err(PersistError { error, file }) => {
            warn!("Replacing '{}' failed ({}), removing it and retrying", dest.display(), error);
            file
        }
    };
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    persist(temp, dest).map(|_| ()).map_err(|e| e.error)
}

/// Installs the latest stable release when it is newer than the installed one.
pub fn update_app_from_stable(
    session: &Session,
    source: &dyn RemoteSource,
    listener: &dyn TransferListener,
) -> UpdateResult<AppVersion> {
    let paths = session.paths();
    let installed = installed_version(&paths.app_jar()).ok();

    let release = match fetch_latest_release(source, LATEST_RELEASE_URL) {
        Ok(release) => release,
        Err(e) => {
            error!("Failed to fetch the latest release: {}", e);
            return UpdateResult::failed(installed, None, UpdateStatus::FailedToFetch, e);
        }
    };
    let latest = AppVersion::new(release.tag_name.as_str(), None);
    if installed.as_ref().is_some_and(|installed| !latest.is_newer(Some(installed))) {
        info!("Recaf is up-to-date: '{}'", latest);
        return UpdateResult::up_to_date(installed);
    }

    let Some(artifact) = release.jar_artifact() else {
        return UpdateResult::failed(
            installed,
            Some(latest),
            UpdateStatus::NoCandidates,
            "The latest release has no jar asset",
        );
    };
    if let Err(e) = paths.ensure_dirs() {
        return UpdateResult::failed(installed, Some(latest), UpdateStatus::FailedToWrite, e);
    }

    if artifact.expected_digest.is_none() {
        warn!("Release '{}' publishes no digest, installing unverified", latest);
    }
    let jar = paths.app_jar();
    let declared = artifact.declared_size.or(Some(FALLBACK_APP_SIZE));
    match download_verified(source, &artifact.url, &jar, artifact.expected_digest.as_ref(), declared, listener) {
        Ok(()) => {
            let to = installed_version(&jar).ok().unwrap_or(latest);
            info!("Updated Recaf to '{}'", to);
            UpdateResult {
                from: installed,
                to: Some(to),
                status: UpdateStatus::Updated,
                error: None,
            }
        }
        Err(e) => {
            error!("Failed updating Recaf to '{}': {}", latest, e);
            UpdateResult::failed(installed, Some(latest), e.status(), e)
        }
    }
}

/// Installs the newest CI build, optionally restricted to `branch`.
///
/// The workflow run id of the installed build is kept in a marker file, so the same build
/// is never downloaded twice. The marker is only written after the jar is in place.
pub fn update_app_from_snapshot(
    session: &Session,
    source: &dyn RemoteSource,
    branch: Option<&str>,
    listener: &dyn TransferListener,
) -> UpdateResult<AppVersion> {
    let paths = session.paths();
    let jar = paths.app_jar();
    let installed = installed_version(&jar).ok();

    let artifacts = match fetch_snapshot_artifacts(source, SNAPSHOT_ARTIFACTS_URL) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            error!("Failed to fetch snapshot builds: {}", e);
            return UpdateResult::failed(installed, None, UpdateStatus::FailedToFetch, e);
        }
    };
    let Some(artifact) = select_snapshot(&artifacts, branch, RECAF_REPOSITORY_ID) else {
        return UpdateResult::failed(installed, None, UpdateStatus::NoCandidates, "No usable snapshot build found");
    };

    let run_id = artifact.workflow_run.id.to_string();
    let marker = paths.build_marker_file();
    let installed_run = std::fs::read_to_string(&marker).ok();
    if jar.is_file() && installed_run.as_deref().map(str::trim) == Some(run_id.as_str()) {
        info!("Snapshot build {} is already installed", run_id);
        return UpdateResult::up_to_date(installed);
    }
    if let Err(e) = paths.ensure_dirs() {
        return UpdateResult::failed(installed, None, UpdateStatus::FailedToWrite, e);
    }

    let url = artifact.download_url();
    let declared = u64::try_from(artifact.size_in_bytes).ok().or(Some(FALLBACK_APP_SIZE));
    let result = download_with_retries(source, &url, &marker, declared, listener, |path| Ok(has_jar_entry(path)))
        .and_then(|archive| extract_first_jar(archive.path(), &jar));
    if let Err(e) = result {
        error!("Failed installing snapshot build {}: {}", run_id, e);
        return UpdateResult::failed(installed, None, e.status(), e);
    }
    if let Err(e) = std::fs::write(&marker, &run_id) {
        warn!("Could not record installed build {}: {}", run_id, e);
    }

    let to = installed_version(&jar).ok();
    info!("Installed snapshot build {}", run_id);
    UpdateResult {
        from: installed,
        to,
        status: UpdateStatus::Updated,
        error: None,
    }
}

fn has_jar_entry(archive: &Path) -> bool {
    File::open(archive)
        .ok()
        .and_then(|file| ZipArchive::new(file).ok())
        .is_some_and(|archive| archive.file_names().any(|name| name.to_ascii_lowercase().ends_with(".jar")))
}

/// Copies the first `.jar` entry of a zip archive over `dest`.
fn extract_first_jar(archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
    let file = File::open(archive_path).map_err(FetchError::write(archive_path))?;
    let mut archive = ZipArchive::new(file).map_err(|e| FetchError::InvalidArchive(e.to_string()))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| FetchError::InvalidArchive(e.to_string()))?;
        if !entry.is_file() || !entry.name().to_ascii_lowercase().ends_with(".jar") {
            continue;
        }
        debug!("Extracting '{}' to '{}'", entry.name(), dest.display());
        let mut temp = temp_sibling(dest).map_err(FetchError::write(dest))?;
        io::copy(&mut entry, temp.as_file_mut()).map_err(FetchError::write(temp.path()))?;
        return atomic_replace(temp, dest).map_err(FetchError::write(dest));
    }
    Err(FetchError::InvalidArchive("no jar entry in snapshot archive".to_string()))
}
