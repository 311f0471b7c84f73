use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use crate::error::WebError;
use crate::util::ExpectedDigest;
use crate::web::RemoteSource;

/// Root of the OpenJFX artifacts on Maven Central.
pub const FX_REPOSITORY: &str = "https://repo1.maven.org/maven2/org/openjfx";
/// Version listing of the OpenJFX modules.
pub const FX_METADATA_URL: &str = "https://repo1.maven.org/maven2/org/openjfx/javafx-base/maven-metadata.xml";
/// Latest stable Recaf release.
pub const LATEST_RELEASE_URL: &str = "https://api.github.com/repos/Col-E/Recaf/releases/latest";
/// CI build artifacts of the Recaf repository, newest first.
pub const SNAPSHOT_ARTIFACTS_URL: &str = "https://api.github.com/repos/Col-E/Recaf/actions/artifacts";
/// Id of the upstream Recaf repository, used to reject builds from forks.
pub const RECAF_REPOSITORY_ID: u64 = 98499283;

/// A downloadable artifact resolved from a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub url: String,
    pub expected_digest: Option<ExpectedDigest>,
    /// Size announced by the listing, if any.
    pub declared_size: Option<u64>,
}

/// A published GitHub release.
#[derive(Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A file attached to a GitHub release.
#[derive(Debug, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: i64,
    pub browser_download_url: String,
    /// `sha256:<hex>` on releases published after GitHub started hashing assets.
    #[serde(default)]
    pub digest: Option<String>,
}

impl Release {
    /// The first asset that looks like a fat jar.
    pub fn jar_artifact(&self) -> Option<RemoteArtifact> {
        self.assets
            .iter()
            .find(|asset| {
                let name = asset.name.to_lowercase();
                name.ends_with("-all.jar") || name.ends_with("-jar-with-dependencies.jar")
            })
            .map(|asset| RemoteArtifact {
                url: asset.browser_download_url.clone(),
                expected_digest: asset.digest.as_deref().and_then(ExpectedDigest::from_prefixed),
                declared_size: u64::try_from(asset.size).ok().filter(|size| *size > 0),
            })
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactListing {
    #[serde(default)]
    artifacts: Vec<SnapshotArtifact>,
}

/// A CI build artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotArtifact {
    pub name: String,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub size_in_bytes: i64,
    pub workflow_run: WorkflowRun,
}

/// The workflow run that produced a [`SnapshotArtifact`].
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub repository_id: u64,
    #[serde(default)]
    pub head_repository_id: u64,
}

impl SnapshotArtifact {
    /// Public mirror URL for the zipped build. The GitHub download URL requires a token.
    pub fn download_url(&self) -> String {
        format!(
            "https://nightly.link/Col-E/Recaf/actions/runs/{}/snapshot-build.zip",
            self.workflow_run.id
        )
    }
}

/// Fetches the latest stable release model.
pub fn fetch_latest_release(source: &dyn RemoteSource, url: &str) -> Result<Release, WebError> {
    let body = source.get_text(url)?;
    serde_json::from_str(&body).map_err(|e| WebError::InvalidResponse(e.to_string()))
}

/// Fetches the CI artifact listing.
pub fn fetch_snapshot_artifacts(
    source: &dyn RemoteSource,
    url: &str,
) -> Result<Vec<SnapshotArtifact>, WebError> {
    let body = source.get_text(url)?;
    let listing: ArtifactListing =
        serde_json::from_str(&body).map_err(|e| WebError::InvalidResponse(e.to_string()))?;
    Ok(listing.artifacts)
}

/// Picks the newest usable snapshot build, optionally restricted to one branch.
pub fn select_snapshot<'a>(
    artifacts: &'a [SnapshotArtifact],
    branch: Option<&str>,
    repository_id: u64,
) -> Option<&'a SnapshotArtifact> {
    artifacts.iter().find(|artifact| {
        let run = &artifact.workflow_run;
        !artifact.expired
            && artifact.name == "snapshot-build"
            && branch.is_none_or(|wanted| {
                run.head_branch
                    .as_deref()
                    .is_some_and(|head| head.eq_ignore_ascii_case(wanted))
            })
            && run.repository_id == repository_id
            && run.head_repository_id == repository_id
            && artifact.size_in_bytes > 0
    })
}

/// Fetches the published OpenJFX versions, oldest first.
pub fn fetch_fx_versions(source: &dyn RemoteSource, url: &str) -> Result<Vec<String>, WebError> {
    let xml = source.get_text(url)?;
    parse_maven_metadata(&xml)
}

/// Extracts `metadata/versioning/versions/version` entries from a `maven-metadata.xml`.
pub fn parse_maven_metadata(xml: &str) -> Result<Vec<String>, WebError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut versions = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                if path.iter().map(String::as_str).eq(["metadata", "versioning", "versions", "version"]) {
                    let text = e
                        .unescape()
                        .map_err(|err| WebError::InvalidResponse(err.to_string()))?;
                    let text = text.trim();
                    if !text.is_empty() {
                        versions.push(text.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(WebError::InvalidResponse(e.to_string())),
        }
    }
    Ok(versions)
}

/// Location of one OpenJFX module jar on Maven Central.
pub fn fx_module_url(module: &str, version: &str, file_name: &str) -> String {
    format!("{FX_REPOSITORY}/{module}/{version}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.openjfx</groupId>
  <artifactId>javafx-base</artifactId>
  <versioning>
    <latest>24-ea+5</latest>
    <release>23.0.1</release>
    <versions>
      <version>11</version>
      <version>21.0.1</version>
      <version>23.0.1</version>
      <version>24-ea+5</version>
    </versions>
  </versioning>
</metadata>"#;

    #[test]
    fn test_parse_maven_metadata() {
        let versions = parse_maven_metadata(METADATA).unwrap();
        assert_eq!(versions, vec!["11", "21.0.1", "23.0.1", "24-ea+5"]);
    }

    #[test]
    fn test_parse_maven_metadata_without_versions() {
        assert!(parse_maven_metadata("<metadata></metadata>").unwrap().is_empty());
    }

    #[test]
    fn test_release_jar_artifact() {
        let json = r#"{
            "tag_name": "4.1.0",
            "assets": [
                {"name": "recaf-4.1.0.zip", "size": 10, "browser_download_url": "https://x/zip"},
                {"name": "recaf-4.1.0-J22-jar-with-dependencies.jar", "size": 75000000,
                 "browser_download_url": "https://x/jar", "digest": "sha256:AB01"}
            ]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        let artifact = release.jar_artifact().unwrap();
        assert_eq!(artifact.url, "https://x/jar");
        assert_eq!(artifact.declared_size, Some(75_000_000));
        assert_eq!(artifact.expected_digest.unwrap().hex, "ab01");
    }

    fn artifact(name: &str, branch: &str, repo: u64, size: i64, expired: bool) -> SnapshotArtifact {
        SnapshotArtifact {
            name: name.to_string(),
            expired,
            size_in_bytes: size,
            workflow_run: WorkflowRun {
                id: size as u64,
                head_branch: Some(branch.to_string()),
                repository_id: repo,
                head_repository_id: repo,
            },
        }
    }

    #[test]
    fn test_select_snapshot_skips_unusable_builds() {
        let listing = vec![
            artifact("snapshot-build", "master", RECAF_REPOSITORY_ID, 1, true),
            artifact("test-results", "master", RECAF_REPOSITORY_ID, 2, false),
            artifact("snapshot-build", "dev", RECAF_REPOSITORY_ID, 3, false),
            artifact("snapshot-build", "master", 1, 4, false),
            artifact("snapshot-build", "master", RECAF_REPOSITORY_ID, 0, false),
            artifact("snapshot-build", "master", RECAF_REPOSITORY_ID, 6, false),
        ];
        let selected = select_snapshot(&listing, Some("master"), RECAF_REPOSITORY_ID).unwrap();
        assert_eq!(selected.workflow_run.id, 6);
        let any = select_snapshot(&listing, None, RECAF_REPOSITORY_ID).unwrap();
        assert_eq!(any.workflow_run.id, 3);
        assert!(select_snapshot(&listing, Some("feature"), RECAF_REPOSITORY_ID).is_none());
    }

    #[test]
    fn test_snapshot_download_url() {
        let a = artifact("snapshot-build", "master", RECAF_REPOSITORY_ID, 77, false);
        assert_eq!(
            a.download_url(),
            "https://nightly.link/Col-E/Recaf/actions/runs/77/snapshot-build.zip"
        );
    }
}
