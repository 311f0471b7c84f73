mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use tempfile::TempDir;
use relaunch::error::WebError;
use relaunch::registry::{fx_module_url, FX_METADATA_URL, LATEST_RELEASE_URL, SNAPSHOT_ARTIFACTS_URL};
use relaunch::resolver::{module_file_name, JAVAFX};
use relaunch::util::digest_reader;
use relaunch::*;
use sha1::Sha1;
use sha2::Sha256;

/// Serves fixed bodies by URL and records every request.
#[derive(Default)]
struct ServedFiles {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl ServedFiles {
    fn serve(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.into(), body.into());
    }

    fn body(&self, url: &str) -> Result<Vec<u8>, WebError> {
        self.requests.borrow_mut().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| WebError::Status {
            status: 404,
            url: url.to_string(),
        })
    }

    fn downloads(&self) -> usize {
        self.requests.borrow().iter().filter(|url| url.ends_with(".jar")).count()
    }
}

impl RemoteSource for ServedFiles {
    fn get_text(&self, url: &str) -> Result<String, WebError> {
        Ok(String::from_utf8_lossy(&self.body(url)?).into_owned())
    }

    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        _declared_size: Option<u64>,
        listener: &dyn TransferListener,
    ) -> Result<u64, WebError> {
        let body = self.body(url)?;
        let total = Some(body.len() as u64);
        listener.start(total);
        sink.write_all(&body)?;
        listener.end(body.len() as u64, total);
        Ok(body.len() as u64)
    }
}

fn setup_tests() -> (TempDir, Session) {
    let temp_dir = TempDir::new().unwrap();
    let paths = LauncherPaths::new(temp_dir.path().join("Recaf"));
    paths.ensure_dirs().unwrap();
    (temp_dir, Session::new(paths, Platform::Linux))
}

fn serve_fx(source: &mut ServedFiles, versions: &[&str]) {
    let listing: String = versions.iter().map(|v| format!("<version>{v}</version>")).collect();
    source.serve(
        FX_METADATA_URL,
        format!("<metadata><versioning><versions>{listing}</versions></versioning></metadata>"),
    );
    for version in versions {
        for module in JAVAFX.required {
            let file_name = module_file_name(module, version, "linux");
            let url = fx_module_url(module, version, &file_name);
            let body = format!("{file_name} contents").into_bytes();
            source.serve(format!("{url}.sha1"), digest_reader::<Sha1, _>(&body[..]).unwrap());
            source.serve(url, body);
        }
    }
}

fn serve_release(source: &mut ServedFiles, tag: &str, jar: &[u8]) {
    let url = format!("https://example.invalid/recaf-{tag}-all.jar");
    let digest = digest_reader::<Sha256, _>(jar).unwrap();
    source.serve(
        LATEST_RELEASE_URL,
        format!(
            r#"{{"tag_name":"{tag}","assets":[
                {{"name":"recaf-{tag}-sources.jar","size":10,"browser_download_url":"https://example.invalid/src.jar"}},
                {{"name":"recaf-{tag}-all.jar","size":{},"browser_download_url":"{url}","digest":"sha256:{digest}"}}
            ]}}"#,
            jar.len()
        ),
    );
    source.serve(url, jar.to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaunch::global::cache::{check_clear_cache, CacheLimits};
    use relaunch::jar::installed_version;

    #[test]
    fn test_setup() {
        let (dir, session) = setup_tests();
        assert!(dir.path().join("Recaf").join("dependencies").is_dir());
        assert!(dir.path().join("Recaf").join("launcher").is_dir());
        assert_eq!(session.local_fx_version(), None);
        assert!(installed_version(&session.paths().app_jar()).is_err());
    }

    #[test]
    fn test_dependency_update_then_upgrade() {
        let (_dir, mut session) = setup_tests();
        let mut source = ServedFiles::default();
        serve_fx(&mut source, &["21.0.5", "22.0.2"]);

        let request = FxUpdateRequest {
            runtime_major: Some(21),
            ..FxUpdateRequest::default()
        };
        let first = update_dependency(&mut session, &source, &request, &NoProgress);
        assert_eq!(first.status, UpdateStatus::Updated);
        assert_eq!(first.to, Some(FxVersion::new("22.0.2")));

        // A newer release shows up, the old install stays until the cache is cleared.
        serve_fx(&mut source, &["21.0.5", "22.0.2", "23.0.1"]);
        let second = update_dependency(&mut session, &source, &request, &NoProgress);
        assert_eq!(second.status, UpdateStatus::Updated);
        assert_eq!(second.from, Some(FxVersion::new("22.0.2")));
        assert_eq!(session.local_fx_version(), Some(FxVersion::new("23.0.1")));
        assert_eq!(cached_file_count(&session.paths().dependencies_dir()), 8);

        let limits = CacheLimits {
            max_files: 4,
            ..CacheLimits::default()
        };
        assert!(check_clear_cache(&mut session, false, &limits));
        assert_eq!(cached_file_count(&session.paths().dependencies_dir()), 4);
        assert_eq!(session.local_fx_version(), Some(FxVersion::new("23.0.1")));
    }

    #[test]
    fn test_dependency_up_to_date_downloads_nothing() {
        let (_dir, mut session) = setup_tests();
        let mut source = ServedFiles::default();
        serve_fx(&mut source, &["22.0.2"]);

        update_dependency(&mut session, &source, &FxUpdateRequest::default(), &NoProgress);
        let downloads = source.downloads();
        let result = update_dependency(&mut session, &source, &FxUpdateRequest::default(), &NoProgress);
        assert_eq!(result.status, UpdateStatus::UpToDate);
        assert_eq!(source.downloads(), downloads);
    }

    #[test]
    fn test_pinned_dependency_version() {
        let (_dir, mut session) = setup_tests();
        let mut source = ServedFiles::default();
        serve_fx(&mut source, &["21.0.5", "22.0.2"]);

        let request = FxUpdateRequest {
            target: Some(FxVersion::new("21.0.5")),
            ..FxUpdateRequest::default()
        };
        let result = update_dependency(&mut session, &source, &request, &NoProgress);
        assert_eq!(result.status, UpdateStatus::Updated);
        assert_eq!(session.local_fx_version(), Some(FxVersion::new("21.0.5")));
    }

    #[test]
    fn test_stable_update_installs_and_reads_version() {
        let (_dir, session) = setup_tests();
        let mut source = ServedFiles::default();
        serve_release(&mut source, "4.1.0", &common::app_jar_bytes("4.1.0", "77"));

        let result = update_app_from_stable(&session, &source, &NoProgress);
        assert_eq!(result.status, UpdateStatus::Updated);
        assert_eq!(result.from, None);
        assert_eq!(result.to, Some(AppVersion::new("4.1.0", Some(77))));
        assert_eq!(
            installed_version(&session.paths().app_jar()).unwrap(),
            AppVersion::new("4.1.0", Some(77))
        );

        let again = update_app_from_stable(&session, &source, &NoProgress);
        assert_eq!(again.status, UpdateStatus::UpToDate);
    }

    #[test]
    fn test_stable_update_rejects_tampered_jar() {
        let (_dir, session) = setup_tests();
        common::install_app(session.paths(), "4.0.0", "5");
        let mut source = ServedFiles::default();
        serve_release(&mut source, "4.1.0", &common::app_jar_bytes("4.1.0", "77"));
        source.serve(
            "https://example.invalid/recaf-4.1.0-all.jar",
            common::app_jar_bytes("6.6.6", "666"),
        );

        let result = update_app_from_stable(&session, &source, &NoProgress);
        assert_eq!(result.status, UpdateStatus::FailedVerification);
        assert_eq!(
            installed_version(&session.paths().app_jar()).unwrap(),
            AppVersion::new("4.0.0", Some(5))
        );
    }

    #[test]
    fn test_snapshot_update_extracts_jar() {
        let (_dir, session) = setup_tests();
        let mut source = ServedFiles::default();
        source.serve(
            SNAPSHOT_ARTIFACTS_URL,
            r#"{"artifacts":[{"name":"snapshot-build","expired":false,"size_in_bytes":1234,
                "workflow_run":{"id":4242,"head_branch":"master","repository_id":98499283,"head_repository_id":98499283}}]}"#,
        );
        source.serve(
            "https://nightly.link/Col-E/Recaf/actions/runs/4242/snapshot-build.zip",
            common::zip_bytes(&[("recaf-4.2.0-SNAPSHOT-all.jar", common::app_jar_bytes("4.2.0-SNAPSHOT", "1"))]),
        );

        let result = update_app_from_snapshot(&session, &source, Some("master"), &NoProgress);
        assert_eq!(result.status, UpdateStatus::Updated);
        assert_eq!(result.to, Some(AppVersion::new("4.2.0-SNAPSHOT", None)));
        assert_eq!(
            std::fs::read_to_string(session.paths().build_marker_file()).unwrap(),
            "4242"
        );

        let again = update_app_from_snapshot(&session, &source, Some("master"), &NoProgress);
        assert_eq!(again.status, UpdateStatus::UpToDate);
    }

    #[test]
    fn test_compatibility_of_fresh_install() {
        let (_dir, mut session) = setup_tests();
        let problems = evaluate(Some(21), session.local_fx_version().as_ref(), session.policy());
        assert_eq!(problems.into_iter().collect::<Vec<_>>(), vec![CompatibilityProblem::DependencyMissing]);

        common::install_fx_files(session.paths(), "23.0.1", "linux");
        session.invalidate();
        let problems = evaluate(Some(17), session.local_fx_version().as_ref(), session.policy());
        assert!(matches!(
            problems.iter().next(),
            Some(CompatibilityProblem::DependencyTooNewForRuntime { required_runtime: 21, .. })
        ));
    }

    #[test]
    fn test_config_round_trip_in_launcher_dir() {
        let (_dir, session) = setup_tests();
        let path = session.paths().config_file();
        let mut config = LauncherConfig::load_or_default(&path);
        assert_eq!(config, LauncherConfig::default());

        config.snapshot_branch = Some("dev4".to_string());
        config.cache.max_files = 12;
        config.save(&path).unwrap();
        let loaded = LauncherConfig::load_or_default(&path);
        assert_eq!(loaded.snapshot_branch.as_deref(), Some("dev4"));
        assert_eq!(loaded.cache.max_files, 12);
    }

    #[cfg(unix)]
    #[test]
    fn test_install_then_launch() {
        let (dir, mut session) = setup_tests();
        let mut source = ServedFiles::default();
        serve_fx(&mut source, &["22.0.2"]);
        serve_release(&mut source, "4.1.0", &common::app_jar_bytes("4.1.0", "77"));

        assert!(update_dependency(&mut session, &source, &FxUpdateRequest::default(), &NoProgress).is_success());
        assert!(update_app_from_stable(&session, &source, &NoProgress).is_success());

        let java = JavaInstall::new(common::fake_java(dir.path(), 0));
        let options = LaunchOptions {
            output: OutputMode::Capture,
            ..LaunchOptions::new(&java)
        };
        let result = launch(&session, &options).unwrap();
        assert!(result.succeeded());
        assert!(result.stdout.contains("-cp recaf.jar:dependencies/javafx-"));
        assert!(result.stdout.contains("javafx-media-22.0.2-linux.jar"));
        assert!(result.stdout.trim_end().ends_with("software.coley.recaf.Main"));
    }
}
