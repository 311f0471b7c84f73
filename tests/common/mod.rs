#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use relaunch::jar::test_support::build_config_class;
use relaunch::jar::BUILD_CONFIG_ENTRY;
use relaunch::resolver::{module_file_name, JAVAFX};
use relaunch::LauncherPaths;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip bytes holding `entries`.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Bytes of an application jar reporting `version` and `revision`.
pub fn app_jar_bytes(version: &str, revision: &str) -> Vec<u8> {
    let class = build_config_class(&[("VERSION", version), ("GIT_REVISION", revision)]);
    zip_bytes(&[(BUILD_CONFIG_ENTRY, class)])
}

pub fn install_app(paths: &LauncherPaths, version: &str, revision: &str) {
    std::fs::create_dir_all(paths.root()).unwrap();
    File::create(paths.app_jar())
        .unwrap()
        .write_all(&app_jar_bytes(version, revision))
        .unwrap();
}

/// Places empty module files of a complete JavaFX install into the cache.
pub fn install_fx_files(paths: &LauncherPaths, version: &str, classifier: &str) -> Vec<PathBuf> {
    let dir = paths.dependencies_dir();
    std::fs::create_dir_all(&dir).unwrap();
    JAVAFX
        .required
        .iter()
        .map(|module| {
            let file = dir.join(module_file_name(module, version, classifier));
            std::fs::write(&file, module.as_bytes()).unwrap();
            file
        })
        .collect()
}

/// A `java` script that prints its arguments and exits with `code`.
#[cfg(unix)]
pub fn fake_java(dir: &Path, code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("java");
    std::fs::write(
        &script,
        format!("#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo 'openjdk version \"21.0.2\" 2024-01-16' >&2\n  exit 0\nfi\necho \"$@\"\nexit {code}\n"),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}
