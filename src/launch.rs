//! Spawning and supervising the application process.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use crate::error::InstallationError;
use crate::jar::installed_version;
use crate::resolver::{module_files, JAVAFX};
use crate::runtime::{JavaInstall, RuntimeProbe};
use crate::session::Session;

/// Entry point of the application.
pub const MAIN_CLASS: &str = "software.coley.recaf.Main";

pub const SUCCESS: i32 = 0;
pub const ERR_FX_UNKNOWN: i32 = 100;
pub const ERR_FX_CLASS_NOT_FOUND: i32 = 101;
pub const ERR_FX_NO_SUCH_METHOD: i32 = 102;
pub const ERR_FX_INVOKE_TARGET: i32 = 103;
pub const ERR_FX_ACCESS_TARGET: i32 = 104;
pub const ERR_FX_OLD_VERSION: i32 = 105;
pub const ERR_FX_UNKNOWN_VERSION: i32 = 106;
/// Process terminated from the outside (SIGINT, or an IDE stop button).
pub const TERMINATED: i32 = 130;
pub const ERR_CDI_INIT_FAILURE: i32 = 150;
pub const ERR_NOT_A_JDK: i32 = 160;

/// Human-readable category of an exit code.
pub fn describe_exit_code(code: i32) -> &'static str {
    match code {
        SUCCESS => "Success",
        ERR_FX_UNKNOWN => "An unknown JavaFX error occurred",
        ERR_FX_CLASS_NOT_FOUND => "JavaFX has missing classes",
        ERR_FX_NO_SUCH_METHOD => "JavaFX has unexpected incompatible API changes",
        ERR_FX_INVOKE_TARGET | ERR_FX_ACCESS_TARGET => "Recaf failed to access JavaFX (Reflection)",
        ERR_FX_OLD_VERSION => "JavaFX on Recaf's classpath was too old",
        ERR_FX_UNKNOWN_VERSION => "JavaFX on Recaf's classpath couldn't be identified",
        TERMINATED => "Recaf was terminated",
        ERR_CDI_INIT_FAILURE => "Recaf failed to create its CDI container",
        ERR_NOT_A_JDK => "Recaf must be run with a JDK, but was run with a JRE",
        _ => "<unknown error>",
    }
}

/// Where the child's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Forward to the launcher's console.
    Inherit,
    /// Keep in the [`LaunchResult`] only.
    Capture,
    InheritAndCapture,
}

impl OutputMode {
    fn forwards(self) -> bool {
        matches!(self, OutputMode::Inherit | OutputMode::InheritAndCapture)
    }

    fn captures(self) -> bool {
        matches!(self, OutputMode::Capture | OutputMode::InheritAndCapture)
    }
}

/// Notified when the child is still alive after the grace period.
pub trait LaunchObserver: Send + Sync {
    fn still_running(&self, grace_period: Duration);
}

pub struct LaunchOptions<'a> {
    /// The `java` executable to run.
    pub executable: PathBuf,
    /// Tells whether the runtime bundles JavaFX.
    pub probe: &'a dyn RuntimeProbe,
    pub output: OutputMode,
    /// Enables the "still running means it started fine" heuristic.
    pub grace_period: Option<Duration>,
    pub observer: Option<&'a dyn LaunchObserver>,
}

impl<'a> LaunchOptions<'a> {
    /// Runs `java` and asks it about bundled JavaFX.
    pub fn new(java: &'a JavaInstall) -> Self {
        Self {
            executable: java.executable().to_path_buf(),
            probe: java,
            output: OutputMode::InheritAndCapture,
            grace_period: None,
            observer: None,
        }
    }
}

/// Outcome of a child process that was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// The child outlived the grace period. Informational only.
    pub outlived_grace_period: bool,
}

impl LaunchResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == SUCCESS
    }

    pub fn code_description(&self) -> &'static str {
        describe_exit_code(self.exit_code)
    }
}

/// Why the child process could not be run.
#[derive(Debug, Error)]
pub enum LaunchFailure {
    #[error("Recaf is not installed: {0}")]
    NotInstalled(#[source] InstallationError),

    #[error("JavaFX is not installed and the selected Java does not bundle it")]
    DependencyMissing,

    #[error("Could not build the classpath: {0}")]
    InvalidClasspath(#[source] std::env::JoinPathsError),

    #[error("Failed to start '{java}': {source}")]
    Spawn {
        java: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for the process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs the installed application.
///
/// Preconditions are checked in order: the application jar, then JavaFX (cached or bundled
/// with the runtime). Classpath entries are relative to the install root, which is also the
/// working directory of the child.
pub fn launch(session: &Session, options: &LaunchOptions) -> Result<LaunchResult, LaunchFailure> {
    let paths = session.paths();
    let app_version = installed_version(&paths.app_jar()).map_err(|e| {
        error!("No local version of Recaf found, try running 'update'");
        LaunchFailure::NotInstalled(e)
    })?;

    let bundled = match options.probe.bundled_dependency_version() {
        Ok(bundled) => bundled,
        Err(e) => {
            warn!("Could not check the runtime for bundled JavaFX: {}", e);
            None
        }
    };

    let mut classpath: Vec<PathBuf> = vec![relative_to(paths.root(), &paths.app_jar())];
    match bundled {
        Some(bundled) => info!("Using JavaFX {} bundled with the runtime", bundled),
        None => {
            let version = session.local_fx_version().ok_or_else(|| {
                error!("No local cached version of JavaFX found, try running 'update-dependency'");
                LaunchFailure::DependencyMissing
            })?;
            let classifier = session.platform().classifier();
            let files = module_files(&paths.dependencies_dir(), JAVAFX, &version, classifier)
                .ok_or(LaunchFailure::DependencyMissing)?;
            info!("Using cached JavaFX {}:{}", version, classifier);
            classpath.extend(files.iter().map(|file| relative_to(paths.root(), file)));
        }
    }
    let classpath: OsString = std::env::join_paths(&classpath).map_err(LaunchFailure::InvalidClasspath)?;

    info!("Running Recaf '{}' with '{}'", app_version, options.executable.display());
    let mut command = Command::new(&options.executable);
    command.arg("-cp").arg(&classpath).arg(MAIN_CLASS).current_dir(paths.root());
    supervise(&mut command, options.output, options.grace_period, options.observer)
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Spawns `command`, drains both output streams on their own threads and waits for exit.
///
/// With a `grace_period`, a timer thread notifies `observer` if the child is still running
/// when it expires. The exit code is always reported as observed.
pub fn supervise(
    command: &mut Command,
    output: OutputMode,
    grace_period: Option<Duration>,
    observer: Option<&dyn LaunchObserver>,
) -> Result<LaunchResult, LaunchFailure> {
    let program = PathBuf::from(command.get_program());
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| LaunchFailure::Spawn { java: program, source })?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let outlived = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let out_drain = stdout.map(|pipe| scope.spawn(move || drain(pipe, output, false)));
        let err_drain = stderr.map(|pipe| scope.spawn(move || drain(pipe, output, true)));

        let (exited, exit_signal) = mpsc::channel::<()>();
        if let Some(grace) = grace_period {
            let outlived = &outlived;
            scope.spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = exit_signal.recv_timeout(grace) {
                    debug!("Process still running after {:?}", grace);
                    outlived.store(true, Ordering::Relaxed);
                    if let Some(observer) = observer {
                        observer.still_running(grace);
                    }
                }
            });
        }

        let status = child.wait();
        drop(exited);
        let exit_code = match status {
            Ok(status) => exit_code(status),
            // The launcher is being torn down, not the child.
            Err(e) if e.kind() == ErrorKind::Interrupted => SUCCESS,
            Err(e) => {
                let _ = child.kill();
                return Err(LaunchFailure::Wait(e));
            }
        };

        let stdout = out_drain.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = err_drain.and_then(|h| h.join().ok()).unwrap_or_default();
        if exit_code != SUCCESS {
            error!("Process exited with code {}: {}", exit_code, describe_exit_code(exit_code));
        }
        Ok(LaunchResult {
            exit_code,
            stdout,
            stderr,
            outlived_grace_period: outlived.load(Ordering::Relaxed),
        })
    })
}

/// Reads `pipe` line by line until it closes.
fn drain<R: Read>(pipe: R, output: OutputMode, is_stderr: bool) -> String {
    let mut reader = BufReader::new(pipe);
    let mut captured = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                if output.forwards() {
                    let _ = if is_stderr {
                        std::io::stderr().lock().write_all(text.as_bytes())
                    } else {
                        std::io::stdout().lock().write_all(text.as_bytes())
                    };
                }
                if output.captures() {
                    captured.push_str(&text);
                }
            }
            Err(e) => {
                debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
    captured
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::paths::LauncherPaths;
    use crate::jar::test_support::build_config_class;
    use crate::jar::tests::write_jar;
    use crate::jar::BUILD_CONFIG_ENTRY;
    use crate::error::ProbeError;
    use crate::platform::Platform;
    use crate::resolver::module_file_name;
    use crate::version::FxVersion;
    use tempfile::tempdir;

    fn install_jar(paths: &LauncherPaths) {
        let class = build_config_class(&[("VERSION", "4.1.0"), ("GIT_REVISION", "12")]);
        write_jar(&paths.app_jar(), &[(BUILD_CONFIG_ENTRY, class)]);
    }

    /// A runtime answering from memory.
    struct FakeRuntime(Result<Option<&'static str>, &'static str>);

    impl RuntimeProbe for FakeRuntime {
        fn major_version(&self) -> Option<u32> {
            Some(21)
        }

        fn bundled_dependency_version(&self) -> Result<Option<FxVersion>, ProbeError> {
            match self.0 {
                Ok(bundled) => Ok(bundled.map(FxVersion::new)),
                Err(text) => Err(ProbeError::Unparseable(text.to_string())),
            }
        }
    }

    fn fake_options(runtime: &FakeRuntime) -> LaunchOptions<'_> {
        LaunchOptions {
            executable: PathBuf::from("/no/java"),
            probe: runtime,
            output: OutputMode::Capture,
            grace_period: None,
            observer: None,
        }
    }

    fn installed_session(dir: &Path, cached_fx: bool) -> Session {
        let paths = LauncherPaths::new(dir);
        paths.ensure_dirs().unwrap();
        install_jar(&paths);
        if cached_fx {
            for module in JAVAFX.required {
                std::fs::write(paths.dependencies_dir().join(module_file_name(module, "21.0.1", "linux")), b"jar")
                    .unwrap();
            }
        }
        Session::new(paths, Platform::Linux)
    }

    #[test]
    fn test_exit_code_table() {
        assert_eq!(describe_exit_code(0), "Success");
        assert_eq!(describe_exit_code(101), "JavaFX has missing classes");
        assert_eq!(describe_exit_code(103), describe_exit_code(104));
        assert_eq!(describe_exit_code(160), "Recaf must be run with a JDK, but was run with a JRE");
        assert_eq!(describe_exit_code(1), "<unknown error>");
        assert_eq!(describe_exit_code(-1), "<unknown error>");
    }

    #[test]
    fn test_not_installed_wins_over_missing_dependency() {
        let dir = tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        paths.ensure_dirs().unwrap();
        let session = Session::new(paths, Platform::Linux);
        let java = JavaInstall::new("/no/java");
        let options = LaunchOptions::new(&java);
        assert!(matches!(launch(&session, &options), Err(LaunchFailure::NotInstalled(_))));
    }

    #[test]
    fn test_dependency_missing() {
        let dir = tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        paths.ensure_dirs().unwrap();
        install_jar(&paths);
        let session = Session::new(paths, Platform::Linux);
        let java = JavaInstall::new("/no/java");
        let options = LaunchOptions::new(&java);
        assert!(matches!(launch(&session, &options), Err(LaunchFailure::DependencyMissing)));
    }

    #[test]
    fn test_spawn_failure_is_a_launch_failure() {
        let dir = tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        paths.ensure_dirs().unwrap();
        install_jar(&paths);
        for module in JAVAFX.required {
            std::fs::write(paths.dependencies_dir().join(module_file_name(module, "21.0.1", "linux")), b"jar").unwrap();
        }
        let session = Session::new(paths, Platform::Linux);
        let java = JavaInstall::new("/no/java");
        let options = LaunchOptions::new(&java);
        assert!(matches!(launch(&session, &options), Err(LaunchFailure::Spawn { .. })));
    }

    #[test]
    fn test_bundled_dependency_skips_cache() {
        let dir = tempdir().unwrap();
        let session = installed_session(dir.path(), false);
        let runtime = FakeRuntime(Ok(Some("22.0.1")));
        // Getting as far as spawning means the missing cache was not consulted.
        match launch(&session, &fake_options(&runtime)) {
            Err(LaunchFailure::Spawn { java, .. }) => assert_eq!(java, PathBuf::from("/no/java")),
            other => panic!("expected a spawn failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_runtime_without_cache_is_missing_dependency() {
        let dir = tempdir().unwrap();
        let session = installed_session(dir.path(), false);
        let runtime = FakeRuntime(Err("garbage"));
        assert!(matches!(
            launch(&session, &fake_options(&runtime)),
            Err(LaunchFailure::DependencyMissing)
        ));
    }

    #[test]
    fn test_unreadable_runtime_falls_back_to_cache() {
        let dir = tempdir().unwrap();
        let session = installed_session(dir.path(), true);
        let runtime = FakeRuntime(Err("garbage"));
        assert!(matches!(
            launch(&session, &fake_options(&runtime)),
            Err(LaunchFailure::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::atomic::AtomicUsize;

        /// A `java` that prints its working directory and arguments, then exits with `code`.
        fn fake_java_home(dir: &Path, code: i32, bundled_fx: bool) -> JavaInstall {
            let bin = dir.join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            let script = bin.join("java");
            std::fs::write(&script, format!("#!/bin/sh\npwd\necho \"$@\"\necho oops >&2\nexit {code}\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            if bundled_fx {
                std::fs::create_dir_all(dir.join("lib")).unwrap();
                std::fs::write(dir.join("lib").join("javafx.properties"), "javafx.version=22.0.1\n").unwrap();
            }
            JavaInstall::from_home(dir)
        }

        #[test]
        fn test_launch_with_cached_dependency() {
            let root = tempdir().unwrap();
            let home = tempdir().unwrap();
            let paths = LauncherPaths::new(root.path());
            paths.ensure_dirs().unwrap();
            install_jar(&paths);
            for module in JAVAFX.required {
                std::fs::write(paths.dependencies_dir().join(module_file_name(module, "21.0.1", "linux")), b"jar")
                    .unwrap();
            }
            let session = Session::new(paths, Platform::Linux);
            let java = fake_java_home(home.path(), 0, false);
            let mut options = LaunchOptions::new(&java);
            options.output = OutputMode::Capture;

            let result = launch(&session, &options).unwrap();
            assert!(result.succeeded());
            let mut lines = result.stdout.lines();
            let cwd = lines.next().unwrap();
            assert_eq!(
                std::fs::canonicalize(cwd).unwrap(),
                std::fs::canonicalize(root.path()).unwrap()
            );
            let args = lines.next().unwrap();
            assert!(args.starts_with("-cp recaf.jar:dependencies/javafx-"));
            assert!(args.contains("dependencies/javafx-media-21.0.1-linux.jar"));
            assert!(args.ends_with(MAIN_CLASS));
            assert_eq!(result.stderr, "oops\n");
        }

        #[test]
        fn test_launch_with_bundled_dependency() {
            let root = tempdir().unwrap();
            let home = tempdir().unwrap();
            let paths = LauncherPaths::new(root.path());
            paths.ensure_dirs().unwrap();
            install_jar(&paths);
            let session = Session::new(paths, Platform::Linux);
            let java = fake_java_home(home.path(), ERR_NOT_A_JDK, true);
            let mut options = LaunchOptions::new(&java);
            options.output = OutputMode::Capture;

            let result = launch(&session, &options).unwrap();
            assert!(!result.succeeded());
            assert_eq!(result.code_description(), describe_exit_code(ERR_NOT_A_JDK));
            assert!(result.stdout.contains(&format!("-cp recaf.jar {MAIN_CLASS}")));
        }

        #[test]
        fn test_large_output_does_not_deadlock() {
            let mut command = Command::new("sh");
            command.arg("-c").arg(
                "i=0; while [ $i -lt 4000 ]; do \
                 echo 'stdout line that is long enough to fill a pipe buffer quickly'; \
                 echo 'stderr line that is long enough to fill a pipe buffer quickly' >&2; \
                 i=$((i+1)); done; exit 3",
            );
            let result = supervise(&mut command, OutputMode::Capture, None, None).unwrap();
            assert_eq!(result.exit_code, 3);
            assert_eq!(result.stdout.lines().count(), 4000);
            assert_eq!(result.stderr.lines().count(), 4000);
            assert!(result.stdout.len() > 64 * 1024);
        }

        #[derive(Default)]
        struct CountingObserver(AtomicUsize);

        impl LaunchObserver for CountingObserver {
            fn still_running(&self, _grace_period: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        #[test]
        fn test_grace_period_notifies_long_running_child() {
            let observer = CountingObserver::default();
            let mut command = Command::new("sh");
            command.arg("-c").arg("sleep 1");
            let result = supervise(
                &mut command,
                OutputMode::Capture,
                Some(Duration::from_millis(100)),
                Some(&observer),
            )
            .unwrap();
            assert!(result.succeeded());
            assert!(result.outlived_grace_period);
            assert_eq!(observer.0.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn test_grace_period_does_not_mask_failures() {
            let observer = CountingObserver::default();
            let mut command = Command::new("sh");
            command.arg("-c").arg("exit 105");
            let result = supervise(
                &mut command,
                OutputMode::Capture,
                Some(Duration::from_secs(5)),
                Some(&observer),
            )
            .unwrap();
            assert_eq!(result.exit_code, ERR_FX_OLD_VERSION);
            assert!(!result.outlived_grace_period);
            assert_eq!(observer.0.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_signal_maps_to_shell_convention() {
            let mut command = Command::new("sh");
            command.arg("-c").arg("kill -TERM $$");
            let result = supervise(&mut command, OutputMode::Capture, None, None).unwrap();
            assert_eq!(result.exit_code, 128 + 15);
        }
    }
}
