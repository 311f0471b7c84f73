use std::cell::Cell;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use relaunch::compat::{blocks_launch, describe, evaluate};
use relaunch::global::cache::{check_clear_cache, CacheLimits};
use relaunch::jar::installed_version;
use relaunch::launch::{launch, LaunchFailure, LaunchObserver, LaunchOptions, OutputMode};
use relaunch::*;
use tracing::info;
use crate::cli::{RelaunchCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    logging::init(cli.verbose);
    let paths = LauncherPaths::from_env()?;
    let config = LauncherConfig::load_or_default(paths.config_file());
    let mut session = Session::new(paths, Platform::current());

    match cli.command {
        RelaunchCommand::Compatibility { java, allow_dependency_problems } => {
            let allow = allow_dependency_problems || config.allow_dependency_problems;
            execute_compatibility(&session, &select_java(java, &config), allow).map(|_| ())
        }
        RelaunchCommand::Version => {
            execute_version(&session)
        }
        RelaunchCommand::Update => {
            execute_update(&session, &config)
        }
        RelaunchCommand::UpdateSnapshot { branch } => {
            let branch = branch.or_else(|| config.snapshot_branch.clone());
            execute_update_snapshot(&session, &config, branch.as_deref())
        }
        RelaunchCommand::UpdateDependency { version, force, clear, keep_latest, max_count, max_size, java } => {
            let limits = dependency_cache_limits(&config.cache, clear, keep_latest, max_count, max_size);
            check_clear_cache(&mut session, clear, &limits);
            let request = FxUpdateRequest {
                target: version.map(FxVersion::new),
                force,
                runtime_major: select_java(java, &config).major_version(),
            };
            execute_update_dependency(&mut session, &config, &request)
        }
        RelaunchCommand::Run { java, grace } => {
            let grace = match grace {
                Some(0) => None,
                Some(seconds) => Some(Duration::from_secs(seconds)),
                None => config.launch.grace_period(),
            };
            execute_run(&session, select_java(java, &config), grace)
        }
        RelaunchCommand::Auto { snapshot, branch, java } => {
            let branch = branch.or_else(|| config.snapshot_branch.clone());
            execute_auto(&mut session, &config, snapshot, branch.as_deref(), select_java(java, &config))
        }
    }
}

fn select_java(java: Option<PathBuf>, config: &LauncherConfig) -> JavaInstall {
    java.or_else(|| config.java_executable.clone())
        .map(JavaInstall::new)
        .unwrap_or_else(JavaInstall::default_for_launcher)
}

/// Cache limits for `update-dependency`.
///
/// An explicit `--clear` only keeps the newest install when `--keep-latest` is given. Clearing
/// because a limit was exceeded also honours the configured `keep_latest`.
fn dependency_cache_limits(
    config: &CacheLimits,
    clear: bool,
    keep_latest: bool,
    max_count: Option<usize>,
    max_size: Option<u64>,
) -> CacheLimits {
    CacheLimits {
        max_files: max_count.unwrap_or(config.max_files),
        max_bytes: max_size.unwrap_or(config.max_bytes),
        keep_latest: keep_latest || (!clear && config.keep_latest),
    }
}

fn http_source(config: &LauncherConfig) -> Result<HttpSource> {
    HttpSource::new(config.network.connect_timeout(), config.network.read_timeout())
        .context("Could not create the HTTP client")
}

/// Prints a line per 10% of a download.
#[derive(Default)]
struct ConsoleProgress {
    last_step: Cell<u64>,
}

impl TransferListener for ConsoleProgress {
    fn start(&self, total: Option<u64>) {
        self.last_step.set(0);
        match total {
            Some(total) => println!("Downloading {:.1} MB", total as f64 / 1_000_000.0),
            None => println!("Downloading"),
        }
    }

    fn progress(&self, current: u64, total: Option<u64>) {
        let Some(total) = total.filter(|total| *total > 0) else {
            return;
        };
        let step = (current.saturating_mul(10) / total).min(10);
        if step > self.last_step.get() {
            self.last_step.set(step);
            print!("\r  {}%", step * 10);
            let _ = std::io::stdout().flush();
        }
    }

    fn end(&self, current: u64, _total: Option<u64>) {
        println!("\r  done ({} bytes)", current);
    }
}

struct StartupNotice;

impl LaunchObserver for StartupNotice {
    fn still_running(&self, grace_period: Duration) {
        info!("Recaf is still running after {}s, assuming it started", grace_period.as_secs());
    }
}

fn report<V: Display>(name: &str, result: &UpdateResult<V>) -> Result<()> {
    let show = |version: Option<&V>| version.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string());
    match result.status {
        UpdateStatus::UpToDate => {
            println!("{} is {} ({})", name, "up to date".green(), show(result.current()));
        }
        UpdateStatus::Updated => {
            println!(
                "{} {} from {} to {}",
                name,
                "updated".green(),
                show(result.from.as_ref()),
                show(result.to.as_ref())
            );
        }
        status => {
            bail!(
                "{} update {}: {}",
                name,
                status,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    Ok(())
}

/// Prints the compatibility report and fails if a problem blocks launching.
///
/// Returns the Java release of `java`.
pub fn execute_compatibility(session: &Session, java: &JavaInstall, allow_dependency_problems: bool) -> Result<Option<u32>> {
    let runtime = java.major_version();
    let bundled = java.bundled_dependency_version().ok().flatten();
    let dependency = bundled.or_else(|| session.local_fx_version());
    let problems = evaluate(runtime, dependency.as_ref(), session.policy());

    match runtime {
        Some(runtime) => println!("Java: {} ({})", runtime, java.executable().display()),
        None => println!("Java: {} ({})", "unknown".yellow(), java.executable().display()),
    }
    match &dependency {
        Some(dependency) => println!("JavaFX: {}", dependency),
        None => println!("JavaFX: {}", "missing".yellow()),
    }
    if problems.is_empty() {
        println!("{}", "No compatibility problems".green());
        return Ok(runtime);
    }
    for problem in &problems {
        println!("  {} {}", "-".red(), describe(problem));
    }
    if blocks_launch(&problems, allow_dependency_problems) {
        bail!("{} compatibility problem(s) found", problems.len());
    }
    Ok(runtime)
}

pub fn execute_version(session: &Session) -> Result<()> {
    let paths = session.paths();
    match installed_version(&paths.app_jar()) {
        Ok(version) => println!("Recaf: {}", version),
        Err(e) => println!("Recaf: {} ({})", "not installed".yellow(), e),
    }
    match session.local_fx_version() {
        Some(version) => println!("JavaFX: {}", version),
        None => println!("JavaFX: {}", "not installed".yellow()),
    }
    println!("Directory: {}", paths.root().display());
    Ok(())
}

pub fn execute_update(session: &Session, config: &LauncherConfig) -> Result<()> {
    let source = http_source(config)?;
    let result = update_app_from_stable(session, &source, &ConsoleProgress::default());
    report("Recaf", &result)
}

pub fn execute_update_snapshot(session: &Session, config: &LauncherConfig, branch: Option<&str>) -> Result<()> {
    let source = http_source(config)?;
    let result = update_app_from_snapshot(session, &source, branch, &ConsoleProgress::default());
    report("Recaf", &result)
}

pub fn execute_update_dependency(session: &mut Session, config: &LauncherConfig, request: &FxUpdateRequest) -> Result<()> {
    let source = http_source(config)?;
    let result = update_dependency(session, &source, request, &ConsoleProgress::default());
    report("JavaFX", &result)
}

pub fn execute_run(session: &Session, java: JavaInstall, grace_period: Option<Duration>) -> Result<()> {
    let notice = StartupNotice;
    let options = LaunchOptions {
        output: OutputMode::Inherit,
        grace_period,
        observer: Some(&notice),
        ..LaunchOptions::new(&java)
    };
    match launch(session, &options) {
        Ok(result) if result.succeeded() => Ok(()),
        Ok(result) => bail!("Recaf exited with code {}: {}", result.exit_code, result.code_description()),
        Err(LaunchFailure::NotInstalled(e)) => bail!("Recaf is not installed, run `relaunch update` first ({e})"),
        Err(LaunchFailure::DependencyMissing) => {
            bail!("JavaFX is not installed, run `relaunch update-dependency` first")
        }
        Err(e) => Err(e.into()),
    }
}

/// Compatibility check, cache housekeeping, updates, then launch. Stops at the first failure.
pub fn execute_auto(
    session: &mut Session,
    config: &LauncherConfig,
    snapshot: bool,
    branch: Option<&str>,
    java: JavaInstall,
) -> Result<()> {
    // JavaFX problems are fixed by the update below.
    let runtime = execute_compatibility(session, &java, true)?;
    check_clear_cache(session, false, &config.cache);

    let source = http_source(config)?;
    let progress = ConsoleProgress::default();
    let request = FxUpdateRequest {
        runtime_major: runtime,
        ..FxUpdateRequest::default()
    };
    report("JavaFX", &update_dependency(session, &source, &request, &progress))?;

    let result = if snapshot {
        update_app_from_snapshot(session, &source, branch, &progress)
    } else {
        update_app_from_stable(session, &source, &progress)
    };
    report("Recaf", &result)?;

    execute_run(session, java, config.launch.grace_period())
}
