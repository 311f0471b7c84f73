//! # Relaunch Core Library
//!
//! This crate contains the core logic of `relaunch`, a launcher that keeps a local Recaf
//! install and its JavaFX dependency up to date and runs it with a suitable Java runtime.
//!
//! Everything lives under one install root (the `RECAF` environment variable, or the
//! platform config directory): the application jar, a `dependencies/` cache of JavaFX
//! module jars, and a `launcher/` directory for the launcher's own files.
//!
//! ## Modules Overview
//! - [`version`] – Version model shared by the application and JavaFX
//! - [`compat`] – Checks a Java runtime and the cached JavaFX against a policy
//! - [`resolver`] – Finds complete local JavaFX installs and compatible remote versions
//! - [`installer`] – Verified, retrying, atomic downloads of JavaFX and the application
//! - [`launch`] – Spawns the application and supervises its output and exit code
//! - [`registry`] – Remote listings: Maven metadata, GitHub releases and CI builds
//! - [`runtime`] – Probes a Java installation
//! - [`jar`] – Reads the version of the installed application jar
//! - [`session`] – Per-invocation state
//! - [`config`] – The launcher's `config.toml`
//! - [`global`] – Install root layout and dependency cache housekeeping
//! - [`web`] – HTTP access behind the [`RemoteSource`] trait
//! - [`util`] – Hashing helpers

pub mod compat;
pub mod config;
pub mod error;
pub mod global;
pub mod installer;
pub mod jar;
pub mod launch;
pub mod logging;
pub mod platform;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod util;
pub mod version;
pub mod web;

pub use compat::{evaluate, CompatibilityPolicy, CompatibilityProblem};
pub use config::LauncherConfig;
pub use error::*;
pub use global::cache::*;
pub use global::paths::LauncherPaths;
pub use installer::{
    update_app_from_snapshot, update_app_from_stable, update_dependency, FxUpdateRequest, UpdateResult,
    UpdateStatus,
};
pub use launch::{launch, LaunchFailure, LaunchOptions, LaunchResult, OutputMode};
pub use platform::Platform;
pub use runtime::{JavaInstall, RuntimeProbe};
pub use session::Session;
pub use version::{AppVersion, FxVersion, Version};
pub use web::{HttpSource, NoProgress, RemoteSource, TransferListener};
