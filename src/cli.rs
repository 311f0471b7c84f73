use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Print debug output. `RUST_LOG` overrides this
    #[clap(short, long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: RelaunchCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum RelaunchCommand {
    /// Checks the Java runtime and the cached JavaFX for compatibility problems
    Compatibility {
        /// Java executable to check, instead of the configured one
        #[clap(long)]
        java: Option<PathBuf>,
        /// Only fail on Java problems, not on JavaFX problems
        #[clap(long)]
        allow_dependency_problems: bool,
    },
    /// Shows the installed Recaf and cached JavaFX versions
    Version,
    /// Updates Recaf to the latest stable release
    Update,
    /// Updates Recaf to the latest CI build
    UpdateSnapshot {
        /// Only consider builds of this branch
        #[clap(long)]
        branch: Option<String>,
    },
    /// Updates the cached JavaFX to the newest version the Java runtime supports
    UpdateDependency {
        /// Install this JavaFX version instead of the newest one
        #[clap(long)]
        version: Option<String>,
        /// Re-download files even if they are up to date
        #[clap(long)]
        force: bool,
        /// Clear the dependency cache first
        #[clap(long)]
        clear: bool,
        /// Keep the newest complete JavaFX install when clearing
        #[clap(long)]
        keep_latest: bool,
        /// Clear the cache when it holds more files than this
        #[clap(long)]
        max_count: Option<usize>,
        /// Clear the cache when it is larger than this many bytes
        #[clap(long)]
        max_size: Option<u64>,
        /// Java executable whose version limits the JavaFX choice
        #[clap(long)]
        java: Option<PathBuf>,
    },
    /// Runs the installed Recaf
    Run {
        /// Java executable to run with, instead of the configured one
        #[clap(long)]
        java: Option<PathBuf>,
        /// Seconds after which a still-running Recaf counts as started, 0 to wait for exit
        #[clap(long)]
        grace: Option<u64>,
    },
    /// Checks compatibility, updates JavaFX and Recaf, then runs Recaf
    Auto {
        /// Update from CI builds instead of stable releases
        #[clap(long)]
        snapshot: bool,
        /// Branch for CI builds
        #[clap(long)]
        branch: Option<String>,
        /// Java executable to run with, instead of the configured one
        #[clap(long)]
        java: Option<PathBuf>,
    },
}
