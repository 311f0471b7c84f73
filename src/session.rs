use std::cell::OnceCell;
use crate::compat::CompatibilityPolicy;
use crate::global::paths::LauncherPaths;
use crate::platform::Platform;
use crate::resolver::{find_local_version, JAVAFX};
use crate::version::FxVersion;

/// State shared by the operations of one launcher invocation.
///
/// Holds the memoized local JavaFX version, so independent sessions never see each other's cache.
#[derive(Debug)]
pub struct Session {
    paths: LauncherPaths,
    platform: Platform,
    policy: CompatibilityPolicy,
    local_fx: OnceCell<Option<FxVersion>>,
}

impl Session {
    pub fn new(paths: LauncherPaths, platform: Platform) -> Self {
        Self {
            paths,
            platform,
            policy: CompatibilityPolicy::default(),
            local_fx: OnceCell::new(),
        }
    }

    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn policy(&self) -> &CompatibilityPolicy {
        &self.policy
    }

    /// Newest complete JavaFX install in the dependency cache, computed once per session.
    pub fn local_fx_version(&self) -> Option<FxVersion> {
        self.local_fx
            .get_or_init(|| {
                find_local_version(&self.paths.dependencies_dir(), JAVAFX, self.platform.classifier())
            })
            .clone()
    }

    /// Forgets the memoized local version. Called after anything touches the dependency cache.
    pub fn invalidate(&mut self) {
        self.local_fx = OnceCell::new();
    }
}
