use std::collections::{BTreeMap, BTreeSet};
use crate::version::{FxVersion, Version};

/// Lowest Java release the launched application can run on.
pub const MIN_RUNTIME_VERSION: u32 = 17;
/// Oldest JavaFX major release worth running with.
pub const MIN_SUGGESTED_FX_VERSION: u32 = 21;

/// A problem with the local environment that may prevent a launch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompatibilityProblem {
    UnknownRuntimeVersion,
    OutdatedRuntimeVersion { found: u32, required: u32 },
    OutdatedDependency { found: String },
    DependencyTooNewForRuntime { dependency: String, required_runtime: u32, runtime: u32 },
    DependencyMissing,
}

impl CompatibilityProblem {
    /// `true` for problems with the Java runtime itself, as opposed to the cached JavaFX.
    pub fn is_runtime_problem(&self) -> bool {
        matches!(
            self,
            CompatibilityProblem::UnknownRuntimeVersion
                | CompatibilityProblem::OutdatedRuntimeVersion { .. }
        )
    }
}

/// Floor-keyed table mapping a JavaFX major release to the minimum Java release it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    floors: BTreeMap<u32, u32>,
}

impl PolicyTable {
    pub fn new(entries: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            floors: entries.into_iter().collect(),
        }
    }

    /// Minimum Java release for a JavaFX major release, using the greatest floor `<= fx_major`.
    pub fn required_runtime(&self, fx_major: u32) -> Option<u32> {
        self.floors
            .range(..=fx_major)
            .next_back()
            .map(|(_, runtime)| *runtime)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        // JavaFX 23 dropped support for anything below Java 21.
        PolicyTable::new([(0, 17), (23, 21)])
    }
}

/// Everything the compatibility check compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityPolicy {
    pub min_runtime: u32,
    pub min_suggested_dependency: u32,
    pub table: PolicyTable,
}

impl Default for CompatibilityPolicy {
    fn default() -> Self {
        Self {
            min_runtime: MIN_RUNTIME_VERSION,
            min_suggested_dependency: MIN_SUGGESTED_FX_VERSION,
            table: PolicyTable::default(),
        }
    }
}

impl CompatibilityPolicy {
    /// Whether `version` can run on a Java runtime of release `runtime_major`.
    ///
    /// Versions without a readable major release, or without a table entry, are rejected.
    pub fn accepts(&self, runtime_major: u32, version: &FxVersion) -> bool {
        version
            .major_version()
            .ok()
            .and_then(|major| self.table.required_runtime(major))
            .is_some_and(|required| runtime_major >= required)
    }
}

/// Evaluates a Java release and the cached JavaFX version against `policy`.
///
/// # Arguments
/// * `runtime_major` - Java major release, `None` if it could not be determined.
/// * `dependency` - Locally cached JavaFX version, `None` if nothing complete is cached.
pub fn evaluate(
    runtime_major: Option<u32>,
    dependency: Option<&FxVersion>,
    policy: &CompatibilityPolicy,
) -> BTreeSet<CompatibilityProblem> {
    let mut problems = BTreeSet::new();

    match runtime_major {
        None => {
            problems.insert(CompatibilityProblem::UnknownRuntimeVersion);
        }
        Some(found) if found < policy.min_runtime => {
            problems.insert(CompatibilityProblem::OutdatedRuntimeVersion {
                found,
                required: policy.min_runtime,
            });
        }
        Some(_) => {}
    }

    let Some(dependency) = dependency else {
        problems.insert(CompatibilityProblem::DependencyMissing);
        return problems;
    };

    let outdated = CompatibilityProblem::OutdatedDependency {
        found: dependency.to_string(),
    };
    match dependency.major_version() {
        // An unreadable version is treated like an old one.
        Err(_) => {
            problems.insert(outdated);
        }
        Ok(major) if major < policy.min_suggested_dependency => {
            problems.insert(outdated);
        }
        Ok(major) => {
            let required = policy.table.required_runtime(major);
            if let (Some(required_runtime), Some(runtime)) = (required, runtime_major) {
                if required_runtime > runtime {
                    problems.insert(CompatibilityProblem::DependencyTooNewForRuntime {
                        dependency: dependency.to_string(),
                        required_runtime,
                        runtime,
                    });
                }
            }
        }
    }
    problems
}

/// Whether the problem set should stop a launch.
///
/// Runtime problems always block. JavaFX problems block unless `allow_dependency_problems` is set.
pub fn blocks_launch(problems: &BTreeSet<CompatibilityProblem>, allow_dependency_problems: bool) -> bool {
    problems
        .iter()
        .any(|problem| problem.is_runtime_problem() || !allow_dependency_problems)
}

/// Human-readable message for a problem.
pub fn describe(problem: &CompatibilityProblem) -> String {
    match problem {
        CompatibilityProblem::UnknownRuntimeVersion => "Unknown Java version".to_string(),
        CompatibilityProblem::OutdatedRuntimeVersion { found, required } => {
            format!("Outdated Java version ({found}), requires {required}+")
        }
        CompatibilityProblem::OutdatedDependency { found } => {
            format!("Outdated JavaFX version ({found}), suggested {MIN_SUGGESTED_FX_VERSION}+")
        }
        CompatibilityProblem::DependencyTooNewForRuntime { dependency, required_runtime, runtime } => {
            format!("JavaFX {dependency} requires Java {required_runtime}+, but Java {runtime} is in use")
        }
        CompatibilityProblem::DependencyMissing => "Missing JavaFX artifacts".to_string(),
    }
}
