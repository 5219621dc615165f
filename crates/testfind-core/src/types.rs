//! Shared types: test descriptors, filters, runner kinds.
//!
//! A `TestDescriptor` is the unit every finder produces and the unit the
//! caller builds, installs and runs. All collections are ordered sets so that
//! descriptors serialize deterministically and compare by value.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default runner config file name at a module's root.
pub const MODULE_CONFIG: &str = "AndroidTest.xml";

/// Prefix of the synthetic "build everything in this directory" target.
pub const MODULES_IN: &str = "MODULES-IN-";

// ============================================================================
// Runner Kind
// ============================================================================

/// Which test runner consumes a descriptor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerKind {
    /// The standard Tradefed runner.
    #[default]
    Standard,
    /// The VTS10 Tradefed runner for native VTS-only modules.
    NativeVts,
    /// The Mobly runner.
    Mobly,
    /// Robolectric tests defined in Soong.
    RobolectricModern,
    /// Robolectric tests defined in Make, run through an alias module.
    RobolectricLegacy,
    /// A suite plan (cts, vts, ...) run by its suite harness.
    SuitePlan,
}

impl RunnerKind {
    /// Stable name used in logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerKind::Standard => "standard",
            RunnerKind::NativeVts => "native-vts",
            RunnerKind::Mobly => "mobly",
            RunnerKind::RobolectricModern => "robolectric-modern",
            RunnerKind::RobolectricLegacy => "robolectric-legacy",
            RunnerKind::SuitePlan => "suite-plan",
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Install Location
// ============================================================================

/// Where a test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallLocation {
    /// Deviceless, runs on the build host.
    Host,
    /// Runs on an attached device.
    Device,
}

impl InstallLocation {
    /// Classify an installed artifact path (`out/host/...` vs `out/target/...`).
    pub fn from_installed_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.contains("/host/") {
            Some(InstallLocation::Host)
        } else if lower.contains("/target/") {
            Some(InstallLocation::Device)
        } else {
            None
        }
    }

    /// Collect install locations from a module's installed paths.
    pub fn from_installed_paths<'a>(
        paths: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<InstallLocation> {
        paths
            .into_iter()
            .filter_map(|p| InstallLocation::from_installed_path(p))
            .collect()
    }
}

// ============================================================================
// Test Filter
// ============================================================================

/// A class, package or native filter plus the methods it selects.
///
/// Immutable value object; equality and ordering are by `(pattern, methods)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestFilter {
    /// Fully-qualified class, package, or a native gtest filter expression.
    pub pattern: String,
    /// Selected methods; empty means "all".
    pub methods: BTreeSet<String>,
}

/// Whether a Tradefed filter string is literal or globbing.
///
/// Only the final character counts; a filter ending in anything else, such
/// as the `]` of a parameterized method, has no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    /// Ends in a word character.
    Regular,
    /// Ends in `*`, `?` or `|`.
    Wildcard,
}

impl FilterKind {
    /// Kind of a single filter string, if it has one.
    pub fn of(filter: &str) -> Option<Self> {
        match filter.chars().next_back()? {
            '*' | '?' | '|' => Some(FilterKind::Wildcard),
            c if c.is_alphanumeric() || c == '_' => Some(FilterKind::Regular),
            _ => None,
        }
    }
}

impl TestFilter {
    /// Create a filter with methods.
    pub fn new<I, S>(pattern: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestFilter {
            pattern: pattern.into(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a filter without methods.
    pub fn pattern_only(pattern: impl Into<String>) -> Self {
        TestFilter {
            pattern: pattern.into(),
            methods: BTreeSet::new(),
        }
    }

    /// Render as Tradefed include-filter strings: `pattern` or `pattern#method`.
    pub fn to_tf_strings(&self) -> BTreeSet<String> {
        if self.methods.is_empty() {
            return BTreeSet::from([self.pattern.clone()]);
        }
        self.methods
            .iter()
            .map(|m| format!("{}#{}", self.pattern, m))
            .collect()
    }

    /// Kinds of the rendered filter strings.
    pub fn kinds(&self) -> BTreeSet<FilterKind> {
        self.to_tf_strings()
            .iter()
            .filter_map(|s| FilterKind::of(s))
            .collect()
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.methods.is_empty() {
            write!(f, "{}", self.pattern)
        } else {
            let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
            write!(f, "{}#{}", self.pattern, methods.join(","))
        }
    }
}

// ============================================================================
// Test Descriptor
// ============================================================================

/// A fully resolved, buildable and runnable test.
///
/// Every field is always serialized: the persistent cache compares the field
/// set of stored descriptors against the current one to detect stale formats.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestDescriptor {
    /// Canonical identifier, possibly rewritten during synthesis.
    pub test_name: String,
    /// Name before the rewrite; empty unless renamed.
    pub raw_test_name: String,
    /// Runner that consumes this descriptor.
    pub runner: RunnerKind,
    /// Targets to build; only ever grows.
    pub build_targets: BTreeSet<String>,
    /// Classification tags copied from the module record.
    pub module_class: BTreeSet<String>,
    /// Host and/or device.
    pub install_locations: BTreeSet<InstallLocation>,
    /// Class, package or native filters.
    pub filters: BTreeSet<TestFilter>,
    /// Runner config path relative to the source root.
    pub config_path: String,
    /// Compatibility suites of the module.
    pub compatibility_suites: BTreeSet<String>,
    /// Extra artifacts to install, in install order.
    pub artifacts: Vec<String>,
    /// Whether the runner should aggregate metrics.
    pub aggregate_metrics_result: bool,
    /// Mainline modules the test runs against (`test[a.apk+b.apex]`).
    pub mainline_modules: BTreeSet<String>,
    /// Runner-accessible data, e.g. installed paths for Mobly.
    pub runner_data: Vec<String>,
    /// Extra module arguments, e.g. from TEST_MAPPING options.
    pub module_args: Vec<String>,
    /// Forced host run (TEST_MAPPING `host: true`).
    pub host: bool,
    /// Whether the descriptor came from a TEST_MAPPING entry.
    pub from_test_mapping: bool,
    /// Name of the finder that produced the descriptor.
    pub finder: String,
}

impl TestDescriptor {
    /// Create a descriptor for the standard runner with no targets yet.
    pub fn new(test_name: impl Into<String>, config_path: impl Into<String>) -> Self {
        TestDescriptor {
            test_name: test_name.into(),
            config_path: config_path.into(),
            ..TestDescriptor::default()
        }
    }

    /// Builder-style filter setter.
    pub fn with_filters(mut self, filters: BTreeSet<TestFilter>) -> Self {
        self.filters = filters;
        self
    }

    /// Builder-style compatibility suite setter.
    pub fn with_suites<'a>(mut self, suites: impl IntoIterator<Item = &'a String>) -> Self {
        self.compatibility_suites = suites.into_iter().cloned().collect();
        self
    }

    /// Add a build target.
    pub fn add_build_target(&mut self, target: impl Into<String>) {
        self.build_targets.insert(target.into());
    }

    /// Rewrite `test_name`, remembering the original name once.
    pub fn rename(&mut self, new_name: impl Into<String>) {
        let new_name = new_name.into();
        if new_name == self.test_name {
            return;
        }
        if self.raw_test_name.is_empty() {
            self.raw_test_name = std::mem::take(&mut self.test_name);
        }
        self.test_name = new_name;
    }

    /// Module directories recorded through `MODULES-IN-` targets.
    ///
    /// Every `-` maps back to `/`, so a directory whose name itself holds a
    /// `-` comes back split at that point. Such a path never equals the
    /// module's current path, so the cache re-resolves those entries.
    pub fn test_paths(&self) -> Vec<String> {
        self.build_targets
            .iter()
            .filter_map(|t| t.strip_prefix(MODULES_IN))
            .map(|dir| dir.replace('-', "/"))
            .collect()
    }

    /// All filters rendered as Tradefed strings.
    pub fn filter_strings(&self) -> BTreeSet<String> {
        self.filters.iter().flat_map(|f| f.to_tf_strings()).collect()
    }

    /// Filter kinds used by this descriptor.
    pub fn filter_kinds(&self) -> BTreeSet<FilterKind> {
        self.filters.iter().flat_map(|f| f.kinds()).collect()
    }
}

impl fmt::Display for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&str> = self.build_targets.iter().map(String::as_str).collect();
        write!(
            f,
            "{} (runner: {}, config: {}, targets: [{}])",
            self.test_name,
            self.runner,
            self.config_path,
            targets.join(", ")
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
