//! Read-only module index.
//!
//! The build system emits a `module-info.json` document mapping module names
//! to records. `ModuleIndex` loads it once per invocation, builds a path
//! index, and answers every lookup the finders need. Nothing in the engine
//! mutates it after construction.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::test_config;
use crate::types::MODULE_CONFIG;

// ============================================================================
// Constants
// ============================================================================

/// Module class of native gtest modules.
pub const CLASS_NATIVE_TESTS: &str = "NATIVE_TESTS";
/// Module class of legacy (Make-defined) Robolectric modules.
pub const CLASS_ROBOLECTRIC: &str = "ROBOLECTRIC";
/// Module class of Java libraries.
pub const CLASS_JAVA_LIBRARIES: &str = "JAVA_LIBRARIES";
/// Module class of installable apps.
pub const CLASS_APPS: &str = "APPS";
/// Test option tag that marks Mobly tests.
pub const TAG_MOBLY: &str = "mobly";

const MANIFEST: &str = "AndroidManifest.xml";

// ============================================================================
// Errors
// ============================================================================

/// Errors loading the module index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index file could not be read.
    #[error("failed to read module index {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index file is not valid module-info JSON.
    #[error("failed to parse module index {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Module Record
// ============================================================================

/// One module as described by the build system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default)]
    pub class: Vec<String>,
    #[serde(default)]
    pub srcs: Vec<String>,
    #[serde(default)]
    pub test_config: Vec<String>,
    #[serde(default)]
    pub compatibility_suites: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub auto_test_config: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_unit_test: bool,
    #[serde(default)]
    pub supported_variants: Vec<String>,
    #[serde(default)]
    pub test_mainline_modules: Vec<String>,
    #[serde(default)]
    pub test_options_tags: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub robolectric_test: bool,
}

/// Build-system flags come as `true`, `[true]` or `"true"`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        List(Vec<bool>),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::List(values)) => values.first().copied().unwrap_or(false),
        Some(Flag::Text(text)) => text.eq_ignore_ascii_case("true"),
        None => false,
    })
}

impl ModuleRecord {
    /// True if the record carries the given module class.
    pub fn has_class(&self, class: &str) -> bool {
        self.class.iter().any(|c| c == class)
    }

    /// First declared path, if any.
    pub fn first_path(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

/// Flavor of a Robolectric module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobolectricType {
    /// Declared in Soong with `robolectric_test`.
    Modern,
    /// Declared in Make with class `ROBOLECTRIC`.
    Legacy,
}

// ============================================================================
// Module Index
// ============================================================================

/// Immutable lookup over all modules of a source tree.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    root: PathBuf,
    name_to_record: BTreeMap<String, ModuleRecord>,
    path_to_names: BTreeMap<String, Vec<String>>,
}

impl ModuleIndex {
    /// Load a module-info JSON file for the tree rooted at `root`.
    pub fn load(root: impl Into<PathBuf>, index_file: &Path) -> Result<Self, IndexError> {
        let content = fs::read_to_string(index_file).map_err(|source| IndexError::Io {
            path: index_file.to_path_buf(),
            source,
        })?;
        let records: BTreeMap<String, ModuleRecord> =
            serde_json::from_str(&content).map_err(|source| IndexError::Parse {
                path: index_file.to_path_buf(),
                source,
            })?;
        let index = Self::from_records(root, records);
        info!(
            modules = index.name_to_record.len(),
            file = %index_file.display(),
            "loaded module index"
        );
        Ok(index)
    }

    /// Build an index from already-decoded records.
    pub fn from_records(
        root: impl Into<PathBuf>,
        records: impl IntoIterator<Item = (String, ModuleRecord)>,
    ) -> Self {
        let mut name_to_record = BTreeMap::new();
        for (key, mut record) in records {
            if record.module_name.is_empty() {
                record.module_name = key.clone();
            }
            name_to_record.insert(key, record);
        }

        // Cross-compiled and multi-arch variants share a single module, so
        // only records keyed by their own name enter the path index.
        let mut path_to_names: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, record) in &name_to_record {
            if key != &record.module_name {
                continue;
            }
            for path in &record.path {
                path_to_names
                    .entry(path.clone())
                    .or_default()
                    .push(key.clone());
            }
        }

        ModuleIndex {
            root: root.into(),
            name_to_record,
            path_to_names,
        }
    }

    /// Source tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.name_to_record.len()
    }

    /// True when the index holds no module.
    pub fn is_empty(&self) -> bool {
        self.name_to_record.is_empty()
    }

    /// All records, keyed by index key.
    pub fn records(&self) -> impl Iterator<Item = (&String, &ModuleRecord)> {
        self.name_to_record.iter()
    }

    // ------------------------------------------------------------------------
    // Name lookups
    // ------------------------------------------------------------------------

    /// Record for a module; falls back to matching `module_name`, since the
    /// build system suffixes second-arch keys with their bitness.
    pub fn get_module_info(&self, name: &str) -> Option<&ModuleRecord> {
        self.name_to_record.get(name).or_else(|| {
            self.name_to_record
                .values()
                .find(|record| record.module_name == name)
        })
    }

    /// True if `name` is a module.
    pub fn is_module(&self, name: &str) -> bool {
        self.get_module_info(name).is_some()
    }

    /// Relative paths of a module; empty if unknown.
    pub fn get_paths(&self, name: &str) -> &[String] {
        self.get_module_info(name)
            .map(|record| record.path.as_slice())
            .unwrap_or_default()
    }

    /// Installed artifacts of a module, joined to the root.
    pub fn get_installed_paths(&self, name: &str) -> Vec<PathBuf> {
        self.get_module_info(name)
            .map(|record| record.installed.iter().map(|p| self.root.join(p)).collect())
            .unwrap_or_default()
    }

    /// Modules declared exactly at `rel_path`.
    pub fn get_module_names(&self, rel_path: &str) -> Vec<String> {
        self.path_to_names.get(rel_path).cloned().unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Path and dependency lookups
    // ------------------------------------------------------------------------

    /// Modules whose path list contains `rel_path`.
    pub fn get_modules_by_path(&self, rel_path: &str) -> BTreeSet<String> {
        self.name_to_record
            .iter()
            .filter(|(_, record)| record.path.iter().any(|p| p == rel_path))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Modules listing `rel_path` among their sources.
    pub fn get_modules_by_path_in_srcs(&self, rel_path: &str) -> BTreeSet<String> {
        self.name_to_record
            .iter()
            .filter(|(_, record)| record.srcs.iter().any(|s| s == rel_path))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Modules depending directly on any of `deps`.
    pub fn get_modules_by_include_deps(
        &self,
        deps: &BTreeSet<String>,
        testable_only: bool,
    ) -> BTreeSet<String> {
        self.name_to_record
            .iter()
            .filter(|(_, record)| record.dependencies.iter().any(|d| deps.contains(d)))
            .filter(|(_, record)| !testable_only || self.is_testable_module(record))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// All transitive dependencies of a module.
    pub fn get_module_dependency(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            let Some(record) = self.get_module_info(&current) else {
                continue;
            };
            for dep in &record.dependencies {
                if seen.insert(dep.clone()) {
                    pending.push(dep.clone());
                }
            }
        }
        seen.remove(name);
        seen
    }

    /// Transitive dependencies that install an artifact.
    pub fn get_install_module_dependency(&self, name: &str) -> BTreeSet<String> {
        self.get_module_dependency(name)
            .into_iter()
            .filter(|dep| {
                self.get_module_info(dep)
                    .is_some_and(|record| !record.installed.is_empty())
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Testability
    // ------------------------------------------------------------------------

    /// Testable modules, optionally restricted to one compatibility suite.
    pub fn get_testable_modules(&self, suite: Option<&str>) -> BTreeSet<String> {
        self.name_to_record
            .values()
            .filter(|record| self.is_testable_module(record))
            .filter(|record| {
                suite.is_none_or(|s| record.compatibility_suites.iter().any(|c| c == s))
            })
            .map(|record| record.module_name.clone())
            .collect()
    }

    /// Installed with a test config, or a Robolectric test.
    pub fn is_testable_module(&self, record: &ModuleRecord) -> bool {
        if !record.installed.is_empty() && self.has_test_config(record) {
            return true;
        }
        self.get_robolectric_type(&record.module_name).is_some()
    }

    /// A declared config file exists, `AndroidTest.xml` sits at a module
    /// path, or the build generates the config.
    pub fn has_test_config(&self, record: &ModuleRecord) -> bool {
        if record
            .test_config
            .iter()
            .any(|config| self.root.join(config).is_file())
        {
            return true;
        }
        if record
            .path
            .iter()
            .any(|path| self.root.join(path).join(MODULE_CONFIG).is_file())
        {
            return true;
        }
        record.auto_test_config
    }

    /// Whether the build auto-generates this module's test config.
    pub fn is_auto_gen_test_config(&self, name: &str) -> bool {
        self.get_module_info(name)
            .is_some_and(|record| record.auto_test_config)
    }

    /// Host-side unit tests.
    pub fn get_all_host_unit_tests(&self) -> BTreeSet<String> {
        self.name_to_record
            .values()
            .filter(|record| record.is_unit_test)
            .filter(|record| {
                record
                    .supported_variants
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case("host"))
            })
            .filter(|record| self.is_testable_module(record))
            .map(|record| record.module_name.clone())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Module traits
    // ------------------------------------------------------------------------

    /// True if the module is a native gtest.
    pub fn is_native_test(&self, name: &str) -> bool {
        self.get_module_info(name)
            .is_some_and(|record| record.has_class(CLASS_NATIVE_TESTS))
    }

    /// True if the record is tagged as a Mobly test.
    pub fn is_mobly_module(&self, record: &ModuleRecord) -> bool {
        record.test_options_tags.iter().any(|t| t == TAG_MOBLY)
    }

    /// True if the record's first class is `ROBOLECTRIC`.
    pub fn is_legacy_robolectric_class(&self, record: &ModuleRecord) -> bool {
        record.class.first().map(String::as_str) == Some(CLASS_ROBOLECTRIC)
    }

    /// The runnable Robolectric module sharing this module's first path.
    pub fn get_robolectric_test_name(&self, name: &str) -> Option<String> {
        let first_path = self.get_module_info(name)?.first_path()?;
        self.get_module_names(first_path).into_iter().find(|module| {
            self.get_module_info(module)
                .is_some_and(|record| self.is_legacy_robolectric_class(record))
        })
    }

    /// Robolectric flavor, if any.
    pub fn get_robolectric_type(&self, name: &str) -> Option<RobolectricType> {
        let record = self.get_module_info(name)?;
        if record.robolectric_test {
            return Some(RobolectricType::Modern);
        }
        if self.is_legacy_robolectric_class(record) || self.get_robolectric_test_name(name).is_some()
        {
            return Some(RobolectricType::Legacy);
        }
        None
    }

    /// True if the module is any kind of Robolectric test.
    pub fn is_robolectric_test(&self, name: &str) -> bool {
        self.get_robolectric_type(name).is_some()
    }

    /// True if the record declares the exact `a.apk+b.apex` combination.
    pub fn has_mainline_modules(&self, name: &str, mainline_modules: &str) -> bool {
        self.get_module_info(name).is_some_and(|record| {
            record
                .test_mainline_modules
                .iter()
                .any(|m| m == mainline_modules)
        })
    }

    /// Apps instrumented by this test module, with their installed `.apk`s.
    ///
    /// The test's manifest names a `targetPackage`; any `APPS` module whose
    /// own manifest declares that package is a target.
    pub fn get_instrumentation_target_apps(&self, name: &str) -> BTreeMap<String, BTreeSet<String>> {
        let mut targets = BTreeMap::new();
        let Some(record) = self.get_module_info(name) else {
            return targets;
        };
        let target_packages: BTreeSet<String> = record
            .path
            .iter()
            .filter_map(|path| {
                test_config::manifest_instrumentation_target(&self.root.join(path).join(MANIFEST))
            })
            .collect();
        if target_packages.is_empty() {
            return targets;
        }

        for (app_name, app) in &self.name_to_record {
            if app_name == name || !app.has_class(CLASS_APPS) {
                continue;
            }
            let declares_target = app.path.iter().any(|path| {
                test_config::manifest_package(&self.root.join(path).join(MANIFEST))
                    .is_some_and(|package| target_packages.contains(&package))
            });
            if declares_target {
                let apks: BTreeSet<String> = app
                    .installed
                    .iter()
                    .filter(|p| p.ends_with(".apk"))
                    .cloned()
                    .collect();
                debug!(test = name, target = %app_name, "instrumentation target app");
                targets.insert(app_name.clone(), apks);
            }
        }
        targets
    }
}

// ============================================================================
// Tests
// ============================================================================
