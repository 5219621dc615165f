//! Descriptor synthesis.
//!
//! Finders only know a module name, a config path and filters. The
//! synthesizer turns that into something buildable and runnable: it copies
//! module traits from the index, picks the runner, and collects build
//! targets.
//!
//! Special modules are handled first and exclusively:
//!
//! 1. VTS10-only native modules run on the VTS runner, with targets taken
//!    from the staging plan closure.
//! 2. Mobly modules build themselves and expose their installed files.
//! 3. Robolectric modules run on the host; legacy ones under their alias.
//!
//! Everything else gets config-declared targets, suite extras, a
//! `MODULES-IN-` target per module path, the module itself, and the apps it
//! instruments.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::config::ResolveOptions;
use crate::module_index::{ModuleIndex, ModuleRecord, RobolectricType, CLASS_JAVA_LIBRARIES};
use crate::search::SourceSearch;
use crate::test_config::{self, VtsLayout, CTS_JAR, DALVIK_TEST_DEPS};
use crate::types::{InstallLocation, RunnerKind, TestDescriptor, TestFilter, MODULES_IN};

// ============================================================================
// Constants
// ============================================================================

/// Staging plan parsed for VTS10 targets.
pub const VTS_STAGING_PLAN: &str = "vts-staging-default";
/// Module holding the VTS10 plans.
pub const VTS_TF_MODULE: &str = "vts10-tradefed";
/// Harness needed by modules in the `vts` suite.
pub const VTS_CORE_TF_MODULE: &str = "vts-tradefed";
/// Core target every VTS10 run needs.
pub const VTS_TEST_CORE: &str = "vts-test-core";
/// Kernel LTP bundle needed by the LTP wrapper modules.
pub const LTP_TARGET: &str = "vts_kernel_ltp_tests";

const VTS10_SUITE: &str = "vts10";
const VTS_CORE_SUITE: &str = "vts";
const MTS_SUITE: &str = "mts";
const VTS_OUT_SUBDIR: &str = "vts10/android-vts10/testcases";
const VTS_PUSH_GROUP_DIR: &str = "test/vts/tools/vts-tradefed/res/push_groups";

/// Compatibility suites that are really just install groups.
const SUITES_TO_IGNORE: &[&str] = &["general-tests", "device-tests", "tests"];

// ============================================================================
// Synthesizer
// ============================================================================

/// Turns bare module matches into complete descriptors.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    index: &'a ModuleIndex,
    search: &'a SourceSearch,
    options: &'a ResolveOptions,
}

impl<'a> Synthesizer<'a> {
    pub fn new(index: &'a ModuleIndex, search: &'a SourceSearch, options: &'a ResolveOptions) -> Self {
        Synthesizer {
            index,
            search,
            options,
        }
    }

    /// A standard-runner descriptor for `module_name` before synthesis.
    pub fn base(
        &self,
        module_name: &str,
        rel_config: &str,
        filters: BTreeSet<TestFilter>,
    ) -> TestDescriptor {
        let suites = self
            .index
            .get_module_info(module_name)
            .map(|record| record.compatibility_suites.clone())
            .unwrap_or_default();
        TestDescriptor::new(module_name, rel_config)
            .with_filters(filters)
            .with_suites(&suites)
    }

    /// Complete a descriptor whose `test_name` is a module name.
    ///
    /// Returns `None` when the module is not in the index.
    pub fn synthesize(&self, mut test: TestDescriptor) -> Option<TestDescriptor> {
        let module_name = test.test_name.clone();
        let Some(record) = self.index.get_module_info(&module_name) else {
            debug!(module = %module_name, "module not in index, dropping match");
            return None;
        };
        test.module_class = record.class.iter().cloned().collect();
        test.install_locations = InstallLocation::from_installed_paths(&record.installed);

        if is_vts_module(record) {
            return Some(self.apply_vts(test));
        }
        if self.index.is_mobly_module(record) {
            return Some(self.apply_mobly(test));
        }
        if let Some(robo_type) = self.index.get_robolectric_type(&module_name) {
            return Some(self.apply_robolectric(test, robo_type));
        }

        let rel_config = test.config_path.clone();
        for target in self.build_targets(&module_name, &rel_config) {
            test.add_build_target(target);
        }

        let target_apps = self.index.get_instrumentation_target_apps(&module_name);
        if !target_apps.is_empty() {
            debug!(module = %module_name, apps = ?target_apps.keys(), "instrumentation test");
            for app in target_apps.keys() {
                test.add_build_target(app.clone());
            }
            test.artifacts = target_apps.into_values().flatten().collect();
        }

        if self.index.is_auto_gen_test_config(&module_name)
            && test.module_class.contains(CLASS_JAVA_LIBRARIES)
        {
            for dep in DALVIK_TEST_DEPS.iter().filter(|d| self.index.is_module(d)) {
                test.add_build_target(*dep);
            }
        }

        // Extra configs run under their own name.
        if let Some(position) = record.test_config.iter().position(|c| *c == rel_config) {
            if position > 0 {
                let stem = config_stem(&rel_config);
                debug!(from = %test.test_name, to = %stem, "renaming test to its config");
                test.rename(stem);
            }
        }
        Some(test)
    }

    /// Targets needed to build and run `module_name` with `rel_config`.
    pub fn build_targets(&self, module_name: &str, rel_config: &str) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        if !self.index.is_auto_gen_test_config(module_name) {
            let config = self.index.root().join(rel_config);
            targets = test_config::build_targets(&config, self.index);
        }
        let suites: &[String] = self
            .index
            .get_module_info(module_name)
            .map(|record| record.compatibility_suites.as_slice())
            .unwrap_or_default();
        if suites.iter().any(|s| s == VTS_CORE_SUITE) {
            targets.insert(VTS_CORE_TF_MODULE.to_string());
        }
        for suite in suites {
            if let Some(extras) = self.options.suite_deps.get(suite) {
                targets.extend(extras.iter().cloned());
            }
        }
        for path in self.index.get_paths(module_name) {
            targets.insert(format!("{MODULES_IN}{}", path.replace('/', "-")));
        }
        if self.options.ltp_modules.iter().any(|m| m == module_name) {
            targets.insert(LTP_TARGET.to_string());
        }
        if !module_name.is_empty() && self.index.is_module(module_name) {
            targets.insert(module_name.to_string());
        }
        if suites.iter().any(|s| s == MTS_SUITE) && self.index.is_module(CTS_JAR) {
            targets.insert(CTS_JAR.to_string());
        }
        targets
    }

    // ------------------------------------------------------------------------
    // Special modules
    // ------------------------------------------------------------------------

    fn apply_vts(&self, mut test: TestDescriptor) -> TestDescriptor {
        debug!(module = %test.test_name, "VTS10 module");
        test.runner = RunnerKind::NativeVts;
        let root = self.index.root();
        let layout = VtsLayout {
            out_dir: join_rel(&self.options.host_out_dir, VTS_OUT_SUBDIR),
            push_group_dir: root.join(VTS_PUSH_GROUP_DIR),
        };

        let mut plans = BTreeSet::from([root.join(&test.config_path)]);
        for tf_path in self.index.get_paths(VTS_TF_MODULE) {
            for staging in self
                .search
                .find_xml_by_name(&root.join(tf_path), VTS_STAGING_PLAN)
            {
                plans.extend(test_config::vts_plans(&staging));
            }
        }
        for plan in &plans {
            for target in test_config::vts_targets(plan, &layout, self.index) {
                test.add_build_target(target);
            }
        }
        test.add_build_target(VTS_TEST_CORE);
        let name = test.test_name.clone();
        test.add_build_target(name);
        test
    }

    fn apply_mobly(&self, mut test: TestDescriptor) -> TestDescriptor {
        debug!(module = %test.test_name, "Mobly module");
        test.runner = RunnerKind::Mobly;
        let name = test.test_name.clone();
        test.add_build_target(name.clone());
        test.runner_data = self
            .index
            .get_installed_paths(&name)
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        test
    }

    fn apply_robolectric(&self, mut test: TestDescriptor, robo_type: RobolectricType) -> TestDescriptor {
        debug!(module = %test.test_name, ?robo_type, "Robolectric module");
        test.install_locations = BTreeSet::from([InstallLocation::Host]);
        match robo_type {
            RobolectricType::Modern => {
                test.runner = RunnerKind::RobolectricModern;
                let name = test.test_name.clone();
                test.add_build_target(name);
            }
            RobolectricType::Legacy => {
                test.runner = RunnerKind::RobolectricLegacy;
                if let Some(alias) = self.index.get_robolectric_test_name(&test.test_name) {
                    test.rename(alias.clone());
                    test.add_build_target(alias);
                }
            }
        }
        test
    }
}

/// A native module whose only real compatibility suite is `vts10`.
fn is_vts_module(record: &ModuleRecord) -> bool {
    let suites: Vec<&String> = record
        .compatibility_suites
        .iter()
        .filter(|s| !SUITES_TO_IGNORE.contains(&s.as_str()))
        .collect();
    suites.len() == 1 && suites[0] == VTS10_SUITE
}

/// `a/b/FooTests.xml` → `FooTests`.
pub fn config_stem(rel_config: &str) -> String {
    Path::new(rel_config)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_config.to_string())
}

fn join_rel(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return rest.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Tree {
        temp: TempDir,
        records: Vec<(String, ModuleRecord)>,
    }

    impl Tree {
        fn new() -> Self {
            Tree {
                temp: TempDir::new().unwrap(),
                records: Vec::new(),
            }
        }

        fn root(&self) -> PathBuf {
            self.temp.path().to_path_buf()
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn module(&mut self, record: ModuleRecord) {
            self.records.push((record.module_name.clone(), record));
        }

        fn index(&self) -> ModuleIndex {
            ModuleIndex::from_records(self.root(), self.records.clone())
        }
    }

    fn record(name: &str, path: &str) -> ModuleRecord {
        ModuleRecord {
            module_name: name.to_string(),
            path: vec![path.to_string()],
            installed: vec![format!("out/target/product/x/testcases/{name}/{name}.apk")],
            ..ModuleRecord::default()
        }
    }

    fn run(tree: &Tree, options: &ResolveOptions, name: &str, config: &str) -> Option<TestDescriptor> {
        let index = tree.index();
        let search = SourceSearch::new(tree.root(), &[]);
        let synth = Synthesizer::new(&index, &search, options);
        let base = synth.base(name, config, BTreeSet::new());
        synth.synthesize(base)
    }

    mod default_tests {
        use super::*;

        #[test]
        fn unknown_module_is_dropped() {
            let tree = Tree::new();
            assert!(run(&tree, &ResolveOptions::default(), "Nope", "x/AndroidTest.xml").is_none());
        }

        #[test]
        fn standard_module_targets() {
            let mut tree = Tree::new();
            tree.write(
                "foo/AndroidTest.xml",
                r#"<configuration><option name="test-file-name" value="Helper.apk" /></configuration>"#,
            );
            let mut foo = record("FooTests", "foo");
            foo.compatibility_suites = vec!["mts".to_string(), "cts".to_string()];
            tree.module(foo);
            tree.module(record("Helper", "helper"));
            tree.module(record(CTS_JAR, "cts/harness"));

            let mut options = ResolveOptions::default();
            options
                .suite_deps
                .insert("cts".to_string(), vec!["cts-extra".to_string()]);
            let test = run(&tree, &options, "FooTests", "foo/AndroidTest.xml").unwrap();
            assert_eq!(test.runner, RunnerKind::Standard);
            assert_eq!(
                test.build_targets,
                BTreeSet::from([
                    "FooTests".to_string(),
                    "Helper".to_string(),
                    "MODULES-IN-foo".to_string(),
                    "cts-extra".to_string(),
                    CTS_JAR.to_string(),
                ])
            );
            assert_eq!(test.install_locations, BTreeSet::from([InstallLocation::Device]));
            assert!(test.raw_test_name.is_empty());
        }

        #[test]
        fn extra_config_renames() {
            let mut tree = Tree::new();
            let mut foo = record("FooTests", "foo");
            foo.test_config = vec!["foo/AndroidTest.xml".to_string(), "foo/FooSlow.xml".to_string()];
            tree.module(foo);
            let first = run(&tree, &ResolveOptions::default(), "FooTests", "foo/AndroidTest.xml").unwrap();
            assert_eq!(first.test_name, "FooTests");
            let second = run(&tree, &ResolveOptions::default(), "FooTests", "foo/FooSlow.xml").unwrap();
            assert_eq!(second.test_name, "FooSlow");
            assert_eq!(second.raw_test_name, "FooTests");
        }

        #[test]
        fn instrumentation_targets_become_artifacts() {
            let mut tree = Tree::new();
            tree.write(
                "foo/AndroidManifest.xml",
                r#"<manifest package="com.example.tests"><instrumentation android:targetPackage="com.example.app" /></manifest>"#,
            );
            tree.write("app/AndroidManifest.xml", r#"<manifest package="com.example.app" />"#);
            tree.module(record("FooTests", "foo"));
            let mut app = record("FooApp", "app");
            app.class = vec!["APPS".to_string()];
            tree.module(app);

            let test = run(&tree, &ResolveOptions::default(), "FooTests", "foo/AndroidTest.xml").unwrap();
            assert!(test.build_targets.contains("FooApp"));
            assert_eq!(
                test.artifacts,
                vec!["out/target/product/x/testcases/FooApp/FooApp.apk".to_string()]
            );
        }

        #[test]
        fn ltp_module_gets_kernel_bundle() {
            let mut tree = Tree::new();
            tree.module(record("vts_ltp_test_arm", "ltp"));
            let test = run(&tree, &ResolveOptions::default(), "vts_ltp_test_arm", "ltp/AndroidTest.xml").unwrap();
            assert!(test.build_targets.contains(LTP_TARGET));
        }

        #[test]
        fn auto_generated_java_library_adds_dalvik_runners() {
            let mut tree = Tree::new();
            let mut lib = record("LibTests", "lib");
            lib.class = vec![CLASS_JAVA_LIBRARIES.to_string()];
            lib.auto_test_config = true;
            tree.module(lib);
            tree.module(record("cts-dalvik-device-test-runner", "dalvik"));
            let test = run(&tree, &ResolveOptions::default(), "LibTests", "lib/AndroidTest.xml").unwrap();
            assert!(test.build_targets.contains("cts-dalvik-device-test-runner"));
            assert!(!test.build_targets.contains("cts-dalvik-host-test-runner"));
        }
    }

    mod special_module_tests {
        use super::*;

        #[test]
        fn mobly_builds_itself_only() {
            let mut tree = Tree::new();
            let mut mobly = record("MoblyTests", "mobly");
            mobly.test_options_tags = vec!["mobly".to_string()];
            tree.module(mobly);
            let test = run(&tree, &ResolveOptions::default(), "MoblyTests", "mobly/AndroidTest.xml").unwrap();
            assert_eq!(test.runner, RunnerKind::Mobly);
            assert_eq!(test.build_targets, BTreeSet::from(["MoblyTests".to_string()]));
            assert_eq!(test.runner_data.len(), 1);
        }

        #[test]
        fn modern_robolectric() {
            let mut tree = Tree::new();
            let mut robo = record("RoboTests", "robo");
            robo.robolectric_test = true;
            tree.module(robo);
            let test = run(&tree, &ResolveOptions::default(), "RoboTests", "robo/AndroidTest.xml").unwrap();
            assert_eq!(test.runner, RunnerKind::RobolectricModern);
            assert_eq!(test.install_locations, BTreeSet::from([InstallLocation::Host]));
            assert_eq!(test.build_targets, BTreeSet::from(["RoboTests".to_string()]));
        }

        #[test]
        fn legacy_robolectric_runs_alias() {
            let mut tree = Tree::new();
            tree.module(record("AppRoboTests", "app/robo"));
            let mut runner = record("RunAppRoboTests", "app/robo");
            runner.class = vec!["ROBOLECTRIC".to_string()];
            tree.module(runner);
            let test = run(&tree, &ResolveOptions::default(), "AppRoboTests", "app/robo/AndroidTest.xml").unwrap();
            assert_eq!(test.runner, RunnerKind::RobolectricLegacy);
            assert_eq!(test.test_name, "RunAppRoboTests");
            assert_eq!(test.raw_test_name, "AppRoboTests");
        }

        #[test]
        fn vts10_module_uses_staging_plan() {
            let mut tree = Tree::new();
            tree.write(
                "test/vts/tools/vts10-tradefed/res/config/vts-staging-default.xml",
                r#"<configuration><include name="vts-base" /></configuration>"#,
            );
            tree.write(
                "test/vts/tools/vts10-tradefed/res/config/vts-base.xml",
                r#"<configuration><option name="test-module-name" value="VtsHelper" /></configuration>"#,
            );
            tree.write(
                "vts/AndroidTest.xml",
                r#"<configuration><option name="push" value="DATA/bin/foo->/data/foo" /></configuration>"#,
            );
            let mut vts = record("VtsFoo", "vts");
            vts.compatibility_suites = vec!["vts10".to_string(), "general-tests".to_string()];
            tree.module(vts);
            tree.module(record("VtsHelper", "vts/helper"));
            tree.module(record(VTS_TF_MODULE, "test/vts/tools/vts10-tradefed"));

            let test = run(&tree, &ResolveOptions::default(), "VtsFoo", "vts/AndroidTest.xml").unwrap();
            assert_eq!(test.runner, RunnerKind::NativeVts);
            let targets = test.build_targets;
            assert!(targets.contains("VtsHelper"));
            assert!(targets.contains(VTS_TEST_CORE));
            assert!(targets.contains("VtsFoo"));
            assert!(targets.contains("out/host/linux-x86/vts10/android-vts10/testcases/DATA/bin/foo"));
        }

        #[test]
        fn vts_detection_ignores_install_groups() {
            let mut record = record("X", "x");
            record.compatibility_suites = vec!["vts10".to_string(), "device-tests".to_string()];
            assert!(is_vts_module(&record));
            record.compatibility_suites.push("cts".to_string());
            assert!(!is_vts_module(&record));
        }
    }

    #[test]
    fn config_stems() {
        assert_eq!(config_stem("a/b/FooSlow.xml"), "FooSlow");
        assert_eq!(config_stem("AndroidTest.xml"), "AndroidTest");
    }
}
