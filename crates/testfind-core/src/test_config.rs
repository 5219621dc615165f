//! Test config and manifest XML parsing.
//!
//! Tradefed configs are flat enough that a full DOM is unnecessary: every
//! question asked of them ("which `<option>`s are there", "is there a
//! `metrics_collector`", "what does it `<include>`") is answered from the
//! list of start/empty elements with their attributes, in document order.
//!
//! Config parsing never fails a resolution. A missing or malformed file is
//! logged and treated as declaring nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{FinderError, FinderResult};
use crate::module_index::ModuleIndex;
use crate::search::SourceSearch;
use crate::types::MODULE_CONFIG;

// ============================================================================
// Constants
// ============================================================================

/// Runner jar bundling the compatibility harness.
pub const CTS_JAR: &str = "cts-tradefed";

/// Targets needed by Dalvik/Libcore runner classes.
pub const DALVIK_TEST_DEPS: &[&str] = &[
    "cts-dalvik-device-test-runner",
    "cts-dalvik-host-test-runner",
    CTS_JAR,
];

const DALVIK_RUNNER_CLASSES: &[&str] = &[
    "com.android.compatibility.testtype.DalvikTest",
    "com.android.compatibility.testtype.LibcoreTest",
];

const COMPATIBILITY_PACKAGE_PREFIX: &str = "com.android.compatibility";
const PUSH_DELIM: &str = "->";
const APK_SUFFIX: &str = ".apk";
const PERF_SETUP_LABEL: &str = "perf-setup.sh";
const PERF_SETUP_TARGET: &str = "perf-setup";

const INCLUDE_ANNOTATION: &str = "include-annotation";
const EXCLUDE_ANNOTATION: &str = "exclude-annotation";
const METRICS_COLLECTOR: &str = "metrics_collector";
const KERNEL_TEST_OPTION: &str = "test-command-line";

const VTS_TEST_MODULE: &str = "test-module-name";
const VTS_MODULE: &str = "module-name";
const VTS_BINARY_SRC: &str = "binary-test-source";
const VTS_PUSH_GROUP: &str = "push-group";
const VTS_PUSH: &str = "push";
const VTS_PUSH_SUFFIX: &str = ".push";
const VTS_BITNESS: &str = "append-bitness";
const VTS_TEST_FILE: &str = "test-file-name";
const VTS_APK: &str = "apk";
const VTS_OUT_DATA_APP_PATH: &str = "DATA/app";

static APK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[^/]+\.apk$").unwrap());

static VTS_BINARY_SRC_DELIM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*::(?P<target>.*)$").unwrap());

// ============================================================================
// Parsed Config
// ============================================================================

/// One XML element with its attributes, keyed by local name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl XmlElement {
    /// Trimmed attribute value; empty when absent.
    pub fn attr(&self, key: &str) -> &str {
        self.attributes.get(key).map(|v| v.trim()).unwrap_or_default()
    }
}

/// The elements of one XML document, in document order.
#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    path: PathBuf,
    elements: Vec<XmlElement>,
}

impl ConfigDocument {
    /// Parse XML text read from `path`.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> FinderResult<Self> {
        let path = path.into();
        let mut reader = Reader::from_str(content);
        let mut elements = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                    elements.push(element_from(&start).map_err(|e| FinderError::xml(&path, e))?);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    let message = format!("at byte {}: {}", reader.buffer_position(), e);
                    return Err(FinderError::xml(&path, message));
                }
            }
        }
        Ok(ConfigDocument { path, elements })
    }

    /// Read and parse an XML file.
    pub fn load(path: &Path) -> FinderResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| FinderError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Load a file if it exists; log and drop parse failures.
    pub fn load_lenient(path: &Path) -> Option<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "config file does not exist");
            return None;
        }
        match Self::load(path) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable config");
                None
            }
        }
    }

    /// Path the document was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All elements named `tag`.
    pub fn elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements.iter().filter(move |e| e.tag == tag)
    }

    /// All `<option>` elements.
    pub fn options(&self) -> impl Iterator<Item = &XmlElement> + '_ {
        self.elements("option")
    }

    /// Trimmed values of every `<option name=name>`.
    pub fn option_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.options()
            .filter(move |o| o.attr("name") == name)
            .map(|o| o.attr("value"))
    }

    /// Names of every `<include name=..>`.
    pub fn includes(&self) -> impl Iterator<Item = &str> + '_ {
        self.elements("include")
            .map(|e| e.attr("name"))
            .filter(|name| !name.is_empty())
    }

    /// True if any element is named `tag`.
    pub fn has_element(&self, tag: &str) -> bool {
        self.elements(tag).next().is_some()
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        attributes.insert(key, value.into_owned());
    }
    Ok(XmlElement { tag, attributes })
}

// ============================================================================
// Build targets
// ============================================================================

/// Build targets declared by a test config.
///
/// `.apk` option values contribute the apk name and the perf script its
/// setup target, each only if it is a module. Compatibility harness runner
/// classes pull in the harness jars.
pub fn build_targets(config: &Path, index: &ModuleIndex) -> BTreeSet<String> {
    let Some(doc) = ConfigDocument::load_lenient(config) else {
        return BTreeSet::new();
    };
    let mut targets = BTreeSet::new();
    for option in doc.options() {
        let name = option.attr("name");
        let value = option.attr("value");
        let target = if is_apk_target(name, value) {
            apk_target(value)
        } else if value.contains(PERF_SETUP_LABEL) {
            PERF_SETUP_TARGET.to_string()
        } else {
            continue;
        };
        if index.is_module(&target) {
            targets.insert(target);
        } else {
            debug!(target = %target, "config target is not a module, skipping");
        }
    }

    for class in doc.elements.iter().filter_map(|e| e.attributes.get("class")) {
        let class = class.trim();
        if class.starts_with(COMPATIBILITY_PACKAGE_PREFIX) {
            targets.insert(CTS_JAR.to_string());
        }
        if DALVIK_RUNNER_CLASSES.contains(&class) {
            targets.extend(
                DALVIK_TEST_DEPS
                    .iter()
                    .filter(|dep| index.is_module(dep))
                    .map(|dep| dep.to_string()),
            );
        }
    }
    debug!(config = %config.display(), ?targets, "targets found in config");
    targets
}

fn is_apk_target(name: &str, value: &str) -> bool {
    APK_RE.is_match(value) || (name == VTS_PUSH && value.ends_with(APK_SUFFIX))
}

/// `Foo.apk` or `Foo.apk->/data/Foo.apk` → `Foo`.
fn apk_target(value: &str) -> String {
    let apk = before_push_delim(value);
    apk.strip_suffix(APK_SUFFIX).unwrap_or(apk).to_string()
}

fn before_push_delim(value: &str) -> &str {
    value.split(PUSH_DELIM).next().unwrap_or(value).trim()
}

// ============================================================================
// VTS plans
// ============================================================================

/// Where VTS targets live on disk and in the output tree.
#[derive(Debug, Clone)]
pub struct VtsLayout {
    /// Output testcases dir, relative to the root.
    pub out_dir: String,
    /// Directory holding `.push` group files.
    pub push_group_dir: PathBuf,
}

/// The plan itself plus every plan it includes, recursively.
///
/// Included plans live next to the including one as `<name>.xml`. Missing
/// plans are logged and skipped.
pub fn vts_plans(plan: &Path) -> BTreeSet<PathBuf> {
    let mut plans = BTreeSet::new();
    let mut pending = vec![plan.to_path_buf()];
    while let Some(current) = pending.pop() {
        if plans.contains(&current) {
            continue;
        }
        let Some(doc) = ConfigDocument::load_lenient(&current) else {
            warn!(plan = %current.display(), "VTS plan not found");
            continue;
        };
        let dir = current.parent().map(Path::to_path_buf).unwrap_or_default();
        pending.extend(doc.includes().map(|name| dir.join(format!("{name}.xml"))));
        plans.insert(current);
    }
    plans
}

/// Build targets named by a VTS plan's options.
pub fn vts_targets(plan: &Path, layout: &VtsLayout, index: &ModuleIndex) -> BTreeSet<String> {
    let Some(doc) = ConfigDocument::load_lenient(plan) else {
        return BTreeSet::new();
    };
    let out = layout.out_dir.as_str();
    let append_bitness = doc.option_values(VTS_BITNESS).any(|v| v == "true");
    let mut targets = BTreeSet::new();
    for option in doc.options() {
        let value = option.attr("value");
        match option.attr("name") {
            VTS_TEST_MODULE | VTS_MODULE => {
                if index.is_module(value) {
                    targets.insert(value.to_string());
                } else {
                    debug!(module = value, "VTS test module not in index, skipping");
                }
            }
            VTS_BINARY_SRC => {
                targets.insert(vts_binary_src_target(value, out));
            }
            VTS_PUSH_GROUP => {
                let mut visited = BTreeSet::new();
                targets.extend(push_group_targets(value, layout, &mut visited));
            }
            VTS_PUSH => {
                let push_target = before_push_delim(value);
                if append_bitness {
                    targets.insert(join_rel(out, &format!("{push_target}32")));
                    targets.insert(join_rel(out, &format!("{push_target}64")));
                } else {
                    targets.insert(join_rel(out, push_target));
                }
            }
            VTS_TEST_FILE => {
                let target = if value.contains('/') {
                    join_rel(out, value)
                } else {
                    let data_app = join_rel(out, VTS_OUT_DATA_APP_PATH);
                    join_rel(&join_rel(&data_app, &apk_target(value)), value)
                };
                targets.insert(target);
            }
            VTS_APK => {
                targets.insert(join_rel(out, value));
            }
            _ => {}
        }
    }
    debug!(plan = %plan.display(), count = targets.len(), "VTS targets");
    targets
}

/// `_32bit::DATA/x` → `out/DATA/x`; `DATA/x->/data/x` → `out/DATA/x`;
/// anything else is already a target.
fn vts_binary_src_target(value: &str, out: &str) -> String {
    if let Some(caps) = VTS_BINARY_SRC_DELIM_RE.captures(value) {
        return join_rel(out, &caps["target"]);
    }
    if value.contains(PUSH_DELIM) {
        return join_rel(out, before_push_delim(value));
    }
    value.to_string()
}

/// Targets listed by a push group file, following nested `.push` files.
fn push_group_targets(
    push_file: &str,
    layout: &VtsLayout,
    visited: &mut BTreeSet<String>,
) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    if !visited.insert(push_file.to_string()) {
        return targets;
    }
    let path = layout.push_group_dir.join(push_file);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "cannot read push group");
            return targets;
        }
    };
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.ends_with(VTS_PUSH_SUFFIX) {
            targets.extend(push_group_targets(line, layout, visited));
        } else {
            targets.insert(join_rel(&layout.out_dir, before_push_delim(line)));
        }
    }
    targets
}

fn join_rel(base: &str, rest: &str) -> String {
    if base.is_empty() {
        return rest.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

// ============================================================================
// Config queries
// ============================================================================

/// True if a kernel config declares `test-command-line` keyed by `test_name`.
pub fn is_kernel_test(config: &Path, test_name: &str) -> bool {
    let Some(doc) = ConfigDocument::load_lenient(config) else {
        return false;
    };
    let declared = doc
        .options()
        .any(|o| o.attr("name") == KERNEL_TEST_OPTION && o.attr("key") == test_name);
    declared
}

/// `include-annotation` / `exclude-annotation` options of a config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationFilters {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl AnnotationFilters {
    /// True when the config restricts nothing.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Read annotation filters from a config.
pub fn annotation_filters(config: &Path) -> AnnotationFilters {
    let Some(doc) = ConfigDocument::load_lenient(config) else {
        return AnnotationFilters::default();
    };
    AnnotationFilters {
        include: doc.option_values(INCLUDE_ANNOTATION).map(str::to_string).collect(),
        exclude: doc.option_values(EXCLUDE_ANNOTATION).map(str::to_string).collect(),
    }
}

/// True if the config, or any config it includes from the same git
/// repository, declares a `metrics_collector`.
///
/// A `.config` path that does not exist falls back to its `.xml` sibling.
pub fn need_aggregate_metrics_result(config: &Path, search: &SourceSearch) -> bool {
    let mut visited = BTreeSet::new();
    needs_metrics(config, search, &mut visited)
}

fn needs_metrics(config: &Path, search: &SourceSearch, visited: &mut BTreeSet<PathBuf>) -> bool {
    let mut config = config.to_path_buf();
    if !config.is_file() && config.extension().is_some_and(|e| e == "config") {
        config.set_extension("xml");
    }
    if !visited.insert(config.clone()) {
        return false;
    }
    let Some(doc) = ConfigDocument::load_lenient(&config) else {
        return false;
    };
    if doc.has_element(METRICS_COLLECTOR) {
        return true;
    }
    let git_dir = search.git_root(&config);
    let included = doc.includes().any(|name| {
        let stem = Path::new(name).with_extension("");
        let stem = stem.to_string_lossy();
        search
            .find_xml_by_name(&git_dir, &stem)
            .iter()
            .any(|included| needs_metrics(included, search, visited))
    });
    included
}

/// The config a descriptor runs with, plus the sources of its module.
///
/// For a module: `AndroidTest.xml` at a module path when no config is
/// declared, else the first declared config. Otherwise the testable module
/// whose config is named `<test_name>.xml`.
pub fn config_and_srcs(test_name: &str, index: &ModuleIndex) -> Option<(PathBuf, Vec<String>)> {
    let root = index.root();
    if let Some(record) = index.get_module_info(test_name) {
        let candidate = match record.test_config.first() {
            Some(first) => Some(root.join(first)),
            None => record
                .path
                .iter()
                .map(|p| root.join(p).join(MODULE_CONFIG))
                .find(|p| p.is_file()),
        };
        return candidate
            .filter(|p| p.is_file())
            .map(|p| (p, record.srcs.clone()));
    }

    for name in index.get_testable_modules(None) {
        let Some(record) = index.get_module_info(&name) else {
            continue;
        };
        for config in &record.test_config {
            let path = root.join(config);
            if path.file_stem().is_some_and(|s| s == test_name) && path.is_file() {
                return Some((path, record.srcs.clone()));
            }
        }
    }
    None
}

// ============================================================================
// Android manifests
// ============================================================================

/// The `package` declared by a manifest.
pub fn manifest_package(manifest: &Path) -> Option<String> {
    let doc = ConfigDocument::load_lenient(manifest)?;
    let package = doc
        .elements("manifest")
        .map(|e| e.attr("package"))
        .find(|p| !p.is_empty())
        .map(str::to_string);
    package
}

/// The `targetPackage` of a manifest's `<instrumentation>`.
pub fn manifest_instrumentation_target(manifest: &Path) -> Option<String> {
    let doc = ConfigDocument::load_lenient(manifest)?;
    let target = doc
        .elements("instrumentation")
        .map(|e| e.attr("targetPackage"))
        .find(|p| !p.is_empty())
        .map(str::to_string);
    target
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_index::ModuleRecord;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn index_with(root: &Path, names: &[&str]) -> ModuleIndex {
        ModuleIndex::from_records(
            root,
            names
                .iter()
                .map(|n| (n.to_string(), ModuleRecord::default())),
        )
    }

    mod document_tests {
        use super::*;

        #[test]
        fn parses_options_and_includes() {
            let doc = ConfigDocument::parse(
                "x.xml",
                r#"<configuration>
                    <include name="common" />
                    <option name="a" value=" 1 " />
                    <target_preparer class="x.Y"><option name="b" value="2"/></target_preparer>
                </configuration>"#,
            )
            .unwrap();
            let values: Vec<&str> = doc.option_values("a").collect();
            assert_eq!(values, vec!["1"]);
            assert_eq!(doc.includes().collect::<Vec<_>>(), vec!["common"]);
            assert_eq!(doc.options().count(), 2);
            assert!(doc.has_element("target_preparer"));
        }

        #[test]
        fn malformed_xml_is_an_error() {
            let err = ConfigDocument::parse("bad.xml", "<a><b></a>").unwrap_err();
            assert!(matches!(err, FinderError::Xml { .. }));
        }

        #[test]
        fn lenient_load_swallows_errors() {
            let temp = TempDir::new().unwrap();
            let bad = write(temp.path(), "bad.xml", "<a><b></a>");
            assert!(ConfigDocument::load_lenient(&bad).is_none());
            assert!(ConfigDocument::load_lenient(&temp.path().join("none.xml")).is_none());
        }
    }

    mod build_target_tests {
        use super::*;

        #[test]
        fn apks_and_perf_setup_when_modules() {
            let temp = TempDir::new().unwrap();
            let config = write(
                temp.path(),
                "a/AndroidTest.xml",
                r#"<configuration>
                    <option name="test-file-name" value="FooApp.apk" />
                    <option name="push" value="BarApp.apk->/data/local/tmp/BarApp.apk" />
                    <option name="test-file-name" value="Missing.apk" />
                    <option name="run-command" value="sh /data/perf-setup.sh" />
                </configuration>"#,
            );
            let index = index_with(temp.path(), &["FooApp", "BarApp", "perf-setup"]);
            let targets = build_targets(&config, &index);
            let expected: BTreeSet<String> = ["BarApp", "FooApp", "perf-setup"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            assert_eq!(targets, expected);
        }

        #[test]
        fn compatibility_classes_add_harness() {
            let temp = TempDir::new().unwrap();
            let config = write(
                temp.path(),
                "AndroidTest.xml",
                r#"<configuration>
                    <test class="com.android.compatibility.testtype.DalvikTest" />
                </configuration>"#,
            );
            let index = index_with(temp.path(), &["cts-dalvik-device-test-runner"]);
            let targets = build_targets(&config, &index);
            assert!(targets.contains(CTS_JAR));
            assert!(targets.contains("cts-dalvik-device-test-runner"));
            assert!(!targets.contains("cts-dalvik-host-test-runner"));
        }

        #[test]
        fn malformed_config_yields_nothing() {
            let temp = TempDir::new().unwrap();
            let config = write(temp.path(), "AndroidTest.xml", "<configuration><option");
            let index = index_with(temp.path(), &[]);
            assert!(build_targets(&config, &index).is_empty());
        }
    }

    mod vts_tests {
        use super::*;

        #[test]
        fn plans_follow_includes() {
            let temp = TempDir::new().unwrap();
            let plan = write(
                temp.path(),
                "cfg/vts-staging-default.xml",
                r#"<configuration><include name="vts-base" /><include name="gone" /></configuration>"#,
            );
            write(
                temp.path(),
                "cfg/vts-base.xml",
                r#"<configuration><include name="vts-staging-default" /></configuration>"#,
            );
            let plans = vts_plans(&plan);
            assert_eq!(plans.len(), 2);
            assert!(plans.contains(&temp.path().join("cfg/vts-base.xml")));
        }

        #[test]
        fn option_targets() {
            let temp = TempDir::new().unwrap();
            write(
                temp.path(),
                "push/main.push",
                "DATA/lib/a.so->/data/a.so\n\nnested.push\n",
            );
            write(temp.path(), "push/nested.push", "DATA/bin/b\n");
            let plan = write(
                temp.path(),
                "plan.xml",
                r#"<configuration>
                    <option name="test-module-name" value="VtsMod" />
                    <option name="module-name" value="NotAModule" />
                    <option name="binary-test-source" value="_32bit::DATA/nativetest/t" />
                    <option name="binary-test-source" value="DATA/x->/data/x" />
                    <option name="binary-test-source" value="out/host/bin/tool" />
                    <option name="push-group" value="main.push" />
                    <option name="push" value="DATA/lib/c->/data/c" />
                    <option name="append-bitness" value="true" />
                    <option name="test-file-name" value="Foo.apk" />
                    <option name="test-file-name" value="DATA/app/Bar/Bar.apk" />
                    <option name="apk" value="DATA/app/Baz.apk" />
                </configuration>"#,
            );
            let layout = VtsLayout {
                out_dir: "out/vts".to_string(),
                push_group_dir: temp.path().join("push"),
            };
            let index = index_with(temp.path(), &["VtsMod"]);
            let targets = vts_targets(&plan, &layout, &index);
            for expected in [
                "VtsMod",
                "out/vts/DATA/nativetest/t",
                "out/vts/DATA/x",
                "out/host/bin/tool",
                "out/vts/DATA/lib/a.so",
                "out/vts/DATA/bin/b",
                "out/vts/DATA/lib/c32",
                "out/vts/DATA/lib/c64",
                "out/vts/DATA/app/Foo/Foo.apk",
                "out/vts/DATA/app/Bar/Bar.apk",
                "out/vts/DATA/app/Baz.apk",
            ] {
                assert!(targets.contains(expected), "missing {expected}");
            }
            assert!(!targets.contains("NotAModule"));
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn kernel_test_lookup() {
            let temp = TempDir::new().unwrap();
            let config = write(
                temp.path(),
                "k.xml",
                r#"<configuration>
                    <option name="test-command-line" key="kernel_class_1" value="run 1" />
                </configuration>"#,
            );
            assert!(is_kernel_test(&config, "kernel_class_1"));
            assert!(!is_kernel_test(&config, "kernel_class_2"));
        }

        #[test]
        fn annotations() {
            let temp = TempDir::new().unwrap();
            let config = write(
                temp.path(),
                "c.xml",
                r#"<configuration><test class="x">
                    <option name="include-annotation" value="android.platform.test.annotations.Presubmit" />
                    <option name="exclude-annotation" value="org.junit.Ignore" />
                </test></configuration>"#,
            );
            let filters = annotation_filters(&config);
            assert_eq!(filters.include, vec!["android.platform.test.annotations.Presubmit"]);
            assert_eq!(filters.exclude, vec!["org.junit.Ignore"]);
            assert!(annotation_filters(&temp.path().join("none.xml")).is_empty());
        }

        #[test]
        fn metrics_through_includes_and_config_suffix() {
            let temp = TempDir::new().unwrap();
            write(temp.path(), "proj/.git/HEAD", "");
            write(
                temp.path(),
                "proj/tests/Main.xml",
                r#"<configuration><include name="shared-metrics" /></configuration>"#,
            );
            write(
                temp.path(),
                "proj/common/shared-metrics.xml",
                r#"<configuration><metrics_collector class="x" /></configuration>"#,
            );
            let search = SourceSearch::new(temp.path(), &[]);
            assert!(need_aggregate_metrics_result(
                &temp.path().join("proj/tests/Main.config"),
                &search
            ));
            write(temp.path(), "proj/tests/Plain.xml", "<configuration/>");
            assert!(!need_aggregate_metrics_result(
                &temp.path().join("proj/tests/Plain.xml"),
                &search
            ));
        }

        #[test]
        fn config_and_srcs_lookup() {
            let temp = TempDir::new().unwrap();
            write(temp.path(), "a/AndroidTest.xml", "<configuration/>");
            write(temp.path(), "b/Extra.xml", "<configuration/>");
            let index = ModuleIndex::from_records(
                temp.path(),
                [
                    (
                        "A".to_string(),
                        ModuleRecord {
                            path: vec!["a".into()],
                            srcs: vec!["a/Foo.java".into()],
                            ..ModuleRecord::default()
                        },
                    ),
                    (
                        "B".to_string(),
                        ModuleRecord {
                            path: vec!["b".into()],
                            installed: vec!["out/B.apk".into()],
                            test_config: vec!["b/Extra.xml".into()],
                            srcs: vec!["b/Bar.java".into()],
                            ..ModuleRecord::default()
                        },
                    ),
                ],
            );
            let (config, srcs) = config_and_srcs("A", &index).unwrap();
            assert_eq!(config, temp.path().join("a/AndroidTest.xml"));
            assert_eq!(srcs, vec!["a/Foo.java"]);
            let (config, _) = config_and_srcs("Extra", &index).unwrap();
            assert_eq!(config, temp.path().join("b/Extra.xml"));
            assert!(config_and_srcs("Nothing", &index).is_none());
        }

        #[test]
        fn manifest_attributes() {
            let temp = TempDir::new().unwrap();
            let manifest = write(
                temp.path(),
                "AndroidManifest.xml",
                r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.tests">
                    <instrumentation android:name="androidx.test.runner.AndroidJUnitRunner"
                        android:targetPackage="com.example.app" />
                </manifest>"#,
            );
            assert_eq!(manifest_package(&manifest).as_deref(), Some("com.example.tests"));
            assert_eq!(
                manifest_instrumentation_target(&manifest).as_deref(),
                Some("com.example.app")
            );
        }
    }
}
