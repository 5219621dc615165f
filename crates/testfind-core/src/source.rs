//! Source text analysis for Java, Kotlin and C++ test files.
//!
//! Everything here is regex-based line scanning. It does not parse the
//! languages; it recognizes the handful of declarations test discovery needs:
//! package names, test methods, parent classes, parameterized runners, and the
//! gtest macro family.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{FinderError, FinderResult};
use crate::search::SourceSearch;

// ============================================================================
// Patterns
// ============================================================================

static JAVA_METHOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\s+(fun|void)\s+(?P<method>\w+)\(").unwrap());

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*package\s+(?P<package>[^(;|\s)]+)\s*").unwrap());

static PARENT_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*class\s+\w+\s+(?:extends|:)\s+(?P<parent>[\w\.]+)\s*(?:\{|\()").unwrap()
});

static PARAMETERIZED_TEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@ParameterizedTest").unwrap());

static RUN_WITH_PARAMETERIZED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@RunWith\s*\(\s*Parameterized.*(\.|::)class").unwrap());

static SUSPECTED_PARAM_RUNNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*@RunWith\s*\(\s*(TestParameterInjector|JUnitParamsRunner|DataProviderRunner|JukitoRunner|Theories|BedsteadJUnit4)(\.|::)class\s*\)",
    )
    .unwrap()
});

static CC_CLASS_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(TYPED_TEST(?:|_P)|TEST(?:|_F|_P))\s*\(\s*(?P<class_name>\w+),\s*(?P<method_name>\w+)\)\s*\{",
    )
    .unwrap()
});

static CC_PARAM_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*INSTANTIATE_(?:|TYPED_)TEST_(?:SUITE|CASE)_P\s*\(\s*(?P<instantiate>\w+),\s*(?P<class>\w+)\s*,",
    )
    .unwrap()
});

static TYPED_CC_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*TYPED_TEST_SUITE(?:|_P)\(\s*(?P<class_name>\w+)").unwrap()
});

static CC_BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static CC_LINE_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());

static BRACKETED_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\S+\]").unwrap());

// ============================================================================
// File kinds
// ============================================================================

/// True for `.java` and `.kt` files.
pub fn is_java_file(path: &Path) -> bool {
    matches!(extension(path), Some("java" | "kt"))
}

/// True for `.cc` and `.cpp` files.
pub fn is_cc_file(path: &Path) -> bool {
    matches!(extension(path), Some("cc" | "cpp"))
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Read a source file, attaching the path to any IO error.
pub fn read_source(path: &Path) -> FinderResult<String> {
    fs::read_to_string(path).map_err(|e| FinderError::io(path, e))
}

// ============================================================================
// Java / Kotlin
// ============================================================================

/// The `package` declared in a Java/Kotlin source.
pub fn package_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| PACKAGE_RE.captures(line))
        .map(|caps| caps["package"].to_string())
}

/// `package.ClassName` for a Java/Kotlin file.
///
/// # Errors
///
/// `MissingPackageName` if the file declares no package.
pub fn fully_qualified_class_name(path: &Path) -> FinderResult<String> {
    let content = read_source(path)?;
    let package = package_name(&content).ok_or_else(|| FinderError::MissingPackageName {
        path: path.to_path_buf(),
    })?;
    let class = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(format!("{package}.{class}"))
}

/// Names of every `void name(` / `fun name(` declaration.
pub fn java_methods(content: &str) -> BTreeSet<String> {
    JAVA_METHOD_RE
        .captures_iter(content)
        .map(|caps| caps["method"].to_string())
        .collect()
}

/// The superclass named by `class A extends B {` or `class A : B(`.
pub fn parent_class_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| PARENT_CLASS_RE.captures(line))
        .map(|caps| caps["parent"].to_string())
}

/// True when the class runs under a parameterized runner.
pub fn is_parameterized_java_class(content: &str) -> bool {
    content.lines().any(|line| {
        PARAMETERIZED_TEST_RE.is_match(line)
            || RUN_WITH_PARAMETERIZED_RE.is_match(line)
            || SUSPECTED_PARAM_RUNNER_RE.is_match(line)
    })
}

/// Methods declared right after an `@Annotation` line.
///
/// `annotation` may be fully qualified; only its last segment is matched.
pub fn annotated_methods(annotation: &str, content: &str) -> BTreeSet<String> {
    let simple = annotation.rsplit('.').next().unwrap_or(annotation);
    let marker = format!("@{simple}");
    let mut methods = BTreeSet::new();
    let mut in_block = false;
    for line in content.lines() {
        if line.trim().starts_with(&marker) {
            in_block = true;
            continue;
        }
        if in_block {
            let found = java_methods(line);
            if !found.is_empty() {
                methods.extend(found);
                in_block = false;
            }
        }
    }
    methods
}

/// The file itself plus the files of all its superclasses, recursively.
pub fn java_parent_paths(path: &Path, search: &SourceSearch) -> BTreeSet<PathBuf> {
    let mut visited = BTreeSet::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(current) = pending.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Ok(content) = read_source(&current) else {
            continue;
        };
        let Some(parent) = parent_class_name(&content) else {
            continue;
        };
        let parent_fqcn = if parent.contains('.') {
            parent
        } else {
            match package_name(&content) {
                Some(package) => format!("{package}.{parent}"),
                None => parent,
            }
        };
        let found = search.find_qualified_class_files(search.root(), &parent_fqcn);
        debug!(class = %parent_fqcn, files = found.len(), "parent class lookup");
        pending.extend(found);
    }
    visited
}

// ============================================================================
// C++ (gtest)
// ============================================================================

/// The four gtest class shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtestKind {
    /// `TEST` / `TEST_F`.
    Regular,
    /// `TYPED_TEST_SUITE`.
    Typed,
    /// `TEST_P` + `INSTANTIATE_TEST_SUITE_P`.
    ValueParameterized,
    /// `TYPED_TEST_SUITE_P` + `INSTANTIATE_TYPED_TEST_SUITE_P`.
    TypedParameterized,
}

/// What a C++ source declares about one test class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CcClassInfo {
    pub methods: BTreeSet<String>,
    /// Instantiation names of parameterized suites.
    pub prefixes: BTreeSet<String>,
    pub typed: bool,
}

impl CcClassInfo {
    /// Classify the test class.
    pub fn kind(&self) -> GtestKind {
        match (self.prefixes.is_empty(), self.typed) {
            (false, true) => GtestKind::TypedParameterized,
            (false, false) => GtestKind::ValueParameterized,
            (true, true) => GtestKind::Typed,
            (true, false) => GtestKind::Regular,
        }
    }
}

/// Remove `/* */` and `//` comments.
pub fn strip_cc_comments(content: &str) -> String {
    let without_blocks = CC_BLOCK_COMMENT_RE.replace_all(content, "");
    CC_LINE_COMMENT_RE.replace_all(&without_blocks, "").into_owned()
}

/// Collect test classes declared by gtest macros.
///
/// Only classes that own at least one test method are reported; instantiation
/// and typed-suite macros decorate those classes.
pub fn parse_cc_class_info(content: &str) -> BTreeMap<String, CcClassInfo> {
    let mut classes: BTreeMap<String, CcClassInfo> = BTreeMap::new();
    for caps in CC_CLASS_METHOD_RE.captures_iter(content) {
        classes
            .entry(caps["class_name"].to_string())
            .or_default()
            .methods
            .insert(caps["method_name"].to_string());
    }
    for caps in CC_PARAM_CLASS_RE.captures_iter(content) {
        match classes.get_mut(&caps["class"]) {
            Some(info) => {
                info.prefixes.insert(caps["instantiate"].to_string());
            }
            None => debug!(class = &caps["class"], "instantiation without test methods"),
        }
    }
    for caps in TYPED_CC_CLASS_RE.captures_iter(content) {
        match classes.get_mut(&caps["class_name"]) {
            Some(info) => info.typed = true,
            None => debug!(class = &caps["class_name"], "typed suite without test methods"),
        }
    }
    classes
}

/// Class info for a C++ file, comments stripped.
pub fn cc_class_info(path: &Path) -> FinderResult<BTreeMap<String, CcClassInfo>> {
    let content = read_source(path)?;
    Ok(parse_cc_class_info(&strip_cc_comments(&content)))
}

/// True if the C++ file declares any gtest macro.
pub fn has_cc_class(path: &Path) -> FinderResult<bool> {
    let content = strip_cc_comments(&read_source(path)?);
    Ok(CC_CLASS_METHOD_RE.is_match(&content)
        || CC_PARAM_CLASS_RE.is_match(&content)
        || TYPED_CC_CLASS_RE.is_match(&content))
}

// ============================================================================
// Method lookup
// ============================================================================

/// True if every requested method is declared in the file.
///
/// Java methods may be inherited, so superclass files are searched too.
/// Parameter suffixes (`m[1]` in Java, `m/2` in C++) are ignored.
pub fn has_method_in_file(path: &Path, methods: &BTreeSet<String>, search: &SourceSearch) -> bool {
    if !path.is_file() {
        return false;
    }
    if is_java_file(path) {
        let wanted: BTreeSet<String> = methods
            .iter()
            .map(|m| BRACKETED_PARAM_RE.replace_all(m, "").into_owned())
            .collect();
        let own = read_source(path)
            .map(|content| java_methods(&content))
            .unwrap_or_default();
        if wanted.is_subset(&own) {
            return true;
        }
        let mut all = BTreeSet::new();
        for parent_path in java_parent_paths(path, search) {
            if let Ok(content) = read_source(&parent_path) {
                all.extend(java_methods(&content));
            }
        }
        let found = wanted.is_subset(&all);
        if !found {
            let missing: Vec<&String> = wanted.difference(&all).collect();
            debug!(?missing, file = %path.display(), "methods not found");
        }
        return found;
    }
    if is_cc_file(path) {
        let wanted: BTreeSet<String> = methods
            .iter()
            .map(|m| m.split('/').next().unwrap_or(m).to_string())
            .collect();
        let all: BTreeSet<String> = cc_class_info(path)
            .map(|info| info.into_values().flat_map(|c| c.methods).collect())
            .unwrap_or_default();
        return wanted.is_subset(&all);
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JAVA_SOURCE: &str = r#"
package com.example.tests;

import org.junit.Test;

@RunWith(AndroidJUnit4.class)
public class BarTest extends BaseTest {
    @Test
    public void testA() {}

    @Test
    @SmallTest
    public void testB() throws Exception {}

    private void helper(int x) {}
}
"#;

    mod java_tests {
        use super::*;

        #[test]
        fn package_and_methods() {
            assert_eq!(package_name(JAVA_SOURCE).as_deref(), Some("com.example.tests"));
            assert_eq!(
                java_methods(JAVA_SOURCE),
                BTreeSet::from(["testA".into(), "testB".into(), "helper".into()])
            );
        }

        #[test]
        fn kotlin_functions() {
            let kt = "package a.b\nclass T : Base() {\n  @Test fun testK() {}\n}\n";
            assert_eq!(java_methods(kt), BTreeSet::from(["testK".to_string()]));
            assert_eq!(parent_class_name(kt).as_deref(), Some("Base"));
        }

        #[test]
        fn parent_class_from_extends() {
            assert_eq!(parent_class_name(JAVA_SOURCE).as_deref(), Some("BaseTest"));
        }

        #[test]
        fn parameterized_detection() {
            assert!(!is_parameterized_java_class(JAVA_SOURCE));
            assert!(is_parameterized_java_class("@RunWith(Parameterized.class)\nclass X {}"));
            assert!(is_parameterized_java_class("@RunWith(Parameterized::class)\nclass X"));
            assert!(is_parameterized_java_class("  @ParameterizedTest\n"));
            assert!(is_parameterized_java_class("@RunWith(TestParameterInjector.class)"));
            assert!(is_parameterized_java_class("@RunWith(junitparamsrunner.class)"));
        }

        #[test]
        fn annotated_methods_take_next_declaration() {
            assert_eq!(
                annotated_methods("androidx.test.filters.SmallTest", JAVA_SOURCE),
                BTreeSet::from(["testB".to_string()])
            );
            assert_eq!(
                annotated_methods("org.junit.Test", JAVA_SOURCE),
                BTreeSet::from(["testA".to_string(), "testB".to_string()])
            );
        }

        #[test]
        fn fqcn_requires_package() {
            let tmp = TempDir::new().unwrap();
            let with = tmp.path().join("BarTest.java");
            fs::write(&with, JAVA_SOURCE).unwrap();
            assert_eq!(
                fully_qualified_class_name(&with).unwrap(),
                "com.example.tests.BarTest"
            );
            let without = tmp.path().join("Loose.java");
            fs::write(&without, "class Loose {}").unwrap();
            assert!(matches!(
                fully_qualified_class_name(&without),
                Err(FinderError::MissingPackageName { .. })
            ));
        }

        #[test]
        fn inherited_methods_are_found() {
            let tmp = TempDir::new().unwrap();
            let dir = tmp.path().join("src/com/example/tests");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("BarTest.java"), JAVA_SOURCE).unwrap();
            fs::write(
                dir.join("BaseTest.java"),
                "package com.example.tests;\npublic class BaseTest {\n  public void testInherited() {}\n}\n",
            )
            .unwrap();
            let search = SourceSearch::new(tmp.path(), &[]);
            let methods = BTreeSet::from(["testA".to_string(), "testInherited".to_string()]);
            assert!(has_method_in_file(&dir.join("BarTest.java"), &methods, &search));
            let missing = BTreeSet::from(["testMissing".to_string()]);
            assert!(!has_method_in_file(&dir.join("BarTest.java"), &missing, &search));
        }

        #[test]
        fn parameter_suffixes_are_ignored() {
            let tmp = TempDir::new().unwrap();
            let file = tmp.path().join("BarTest.java");
            fs::write(&file, JAVA_SOURCE).unwrap();
            let search = SourceSearch::new(tmp.path(), &[]);
            let methods = BTreeSet::from(["testA[1]".to_string()]);
            assert!(has_method_in_file(&file, &methods, &search));
        }
    }

    mod cc_tests {
        use super::*;

        const CC_SOURCE: &str = r#"
// TEST(Commented, out) {
TEST(Plain, works) {
}
TEST_F(Plain, alsoWorks) {
}
TEST_P(Param, check) {
}
INSTANTIATE_TEST_SUITE_P(Inst, Param, testing::Values(1, 2));
TYPED_TEST_SUITE(Typed, MyTypes);
TYPED_TEST(Typed, run) {
}
TYPED_TEST_SUITE_P(TypedP);
TYPED_TEST_P(TypedP, go) {
}
INSTANTIATE_TYPED_TEST_SUITE_P(Pfx, TypedP, MyTypes);
/* TEST(Block, comment) {
} */
"#;

        #[test]
        fn classes_and_kinds() {
            let info = parse_cc_class_info(&strip_cc_comments(CC_SOURCE));
            assert_eq!(
                info.keys().cloned().collect::<Vec<_>>(),
                vec!["Param", "Plain", "Typed", "TypedP"]
            );
            assert_eq!(info["Plain"].kind(), GtestKind::Regular);
            assert_eq!(info["Plain"].methods.len(), 2);
            assert_eq!(info["Param"].kind(), GtestKind::ValueParameterized);
            assert_eq!(info["Typed"].kind(), GtestKind::Typed);
            assert_eq!(info["TypedP"].kind(), GtestKind::TypedParameterized);
            assert_eq!(info["TypedP"].prefixes, BTreeSet::from(["Pfx".to_string()]));
        }

        #[test]
        fn file_level_helpers() {
            let tmp = TempDir::new().unwrap();
            let file = tmp.path().join("foo_test.cc");
            fs::write(&file, CC_SOURCE).unwrap();
            assert!(has_cc_class(&file).unwrap());
            let search = SourceSearch::new(tmp.path(), &[]);
            let methods = BTreeSet::from(["works".to_string(), "check/1".to_string()]);
            assert!(has_method_in_file(&file, &methods, &search));

            let empty = tmp.path().join("empty_test.cc");
            fs::write(&empty, "// TEST(A, b) {\nint main() {}\n").unwrap();
            assert!(!has_cc_class(&empty).unwrap());
        }
    }
}
