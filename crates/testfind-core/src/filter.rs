//! Test filter construction.
//!
//! A filter narrows a test run to classes, packages or methods. The pattern
//! syntax depends on the runner:
//!
//! ## JVM tests
//!
//! - Class: `com.example.FooTest` with methods `{testA, testB}`
//! - Package: `com.example` and never any methods
//! - Parameterized classes get `*` appended to bare method names so every
//!   parameter variant runs
//!
//! ## Native (gtest) tests
//!
//! | Class kind          | No methods    | Methods                      |
//! |---------------------|---------------|------------------------------|
//! | regular             | `Cls.*`       | `Cls.m1:Cls.m2`              |
//! | typed               | `Cls/*.*`     | `Cls/*.m1:Cls/*.m2`          |
//! | value-parameterized | `*/Cls.*`     | `*/Cls.m1:*/Cls.m2`          |
//! | typed-parameterized | `*/Cls/*.*`   | `*/Cls/*.m1:*/Cls/*.m2`      |
//!
//! Parameterized classes keep an explicit `Prefix/Cls` instead of `*/`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{FinderError, FinderResult};
use crate::source::{self, CcClassInfo, GtestKind};
use crate::types::TestFilter;

// ============================================================================
// Native filters
// ============================================================================

/// Gtest filter string for `class_name` (optionally `Prefix/Class`).
pub fn cc_filter(
    class_info: &BTreeMap<String, CcClassInfo>,
    class_name: &str,
    methods: &BTreeSet<String>,
) -> String {
    let base = class_name.rsplit('/').next().unwrap_or(class_name);
    let kind = class_info
        .get(base)
        .map(CcClassInfo::kind)
        .unwrap_or(GtestKind::Regular);
    debug!(class = base, ?kind, "native class kind");

    let mut class_name = class_name.to_string();
    if matches!(kind, GtestKind::ValueParameterized | GtestKind::TypedParameterized)
        && !class_name.contains('/')
    {
        class_name = format!("*/{class_name}");
    }
    let separator = match kind {
        GtestKind::Typed | GtestKind::TypedParameterized => "/*.",
        GtestKind::Regular | GtestKind::ValueParameterized => ".",
    };
    if methods.is_empty() {
        return format!("{class_name}{separator}*");
    }
    methods
        .iter()
        .map(|m| format!("{class_name}{separator}{m}"))
        .collect::<Vec<_>>()
        .join(":")
}

// ============================================================================
// JVM filters
// ============================================================================

/// Method filters for a Java/Kotlin class file.
///
/// For parameterized classes a bare method name becomes `name*`; names that
/// already carry brackets are left alone.
pub fn java_method_filters(class_file: &Path, methods: &BTreeSet<String>) -> BTreeSet<String> {
    let parameterized = fs::read_to_string(class_file)
        .map(|content| source::is_parameterized_java_class(&content))
        .unwrap_or(false);
    if !parameterized {
        return methods.clone();
    }
    methods
        .iter()
        .map(|m| {
            if m.contains(['(', ')', '[', ']', '{', '}']) {
                m.clone()
            } else {
                format!("{m}*")
            }
        })
        .collect()
}

// ============================================================================
// Filters for a resolved path
// ============================================================================

/// What the caller already knows about the path being filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterHint<'a> {
    /// Class the user asked for, if any.
    pub class_name: Option<&'a str>,
    /// The owning module is a native test.
    pub is_native: bool,
    /// Owning module dir; a directory equal to it is the whole module.
    pub module_dir: Option<&'a Path>,
}

/// Build the filters for a test file or directory.
///
/// # Errors
///
/// - `MissingCcTestCase` for a C++ file without gtest declarations.
/// - `MethodWithoutClass` when methods are requested on a package directory.
/// - `MissingPackageName` for a Java/Kotlin file without a package.
pub fn filters_for_path(
    path: &Path,
    methods: &BTreeSet<String>,
    hint: FilterHint<'_>,
) -> FinderResult<BTreeSet<TestFilter>> {
    let mut filters = BTreeSet::new();
    if path.is_file() {
        if hint.is_native {
            let info = source::cc_class_info(path)?;
            let class_name = hint.class_name.unwrap_or("*");
            filters.insert(TestFilter::pattern_only(cc_filter(&info, class_name, methods)));
        } else if source::is_java_file(path) {
            let fqcn = source::fully_qualified_class_name(path)?;
            filters.insert(TestFilter::new(fqcn, java_method_filters(path, methods)));
        } else if source::is_cc_file(path) {
            if !source::has_cc_class(path)? {
                return Err(FinderError::MissingCcTestCase {
                    path: path.to_path_buf(),
                });
            }
            let info = source::cc_class_info(path)?;
            for class_name in info.keys() {
                filters.insert(TestFilter::pattern_only(cc_filter(&info, class_name, methods)));
            }
        }
    } else if let Some(class_name) = hint.class_name {
        filters.insert(TestFilter::new(class_name, methods.iter().cloned()));
    } else if path.is_dir() && hint.module_dir != Some(path) {
        if let Some(package) = package_of_dir(path) {
            if !methods.is_empty() {
                return Err(FinderError::MethodWithoutClass {
                    methods: methods.iter().cloned().collect::<Vec<_>>().join(","),
                });
            }
            filters.insert(TestFilter::pattern_only(package));
        }
    }
    debug!(path = %path.display(), ?filters, "filters for path");
    Ok(filters)
}

/// Package declared by the first Java/Kotlin file directly inside `dir`.
fn package_of_dir(dir: &Path) -> Option<String> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && source::is_java_file(p))
        .collect();
    entries.sort();
    entries.iter().find_map(|p| {
        fs::read_to_string(p)
            .ok()
            .and_then(|content| source::package_name(&content))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn info(kind: GtestKind) -> BTreeMap<String, CcClassInfo> {
        let mut info = CcClassInfo::default();
        match kind {
            GtestKind::Regular => {}
            GtestKind::Typed => info.typed = true,
            GtestKind::ValueParameterized => {
                info.prefixes.insert("Inst".to_string());
            }
            GtestKind::TypedParameterized => {
                info.typed = true;
                info.prefixes.insert("Inst".to_string());
            }
        }
        BTreeMap::from([("Cls".to_string(), info)])
    }

    mod cc_filter_tests {
        use super::*;

        #[test]
        fn regular() {
            let info = info(GtestKind::Regular);
            assert_eq!(cc_filter(&info, "Cls", &BTreeSet::new()), "Cls.*");
            assert_eq!(cc_filter(&info, "Cls", &set(&["b", "a"])), "Cls.a:Cls.b");
        }

        #[test]
        fn value_parameterized_gets_wildcard_prefix() {
            let info = info(GtestKind::ValueParameterized);
            assert_eq!(
                cc_filter(&info, "Cls", &set(&["m1", "m2"])),
                "*/Cls.m1:*/Cls.m2"
            );
            assert_eq!(cc_filter(&info, "Inst/Cls", &BTreeSet::new()), "Inst/Cls.*");
        }

        #[test]
        fn typed() {
            let info = info(GtestKind::Typed);
            assert_eq!(cc_filter(&info, "Cls", &BTreeSet::new()), "Cls/*.*");
            assert_eq!(cc_filter(&info, "Cls", &set(&["m"])), "Cls/*.m");
        }

        #[test]
        fn typed_parameterized() {
            let info = info(GtestKind::TypedParameterized);
            assert_eq!(cc_filter(&info, "Cls", &BTreeSet::new()), "*/Cls/*.*");
            assert_eq!(cc_filter(&info, "Cls", &set(&["m"])), "*/Cls/*.m");
        }

        #[test]
        fn unknown_class_is_regular() {
            assert_eq!(cc_filter(&BTreeMap::new(), "Other", &BTreeSet::new()), "Other.*");
        }
    }

    mod java_filter_tests {
        use super::*;

        #[test]
        fn parameterized_methods_get_wildcard() {
            let temp = TempDir::new().unwrap();
            let path = write(
                temp.path(),
                "P.java",
                "package p;\n@RunWith(Parameterized.class)\npublic class P {}\n",
            );
            assert_eq!(
                java_method_filters(&path, &set(&["testA", "testB[1]"])),
                set(&["testA*", "testB[1]"])
            );
        }

        #[test]
        fn plain_class_keeps_methods() {
            let temp = TempDir::new().unwrap();
            let path = write(temp.path(), "P.java", "package p;\npublic class P {}\n");
            assert_eq!(java_method_filters(&path, &set(&["testA"])), set(&["testA"]));
        }
    }

    mod path_filter_tests {
        use super::*;

        #[test]
        fn java_file_gives_qualified_class() {
            let temp = TempDir::new().unwrap();
            let path = write(
                temp.path(),
                "src/com/example/BarTest.java",
                "package com.example;\npublic class BarTest {}\n",
            );
            let filters = filters_for_path(&path, &set(&["testA"]), FilterHint::default()).unwrap();
            assert_eq!(
                filters,
                BTreeSet::from([TestFilter::new("com.example.BarTest", ["testA"])])
            );
        }

        #[test]
        fn cc_file_without_tests_is_an_error() {
            let temp = TempDir::new().unwrap();
            let path = write(temp.path(), "foo_test.cc", "int main() {}\n");
            let err = filters_for_path(&path, &BTreeSet::new(), FilterHint::default()).unwrap_err();
            assert!(matches!(err, FinderError::MissingCcTestCase { .. }));
        }

        #[test]
        fn cc_file_gives_one_filter_per_class() {
            let temp = TempDir::new().unwrap();
            let path = write(
                temp.path(),
                "foo_test.cc",
                "TEST(A, one) {\n}\nTEST_F(B, two) {\n}\n",
            );
            let filters = filters_for_path(&path, &BTreeSet::new(), FilterHint::default()).unwrap();
            let patterns: Vec<&str> = filters.iter().map(|f| f.pattern.as_str()).collect();
            assert_eq!(patterns, vec!["A.*", "B.*"]);
        }

        #[test]
        fn package_dir_rejects_methods() {
            let temp = TempDir::new().unwrap();
            write(
                temp.path(),
                "src/com/example/BarTest.java",
                "package com.example;\n",
            );
            let dir = temp.path().join("src/com/example");
            let filters = filters_for_path(&dir, &BTreeSet::new(), FilterHint::default()).unwrap();
            assert_eq!(filters, BTreeSet::from([TestFilter::pattern_only("com.example")]));
            let err = filters_for_path(&dir, &set(&["m"]), FilterHint::default()).unwrap_err();
            assert!(matches!(err, FinderError::MethodWithoutClass { .. }));
        }

        #[test]
        fn module_dir_has_no_filter() {
            let temp = TempDir::new().unwrap();
            write(temp.path(), "mod/Foo.java", "package com.example;\n");
            let dir = temp.path().join("mod");
            let hint = FilterHint {
                module_dir: Some(&dir),
                ..FilterHint::default()
            };
            assert!(filters_for_path(&dir, &BTreeSet::new(), hint).unwrap().is_empty());
        }

        #[test]
        fn dir_with_class_hint() {
            let temp = TempDir::new().unwrap();
            let hint = FilterHint {
                class_name: Some("com.example.Cls"),
                ..FilterHint::default()
            };
            let filters = filters_for_path(temp.path(), &set(&["m"]), hint).unwrap();
            assert_eq!(filters, BTreeSet::from([TestFilter::new("com.example.Cls", ["m"])]));
        }
    }
}
