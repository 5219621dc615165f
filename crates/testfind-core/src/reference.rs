//! Parsing of raw test references.
//!
//! A reference is one positional argument such as `FooTests`,
//! `FooTests:com.example.BarTest#testA,testB`, `path/to/Foo.java#m` or
//! `FooTests[a.apk+b.apex]`. This module only splits strings; deciding what a
//! reference means is the classifier's and the finders' job.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FinderError, FinderResult};

static MODULE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<module_name>[^:#]+):(?P<pkg_class_name>[^#]+)#?(?P<method_name>.*)$")
        .unwrap()
});

static MAINLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<test>.*)\[(?P<mainline_modules>.*[.](apk|apks|apex))\]$").unwrap()
});

static MAINLINE_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(apex|apks|apk)$").unwrap());

// ============================================================================
// Method splitting
// ============================================================================

/// Split `ref#m1,m2` into the base reference and its method set.
///
/// Commas inside `[...]` belong to parameterized method names, so
/// `m[1],m[2,[3,4]]` yields `{m[1], m[2,[3,4]]}`.
///
/// # Errors
///
/// - `TooManyMethods` if the reference holds more than one `#`.
/// - `MoreThanOneClass` if it holds a `,` but no `#`.
pub fn split_methods(reference: &str) -> FinderResult<(String, BTreeSet<String>)> {
    let Some((base, methods)) = reference.split_once('#') else {
        if reference.contains(',') {
            return Err(FinderError::MoreThanOneClass {
                reference: reference.to_string(),
            });
        }
        return Ok((reference.to_string(), BTreeSet::new()));
    };
    if methods.contains('#') {
        return Err(FinderError::TooManyMethods {
            reference: reference.to_string(),
        });
    }

    let mut parsed: Vec<String> = Vec::new();
    let mut depth: i64 = 0;
    for part in methods.split(',') {
        match parsed.last_mut() {
            Some(previous) if depth > 0 => {
                previous.push(',');
                previous.push_str(part);
            }
            _ => parsed.push(part.to_string()),
        }
        depth += part.matches('[').count() as i64;
        depth -= part.matches(']').count() as i64;
    }
    Ok((base.to_string(), parsed.into_iter().collect()))
}

// ============================================================================
// Module-qualified references
// ============================================================================

/// A `module:class_or_package[#methods]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub module_name: String,
    pub pkg_class_name: String,
    pub method_name: String,
}

/// Parse a `module:class_or_package[#methods]` reference.
pub fn parse_module_reference(reference: &str) -> Option<ModuleReference> {
    let caps = MODULE_REF_RE.captures(reference)?;
    Some(ModuleReference {
        module_name: caps["module_name"].to_string(),
        pkg_class_name: caps["pkg_class_name"].to_string(),
        method_name: caps["method_name"].to_string(),
    })
}

// ============================================================================
// Mainline references
// ============================================================================

/// A test name plus the mainline modules it is pinned to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestIdentifier {
    /// Test name without the `[...]` suffix.
    pub test_name: String,
    /// Mainline module names, extension stripped.
    pub module_names: Vec<String>,
    /// Mainline binaries as written, e.g. `a.apk`.
    pub binary_names: Vec<String>,
}

impl TestIdentifier {
    /// True if the reference carried a mainline suffix.
    pub fn has_mainline_modules(&self) -> bool {
        !self.binary_names.is_empty()
    }

    /// The binaries joined as in module-info, e.g. `a.apk+b.apex`.
    pub fn joined_binaries(&self) -> String {
        self.binary_names.join("+")
    }
}

/// True if the reference ends with a `[mod.apk+mod.apex]` suffix.
pub fn is_mainline_reference(reference: &str) -> bool {
    MAINLINE_RE.is_match(reference)
}

/// Split a `test[a.apk+b.apex]` reference into its parts.
pub fn parse_test_identifier(reference: &str) -> TestIdentifier {
    let Some(caps) = MAINLINE_RE.captures(reference) else {
        return TestIdentifier {
            test_name: reference.to_string(),
            ..TestIdentifier::default()
        };
    };
    let binary_names: Vec<String> = caps["mainline_modules"]
        .split('+')
        .map(str::to_string)
        .collect();
    let module_names = binary_names
        .iter()
        .map(|b| MAINLINE_EXT_RE.replace(b, "").into_owned())
        .collect();
    TestIdentifier {
        test_name: caps["test"].to_string(),
        module_names,
        binary_names,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    mod split_methods_tests {
        use super::*;

        #[test]
        fn no_methods() {
            assert_eq!(
                split_methods("FooTest").unwrap(),
                ("FooTest".to_string(), BTreeSet::new())
            );
        }

        #[test]
        fn comma_separated_methods() {
            let (base, methods) = split_methods("a/b/FooTest.java#testA,testB").unwrap();
            assert_eq!(base, "a/b/FooTest.java");
            assert_eq!(methods, set(&["testA", "testB"]));
        }

        #[test]
        fn rejoining_preserves_method_set() {
            let reference = "Mod:Cls#m2,m1,m3";
            let (base, methods) = split_methods(reference).unwrap();
            let rejoined = format!(
                "{}#{}",
                base,
                methods.iter().cloned().collect::<Vec<_>>().join(",")
            );
            assert_eq!(split_methods(&rejoined).unwrap().1, methods);
        }

        #[test]
        fn too_many_hashes() {
            assert!(matches!(
                split_methods("A#m1#m2"),
                Err(FinderError::TooManyMethods { .. })
            ));
            assert!(matches!(
                split_methods("Mod:A#m,B#m"),
                Err(FinderError::TooManyMethods { .. })
            ));
        }

        #[test]
        fn comma_without_hash() {
            assert!(matches!(
                split_methods("ClassA,ClassB"),
                Err(FinderError::MoreThanOneClass { .. })
            ));
        }

        #[test]
        fn bracketed_parameters_keep_commas() {
            let (_, methods) = split_methods("Cls#method[1],method[2,[3,4]]").unwrap();
            assert_eq!(methods, set(&["method[1]", "method[2,[3,4]]"]));
        }

        #[test]
        fn nested_brackets_spanning_many_parts() {
            let (_, methods) = split_methods("Cls#m[[1,2],[3,4]],n").unwrap();
            assert_eq!(methods, set(&["m[[1,2],[3,4]]", "n"]));
        }
    }

    mod module_reference_tests {
        use super::*;

        #[test]
        fn module_class_and_methods() {
            let parsed = parse_module_reference("FooTests:com.example.Bar#testA,testB").unwrap();
            assert_eq!(parsed.module_name, "FooTests");
            assert_eq!(parsed.pkg_class_name, "com.example.Bar");
            assert_eq!(parsed.method_name, "testA,testB");
        }

        #[test]
        fn plain_names_do_not_parse() {
            assert!(parse_module_reference("FooTests").is_none());
            assert!(parse_module_reference("Foo#bar").is_none());
        }
    }

    mod mainline_tests {
        use super::*;

        #[test]
        fn parses_binaries_and_modules() {
            let id = parse_test_identifier("FooTest[com.android.a.apk+com.android.b.apex]");
            assert_eq!(id.test_name, "FooTest");
            assert_eq!(id.module_names, vec!["com.android.a", "com.android.b"]);
            assert_eq!(id.joined_binaries(), "com.android.a.apk+com.android.b.apex");
            assert!(id.has_mainline_modules());
        }

        #[test]
        fn plain_reference_has_no_mainline() {
            let id = parse_test_identifier("FooTest");
            assert_eq!(id.test_name, "FooTest");
            assert!(!id.has_mainline_modules());
            assert!(!is_mainline_reference("FooTest[abc]"));
        }
    }
}
