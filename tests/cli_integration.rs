//! CLI end-to-end tests.
//!
//! These tests spawn the actual `tfind` binary in a fake source tree and
//! validate stdout and exit codes.
//!
//! Exit code expectations:
//! - 0: Success
//! - 2: Invalid arguments (malformed references, bad entry files)
//! - 3: No tests found
//! - 10: Internal error (missing module-info)

mod support;

use support::SourceTree;

// ============================================================================
// find
// ============================================================================

#[test]
fn find_module_class_with_methods() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["find", "FooTests:BarClass#testA,testB"]);
    assert_eq!(output.code, 0, "stderr: {}", output.stderr);

    let json = output.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["schema_version"], "1");
    let tests = json["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0]["filters"][0]["pattern"], "com.example.BarClass");
    assert_eq!(
        tests[0]["filters"][0]["methods"],
        serde_json::json!(["testA", "testB"])
    );
    let targets: Vec<&str> = json["build_targets"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t.as_str())
        .collect();
    assert!(targets.contains(&"FooTests"));
}

#[test]
fn find_unknown_module_exits_with_suggestions() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["find", "no_such_module_xyz"]);
    assert_eq!(output.code, 3, "stderr: {}", output.stderr);

    let json = output.json();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], 3);
    assert_eq!(
        json["error"]["details"]["references"],
        serde_json::json!(["no_such_module_xyz"])
    );
    assert_eq!(
        json["error"]["details"]["suggestions"][0],
        "no_such_module_xy"
    );
}

#[test]
fn find_without_fuzzy_has_no_suggestions() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["find", "--no-fuzzy", "no_such_module_xyz"]);
    assert_eq!(output.code, 3);
    assert_eq!(
        output.json()["error"]["details"]["suggestions"],
        serde_json::json!([])
    );
}

#[test]
fn find_with_yes_accepts_single_guess() {
    let mut tree = SourceTree::new();
    tree.write("foo/AndroidTest.xml", "<configuration />");
    tree.device_module("FooTests", "foo");
    tree.save_index();

    let output = tree.tfind(&["find", "--yes", "--no-cache", "FooTest"]);
    assert_eq!(output.code, 0, "stdout: {}", output.stdout);
    assert_eq!(output.json()["tests"][0]["test_name"], "FooTests");
}

#[test]
fn malformed_reference_is_invalid_arguments() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["find", "BarClass#testA#testB"]);
    assert_eq!(output.code, 2);
    assert_eq!(output.json()["status"], "error");
}

#[test]
fn missing_module_info_is_internal() {
    let tree = SourceTree::new();
    let output = tree.tfind(&["find", "FooTests"]);
    assert_eq!(output.code, 10);
}

#[test]
fn find_writes_the_cache_dir() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["find", "FooTests"]);
    assert_eq!(output.code, 0);
    let entries = std::fs::read_dir(tree.root().join("out/cache")).unwrap().count();
    assert_eq!(entries, 1);

    let output = tree.tfind(&["find", "--clear-cache", "--no-cache", "FooTests"]);
    assert_eq!(output.code, 0);
    let entries = std::fs::read_dir(tree.root().join("out/cache")).unwrap().count();
    assert_eq!(entries, 0);
}

// ============================================================================
// Other commands
// ============================================================================

#[test]
fn classify_prints_interpretations() {
    let tree = SourceTree::new();
    let output = tree.tfind(&["classify", "FooTests:com.example.BarClass"]);
    assert_eq!(output.code, 0);
    let kinds = output.json()["interpretations"].clone();
    assert_eq!(kinds[0], "CACHE");
    assert!(kinds
        .as_array()
        .unwrap()
        .iter()
        .any(|k| k == "MODULE_CLASS"));
}

#[test]
fn suggest_ranks_by_distance() {
    let tree = SourceTree::standard();
    let output = tree.tfind(&["suggest", "no_such_module_xyz"]);
    assert_eq!(output.code, 0);
    assert_eq!(
        output.json()["suggestions"],
        serde_json::json!(["no_such_module_xy", "no_such_module_x"])
    );

    let output = tree.tfind(&["suggest", "--max-distance", "1", "no_such_module_xyz"]);
    assert_eq!(
        output.json()["suggestions"],
        serde_json::json!(["no_such_module_xy"])
    );
}

#[test]
fn entries_carry_options() {
    let tree = SourceTree::standard();
    tree.write(
        "presubmit.json",
        r#"[{"name": "FooTests", "options": [{"include-filter": "com.example.BarClass"}]}]"#,
    );
    let output = tree.tfind(&["entries", "presubmit.json"]);
    assert_eq!(output.code, 0, "stdout: {}", output.stdout);
    let test = output.json()["tests"][0].clone();
    assert_eq!(test["from_test_mapping"], true);
    assert_eq!(
        test["module_args"],
        serde_json::json!(["include-filter:com.example.BarClass"])
    );
}

#[test]
fn malformed_entries_file() {
    let tree = SourceTree::standard();
    tree.write("bad.json", r#"[{"name": "FooTests", "options": [{"a": "1", "b": "2"}]}]"#);
    let output = tree.tfind(&["entries", "bad.json"]);
    assert_eq!(output.code, 2);
}

#[test]
fn host_unit_tests_under_dir() {
    let mut tree = SourceTree::standard();
    tree.write("lib/util/Android.bp", "");
    tree.module(
        "util_unit",
        serde_json::json!({
            "path": ["lib/util"],
            "installed": ["out/host/linux-x86/testcases/util_unit/util_unit"],
            "auto_test_config": [true],
            "is_unit_test": "true",
            "supported_variants": ["HOST"],
        }),
    );
    tree.save_index();

    let output = tree.tfind(&["host-unit-tests", "lib"]);
    assert_eq!(output.code, 0);
    assert_eq!(output.json()["tests"], serde_json::json!(["util_unit"]));
}
