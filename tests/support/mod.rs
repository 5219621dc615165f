//! Fake source trees for integration tests.
//!
//! A [`SourceTree`] is a temp directory laid out like a small platform
//! checkout: module dirs with test configs and sources, plus a module-info
//! JSON at `out/module-info.json` describing them.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

pub const BAR_CLASS: &str = "package com.example;\n\
\n\
import org.junit.Test;\n\
\n\
public class BarClass {\n\
    @Test\n\
    public void testA() {}\n\
\n\
    @Test\n\
    public void testB() {}\n\
}\n";

/// A temp source tree and the modules declared in it.
pub struct SourceTree {
    temp: TempDir,
    modules: Map<String, Value>,
}

impl SourceTree {
    pub fn new() -> Self {
        SourceTree {
            temp: TempDir::new().expect("create temp dir"),
            modules: Map::new(),
        }
    }

    /// The usual fixture: `FooTests` at `foo/` with one config and
    /// `com.example.BarClass`, plus two modules close to `no_such_module_xyz`.
    pub fn standard() -> Self {
        let mut tree = SourceTree::new();
        tree.write("foo/AndroidTest.xml", "<configuration />");
        tree.write("foo/src/com/example/BarClass.java", BAR_CLASS);
        tree.device_module("FooTests", "foo");
        tree.write("close/AndroidTest.xml", "<configuration />");
        tree.device_module("no_such_module_xy", "close");
        tree.write("closer/AndroidTest.xml", "<configuration />");
        tree.device_module("no_such_module_x", "closer");
        tree.save_index();
        tree
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write fixture file");
    }

    /// Declare a module from raw module-info fields.
    pub fn module(&mut self, name: &str, record: Value) {
        let mut record = record;
        record["module_name"] = json!(name);
        self.modules.insert(name.to_string(), record);
    }

    /// An installed device test module at `path`.
    pub fn device_module(&mut self, name: &str, path: &str) {
        self.module(
            name,
            json!({
                "path": [path],
                "installed": [format!("out/target/product/x/testcases/{name}/{name}.apk")],
                "class": ["APPS"],
            }),
        );
    }

    /// Write `out/module-info.json` from the declared modules.
    pub fn save_index(&self) {
        let content = serde_json::to_string_pretty(&Value::Object(self.modules.clone()))
            .expect("encode module info");
        self.write("out/module-info.json", &content);
    }

    /// Run `tfind` in the tree root with the cache kept inside the tree.
    pub fn tfind(&self, args: &[&str]) -> Output {
        let output = Command::new(env!("CARGO_BIN_EXE_tfind"))
            .args(args)
            .current_dir(self.root())
            .env_remove("RUST_LOG")
            .env_remove("TESTFIND_NO_CACHE")
            .env_remove("TESTFIND_CONFIG_MODE")
            .env_remove("TESTFIND_FUZZY_DISTANCE")
            .env("TESTFIND_CACHE_DIR", self.root().join("out/cache"))
            .output()
            .expect("failed to execute tfind");
        Output {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Captured run of the binary.
pub struct Output {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl Output {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}\nstderr: {}", self.stdout, self.stderr))
    }
}
