//! TEST_MAPPING entries.
//!
//! A TEST_MAPPING file lists tests by bare name, with per-test options and a
//! host flag. Resolving such a list skips classification: the names are
//! always modules (or configs), and the options travel with the resolved
//! descriptors as module arguments.
//!
//! Entry files are JSON arrays:
//!
//! ```json
//! [
//!   { "name": "FooTests", "options": [{ "include-filter": "com.example.Bar" }] },
//!   { "name": "foo_host_tests", "host": true }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors reading an entry file.
#[derive(Debug, Error)]
pub enum TestMappingError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An option object did not hold exactly one key.
    #[error("{}: option of `{test}` must have exactly one key", .path.display())]
    InvalidOption { path: PathBuf, test: String },
}

/// One test of a TEST_MAPPING group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMappingEntry {
    pub name: String,
    /// `(key, value)` pairs, in file order.
    pub options: Vec<(String, String)>,
    /// Run on the host instead of a device.
    pub host: bool,
}

impl TestMappingEntry {
    pub fn new(name: impl Into<String>) -> Self {
        TestMappingEntry {
            name: name.into(),
            ..TestMappingEntry::default()
        }
    }

    /// Options rendered as module arguments, `key:value`.
    pub fn module_args(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect()
    }
}

#[derive(Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    options: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    host: bool,
}

/// Load entries from a JSON file.
pub fn load_entries(path: &Path) -> Result<Vec<TestMappingEntry>, TestMappingError> {
    let content = fs::read_to_string(path).map_err(|source| TestMappingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_entries(path, &content)
}

/// Parse entries; `path` is only used in error messages.
pub fn parse_entries(path: &Path, content: &str) -> Result<Vec<TestMappingEntry>, TestMappingError> {
    let raw: Vec<RawEntry> =
        serde_json::from_str(content).map_err(|source| TestMappingError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let mut entries = Vec::with_capacity(raw.len());
    for entry in raw {
        let mut options = Vec::with_capacity(entry.options.len());
        for option in entry.options {
            let mut pairs = option.into_iter();
            let (Some((key, value)), None) = (pairs.next(), pairs.next()) else {
                return Err(TestMappingError::InvalidOption {
                    path: path.to_path_buf(),
                    test: entry.name,
                });
            };
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            options.push((key, value));
        }
        entries.push(TestMappingEntry {
            name: entry.name,
            options,
            host: entry.host,
        });
    }
    debug!(path = %path.display(), count = entries.len(), "loaded test mapping entries");
    Ok(entries)
}
