//! Persistent resolution cache.
//!
//! Every successfully resolved reference is stored as one JSON file under the
//! cache root, named by the SHA-256 of the literal reference. Entries are
//! written atomically and read back by the cache finder, which only trusts
//! them after `CacheValidator` has checked them against the current index.
//!
//! A file that cannot be read or decoded is deleted and treated as a miss.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::module_index::ModuleIndex;
use crate::types::TestDescriptor;

/// Version of the on-disk entry layout.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

/// Errors writing or clearing cache entries.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure on an entry or the cache root.
    #[error("cache IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry could not be encoded.
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// Entries
// ============================================================================

/// One cached resolution as stored on disk.
///
/// Descriptors are kept as raw JSON objects so that entries written by an
/// older descriptor layout can be recognized and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub schema_version: u32,
    pub reference: String,
    pub stored_at: String,
    pub tests: Vec<serde_json::Value>,
}

// ============================================================================
// Result Cache
// ============================================================================

/// Directory of cached resolutions.
#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    /// Cache rooted at `root`; the directory is created on first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResultCache { root: root.into() }
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry file for a reference.
    pub fn entry_path(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{}.json", hash_reference(reference)))
    }

    /// Raw entry for a reference, or `None` on a miss.
    pub fn load_entry(&self, reference: &str) -> Option<CacheEntry> {
        let path = self.entry_path(reference);
        if !path.is_file() {
            return None;
        }
        debug!(reference, path = %path.display(), "loading cache entry");
        let decoded = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<CacheEntry>(&content).map_err(|e| e.to_string())
            });
        match decoded {
            Ok(entry) if entry.schema_version == CACHE_SCHEMA_VERSION => Some(entry),
            Ok(entry) => {
                debug!(
                    reference,
                    version = entry.schema_version,
                    "cache entry has an old layout, removing"
                );
                self.remove_file(&path);
                None
            }
            Err(err) => {
                debug!(reference, error = %err, "unreadable cache entry, removing");
                self.remove_file(&path);
                None
            }
        }
    }

    /// Cached descriptors for a reference, without validation.
    pub fn load_cached_result(&self, reference: &str) -> Option<Vec<TestDescriptor>> {
        let entry = self.load_entry(reference)?;
        entry
            .tests
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TestDescriptor>, _>>()
            .map_err(|err| debug!(reference, error = %err, "cache entry does not decode"))
            .ok()
    }

    /// Store the descriptors resolved for a reference.
    pub fn store_result(&self, reference: &str, tests: &[TestDescriptor]) -> CacheResult<()> {
        fs::create_dir_all(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;
        let entry = CacheEntry {
            schema_version: CACHE_SCHEMA_VERSION,
            reference: reference.to_string(),
            stored_at: format_timestamp(SystemTime::now()),
            tests: tests
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        };
        let content = serde_json::to_vec_pretty(&entry)?;
        let path = self.entry_path(reference);
        debug!(reference, path = %path.display(), "saving cache entry");
        atomic_write(&path, &content).map_err(|source| CacheError::Io { path, source })
    }

    /// Remove the entries of the given references.
    pub fn clear<'a>(&self, references: impl IntoIterator<Item = &'a str>) -> CacheResult<()> {
        for reference in references {
            let path = self.entry_path(reference);
            if !path.is_file() {
                continue;
            }
            debug!(reference, path = %path.display(), "removing cache entry");
            fs::remove_file(&path).map_err(|source| CacheError::Io { path, source })?;
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) {
        if let Err(err) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %err, "cannot remove cache entry");
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Decides whether cached descriptors may still be used.
///
/// A cached set is accepted only if every descriptor passes; one stale
/// descriptor rejects the whole set.
#[derive(Debug, Clone, Copy)]
pub struct CacheValidator<'a> {
    index: &'a ModuleIndex,
}

impl<'a> CacheValidator<'a> {
    pub fn new(index: &'a ModuleIndex) -> Self {
        CacheValidator { index }
    }

    /// Validate a raw entry: layout first, then each descriptor.
    pub fn validate_entry(&self, entry: &CacheEntry) -> Option<Vec<TestDescriptor>> {
        if !entry.tests.iter().all(has_current_schema) {
            debug!(reference = %entry.reference, "cached descriptor layout changed");
            return None;
        }
        let tests: Vec<TestDescriptor> = entry
            .tests
            .iter()
            .cloned()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .ok()?;
        self.is_valid(&tests).then_some(tests)
    }

    /// True when every descriptor is still consistent with the index.
    pub fn is_valid(&self, tests: &[TestDescriptor]) -> bool {
        !tests.is_empty()
            && tests
                .iter()
                .all(|t| self.is_test_path_valid(t) && self.is_build_target_valid(t))
    }

    /// The module still lives exactly where the cached targets say.
    pub fn is_test_path_valid(&self, test: &TestDescriptor) -> bool {
        let current: BTreeSet<&str> = self
            .index
            .get_paths(&test.test_name)
            .iter()
            .map(String::as_str)
            .collect();
        if current.is_empty() {
            debug!(test = %test.test_name, "cached test no longer has a path");
            return false;
        }
        let cached = test.test_paths();
        let cached: BTreeSet<&str> = cached.iter().map(String::as_str).collect();
        if cached != current {
            debug!(test = %test.test_name, ?cached, ?current, "cached test paths changed");
            return false;
        }
        true
    }

    /// Rejects a descriptor if any of its build targets is currently a
    /// module.
    ///
    /// This rejects nearly every module-backed entry; see DESIGN.md.
    pub fn is_build_target_valid(&self, test: &TestDescriptor) -> bool {
        match test.build_targets.iter().find(|t| self.index.is_module(t)) {
            Some(target) => {
                debug!(test = %test.test_name, target = %target, "cached build target is a module");
                false
            }
            None => true,
        }
    }
}

/// Same field set as the current descriptor layout.
fn has_current_schema(value: &serde_json::Value) -> bool {
    let Some(cached) = value.as_object() else {
        return false;
    };
    let Ok(serde_json::Value::Object(current)) = serde_json::to_value(TestDescriptor::default())
    else {
        return false;
    };
    let cached: BTreeSet<&String> = cached.keys().collect();
    let current: BTreeSet<&String> = current.keys().collect();
    cached == current
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Hex SHA-256 of a reference.
fn hash_reference(reference: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write content to a file atomically using temp + rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    use std::time::UNIX_EPOCH;

    let pid = std::process::id();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let temp_path = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        pid,
        timestamp
    ));
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Format a timestamp for JSON output (ISO 8601).
fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Tests
// ============================================================================
