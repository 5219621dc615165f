//! Filesystem search over the source tree.
//!
//! Finders locate classes, packages and configs by walking the tree. Build
//! output and VCS metadata directories are pruned during the walk, never
//! filtered afterwards, so a checkout with a populated `out/` stays fast.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::module_index::ModuleIndex;
use crate::types::MODULE_CONFIG;

/// Directories never descended into.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", ".repo", "out"];

const CC_TEST_MACROS: &[&str] = &["TYPED_TEST_P", "TYPED_TEST", "TEST_F", "TEST_P", "TEST"];

// ============================================================================
// Source Search
// ============================================================================

/// Walks the source tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct SourceSearch {
    root: PathBuf,
    exclude_dirs: Vec<String>,
}

impl SourceSearch {
    /// Create a search; an empty exclude list means `DEFAULT_EXCLUDE_DIRS`.
    pub fn new(root: impl Into<PathBuf>, exclude_dirs: &[String]) -> Self {
        let exclude_dirs = if exclude_dirs.is_empty() {
            DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect()
        } else {
            exclude_dirs.to_vec()
        };
        SourceSearch {
            root: root.into(),
            exclude_dirs,
        }
    }

    /// Tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `path` relative to the root, `/`-separated; `.` for the root itself.
    pub fn rel_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.as_os_str().is_empty() {
            return Some(".".to_string());
        }
        Some(
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }

    fn should_exclude(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components().any(|component| {
            let Component::Normal(name) = component else {
                return false;
            };
            let name = name.to_string_lossy();
            self.exclude_dirs.iter().any(|pattern| match pattern.strip_prefix('*') {
                Some(suffix) => name.ends_with(suffix),
                None => name == pattern.as_str(),
            })
        })
    }

    fn walk<'a>(&'a self, dir: &Path) -> impl Iterator<Item = DirEntry> + 'a {
        WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !self.should_exclude(e.path()))
            .filter_map(Result::ok)
    }

    fn walk_files<'a>(&'a self, dir: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        self.walk(dir)
            .filter(|e| e.file_type().is_file())
            .map(DirEntry::into_path)
    }

    // ------------------------------------------------------------------------
    // Class and package lookups
    // ------------------------------------------------------------------------

    /// Java/Kotlin files named `class_name`; dotted names are treated as
    /// fully qualified.
    pub fn find_class_files(&self, search_dir: &Path, class_name: &str) -> Vec<PathBuf> {
        if class_name.contains('.') {
            return self.find_qualified_class_files(search_dir, class_name);
        }
        if !search_dir.is_dir() {
            debug!(dir = %search_dir.display(), "search dir does not exist");
            return Vec::new();
        }
        let found: Vec<PathBuf> = self
            .walk_files(search_dir)
            .filter(|path| {
                path.file_stem().is_some_and(|stem| stem == class_name)
                    && crate::source::is_java_file(path)
            })
            .collect();
        trace!(class = class_name, count = found.len(), "class file search");
        found
    }

    /// Java/Kotlin files whose path ends with `a/b/Class.java` for `a.b.Class`.
    pub fn find_qualified_class_files(&self, search_dir: &Path, fqcn: &str) -> Vec<PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        let suffix = fqcn.replace('.', "/");
        self.walk_files(search_dir)
            .filter(|path| crate::source::is_java_file(path))
            .filter(|path| {
                let without_ext = path.with_extension("");
                ends_with_components(&without_ext, &suffix)
            })
            .collect()
    }

    /// C++ test files (`*test*.cc|cpp`) declaring a gtest for `class_name`.
    pub fn find_cc_class_files(&self, search_dir: &Path, class_name: &str) -> Vec<PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        self.walk_files(search_dir)
            .filter(|path| crate::source::is_cc_file(path) && self.is_cc_test_file_name(path))
            .filter(|path| {
                fs::read_to_string(path)
                    .map(|content| content.lines().any(|l| declares_cc_class(l, class_name)))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Directories whose path ends with the package path (`a.b` → `a/b`).
    pub fn find_package_dirs(&self, search_dir: &Path, package: &str) -> Vec<PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        let suffix = package.replace('.', "/");
        self.walk(search_dir)
            .filter(|e| e.file_type().is_dir())
            .map(DirEntry::into_path)
            .filter(|path| ends_with_components(path, &suffix))
            .collect()
    }

    /// Files whose path ends with `/<name>.xml`.
    pub fn find_xml_by_name(&self, search_dir: &Path, name: &str) -> Vec<PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        let suffix = format!("{name}.xml");
        self.walk_files(search_dir)
            .filter(|path| ends_with_components(path, &suffix))
            .collect()
    }

    /// Every file under `search_dir` with the given extension.
    pub fn find_files_with_extension(&self, search_dir: &Path, ext: &str) -> Vec<PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        self.walk_files(search_dir)
            .filter(|path| path.extension().is_some_and(|e| e == ext))
            .collect()
    }

    /// Every directory under `search_dir`, including itself.
    pub fn find_dirs(&self, search_dir: &Path) -> Vec<PathBuf> {
        self.walk(search_dir)
            .filter(|e| e.file_type().is_dir())
            .map(DirEntry::into_path)
            .collect()
    }

    fn is_cc_test_file_name(&self, path: &Path) -> bool {
        let rel = self.rel_path(path).unwrap_or_default().to_ascii_lowercase();
        rel.contains("test")
    }

    // ------------------------------------------------------------------------
    // Module directories
    // ------------------------------------------------------------------------

    /// Walk up from `start_dir` to the root looking for a testable module dir.
    ///
    /// A directory qualifies when it holds `AndroidTest.xml` and a module, or
    /// a module there is a legacy Robolectric test or declares a test config.
    /// Auto-generated config dirs are remembered and returned only if nothing
    /// better is found further up.
    pub fn find_parent_module_dir(&self, start_dir: &Path, index: &ModuleIndex) -> Option<String> {
        if !start_dir.is_dir() || !start_dir.starts_with(&self.root) {
            debug!(dir = %start_dir.display(), "not a directory inside the tree");
            return None;
        }
        let mut auto_gen_dir = None;
        let mut current = start_dir.to_path_buf();
        while current != self.root {
            let rel_dir = self.rel_path(&current)?;
            let modules = index.get_module_names(&rel_dir);
            if current.join(MODULE_CONFIG).is_file() && !modules.is_empty() {
                return Some(rel_dir);
            }
            for name in &modules {
                let Some(record) = index.get_module_info(name) else {
                    continue;
                };
                if index.is_legacy_robolectric_class(record) {
                    return Some(rel_dir);
                }
                if record.test_config.iter().any(|c| !c.is_empty()) {
                    return Some(rel_dir);
                }
                if record.auto_test_config {
                    auto_gen_dir = Some(rel_dir.clone());
                }
            }
            if !current.pop() {
                break;
            }
        }
        auto_gen_dir
    }

    /// Nearest directory holding `.git` between `path` and the root.
    pub fn git_root(&self, path: &Path) -> PathBuf {
        let mut current = path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            if dir.join(".git").is_dir() {
                return dir;
            }
            current = dir.parent().map(Path::to_path_buf);
        }
        self.root.clone()
    }
}

/// Host unit tests whose path starts with `rel_path`; `.` means all.
pub fn host_unit_tests_under(index: &ModuleIndex, rel_path: &str) -> BTreeSet<String> {
    let all = index.get_all_host_unit_tests();
    if rel_path == "." {
        return all;
    }
    all.into_iter()
        .filter(|name| {
            index.get_paths(name).iter().any(|p| {
                p.strip_prefix(rel_path)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
        })
        .collect()
}

fn ends_with_components(path: &Path, suffix: &str) -> bool {
    let path = path.to_string_lossy();
    let path = path.replace('\\', "/");
    path == suffix || path.ends_with(&format!("/{suffix}"))
}

/// True for `TEST_F(ClassName, ...` style declarations of `class_name`.
fn declares_cc_class(line: &str, class_name: &str) -> bool {
    let line = line.trim_start();
    let Some(rest) = CC_TEST_MACROS
        .iter()
        .find_map(|m| line.strip_prefix(m))
    else {
        return false;
    };
    let rest = rest.trim_start();
    let Some(rest) = rest.strip_prefix('(') else {
        return false;
    };
    rest.strip_prefix(class_name)
        .is_some_and(|after| after.starts_with(','))
}

// ============================================================================
// Tests
// ============================================================================
