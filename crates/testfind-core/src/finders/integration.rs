//! Tradefed integration configs.
//!
//! Integration tests are plain XML configs under a fixed set of directories
//! (`integration_dirs`), run by the harness itself instead of a module. They
//! are referenced by config name (`native-benchmark`, `dir/name`), optionally
//! with a class filter (`name:com.example.Cls#m`), or by file path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FinderResult;
use crate::interaction::extract_selected;
use crate::reference::{parse_module_reference, split_methods};
use crate::source;
use crate::test_config::ConfigDocument;
use crate::types::{TestDescriptor, TestFilter};

use super::FinderContext;

/// Target that builds the whole harness.
pub const TRADEFED_TARGET: &str = "tradefed-all";

/// An integration config by name, with an optional `:class#methods` filter.
pub fn find_by_integration_name(
    reference: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (name, class_ref) = match parse_module_reference(reference) {
        Some(parsed) if parsed.method_name.is_empty() => (parsed.module_name, Some(parsed.pkg_class_name)),
        Some(parsed) => (
            parsed.module_name,
            Some(format!("{}#{}", parsed.pkg_class_name, parsed.method_name)),
        ),
        None => (reference.to_string(), None),
    };

    let root = ctx.root();
    let mut candidates = Vec::new();
    for dir in &ctx.options.integration_dirs {
        candidates.extend(ctx.search.find_xml_by_name(&root.join(dir), &name));
    }
    let selected = extract_selected(
        candidates.iter().map(|p| p.to_string_lossy().into_owned()),
        ctx.adapter,
        false,
    )?;

    let filters = match class_ref {
        Some(class_ref) => match class_filters(&class_ref, ctx)? {
            Some(filters) => filters,
            None => return Ok(Vec::new()),
        },
        None => BTreeSet::new(),
    };

    let mut found = Vec::new();
    for path in selected.iter().map(PathBuf::from) {
        let Some(test) = descriptor(&name, &path, ctx) else {
            return Ok(Vec::new());
        };
        found.push(test.with_filters(filters.clone()));
    }
    Ok(found)
}

/// An integration config by its file path.
///
/// The test is named by the path below its integration dir, without `.xml`.
pub fn find_by_integration_path(
    reference: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (path_part, _) = split_methods(reference)?;
    let path = ctx.absolute(&path_part);
    let Some(int_dir) = int_dir_from_path(&path, &ctx.options.integration_dirs, ctx.root()) else {
        return Ok(Vec::new());
    };
    let Ok(rel) = path.with_extension("").strip_prefix(&int_dir).map(Path::to_path_buf) else {
        return Ok(Vec::new());
    };
    let name = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(descriptor(&name, &path, ctx).into_iter().collect())
}

/// The configured dir holding `path`, which must be an existing file.
///
/// Whole directories are not runnable, so a directory yields `None` even
/// inside an integration dir.
pub fn int_dir_from_path(path: &Path, int_dirs: &[String], root: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }
    if path.is_dir() {
        debug!(
            path = %path.display(),
            "referencing a whole integration or suite dir is not supported"
        );
        return None;
    }
    let dir = path.parent()?;
    int_dirs
        .iter()
        .map(|d| root.join(d))
        .find(|int_dir| dir.starts_with(int_dir))
}

fn descriptor(name: &str, path: &Path, ctx: &FinderContext<'_>) -> Option<TestDescriptor> {
    if ConfigDocument::load_lenient(path).is_none() {
        debug!(path = %path.display(), "not a loadable integration config");
        return None;
    }
    let rel_config = ctx.search.rel_path(path)?;
    let mut test = TestDescriptor::new(name, rel_config);
    test.add_build_target(TRADEFED_TARGET);
    Some(test)
}

/// Filters for `Class#methods`; a bare class name is looked up in the tree
/// and expanded to every matching fully qualified name.
fn class_filters(class_ref: &str, ctx: &FinderContext<'_>) -> FinderResult<Option<BTreeSet<TestFilter>>> {
    let (class_name, methods) = split_methods(class_ref)?;
    if class_name.contains('.') {
        return Ok(Some(BTreeSet::from([TestFilter::new(class_name, methods)])));
    }
    debug!(class = %class_name, "looking up the fully qualified class name");
    let paths = ctx.search.find_class_files(ctx.root(), &class_name);
    if paths.is_empty() {
        return Ok(None);
    }
    let mut filters = BTreeSet::new();
    for path in paths {
        let fqcn = source::fully_qualified_class_name(&path)?;
        filters.insert(TestFilter::new(fqcn, methods.iter().cloned()));
    }
    Ok(Some(filters))
}
