//! Module-based finders.
//!
//! Every strategy here ends in the same place: a set of (module, config,
//! filters) triples handed to the synthesizer. They differ in how they get
//! there:
//!
//! - module, mainline: the name is the module
//! - class, cc class, package: search the tree, then map files back to the
//!   modules owning them
//! - `module:class`, `module:package`: resolve the module first, then search
//!   only under its config dir
//! - path: walk up from the path to the nearest module dir
//! - config: match a module's extra config by file name

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ConfigMode;
use crate::error::{FinderError, FinderResult};
use crate::filter::{self, FilterHint};
use crate::interaction::{extract_selected, InteractionError};
use crate::reference::{parse_module_reference, split_methods};
use crate::search;
use crate::source;
use crate::synthesize::config_stem;
use crate::test_config;
use crate::types::{TestDescriptor, TestFilter, MODULE_CONFIG};

use super::FinderContext;

/// Build files never map to a single source-owning module.
const BUILD_FILES: &[&str] = &["Android.bp", "Android.mk"];

// ============================================================================
// Module names
// ============================================================================

/// A testable module, one descriptor per config it runs with.
pub fn find_by_module_name(
    module_name: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let Some(record) = ctx.index.get_module_info(module_name) else {
        return Ok(Vec::new());
    };
    if !ctx.index.is_testable_module(record) {
        debug!(module = module_name, "module is not testable");
        return Ok(Vec::new());
    }
    let Some(first_path) = record.first_path() else {
        return Ok(Vec::new());
    };
    let default_config = join_rel(first_path, MODULE_CONFIG);
    let synth = ctx.synthesizer();
    let mut found = Vec::new();
    for rel_config in module_test_configs(module_name, Some(&default_config), ctx)? {
        let base = synth.base(module_name, &rel_config, BTreeSet::new());
        found.extend(synth.synthesize(base));
    }
    Ok(found)
}

/// A module pinned to mainline modules; the suffix is already stripped.
pub fn find_by_mainline_module(
    test_name: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    find_by_module_name(test_name, ctx)
}

/// Configs `module_name` runs with.
///
/// Several declared configs either all run, or one is picked, per the
/// configured mode. A module without declared configs runs with
/// `rel_config` if given.
pub fn module_test_configs(
    module_name: &str,
    rel_config: Option<&str>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<String>> {
    let declared: Vec<String> = ctx
        .index
        .get_module_info(module_name)
        .map(|record| record.test_config.clone())
        .unwrap_or_default();
    match declared.len() {
        0 => {}
        1 => return Ok(declared),
        _ => match ctx.options.config_mode {
            ConfigMode::All => return extract_selected(declared, ctx.adapter, true),
            ConfigMode::One => {
                let options: Vec<&str> = declared.iter().map(String::as_str).collect();
                let choice = ctx
                    .adapter
                    .ask_select(&format!("Select a config for {module_name}"), &options)?;
                let Some(config) = declared.get(choice) else {
                    return Err(InteractionError::InvalidInput(format!("no config numbered {choice}")).into());
                };
                debug!(module = module_name, config = %config, "selected config");
                return Ok(vec![config.clone()]);
            }
        },
    }
    Ok(rel_config.map(|c| vec![c.to_string()]).unwrap_or_default())
}

// ============================================================================
// Classes
// ============================================================================

/// A Java/Kotlin (or, with `is_native`, gtest) class, optionally `#methods`.
///
/// With a config the search is limited to the config's directory first;
/// the whole tree is searched only when that finds nothing. A module whose
/// tree holds no matching file still yields a descriptor filtered on the
/// class name.
pub fn find_by_class_name(
    class_ref: &str,
    module_name: Option<&str>,
    rel_config: Option<&str>,
    is_native: bool,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (class_name, methods) = split_methods(class_ref)?;
    let search_name = class_name.rsplit('/').next().unwrap_or(&class_name);
    let root = ctx.root();
    let search_dir = rel_config
        .and_then(|c| Path::new(c).parent())
        .map(|dir| root.join(dir))
        .unwrap_or_else(|| root.to_path_buf());

    let mut paths = class_files(&search_dir, search_name, is_native, &methods, ctx)?;
    if paths.is_empty() && rel_config.is_some() {
        info!(
            class = %class_name,
            dir = %search_dir.display(),
            "class not under the config dir, searching the whole tree"
        );
        paths = class_files(root, search_name, is_native, &methods, ctx)?;
    }
    if paths.is_empty() {
        let Some(module_name) = module_name else {
            return Ok(Vec::new());
        };
        paths = ctx
            .index
            .get_paths(module_name)
            .iter()
            .map(|p| root.join(p))
            .collect();
    }

    let mut found = Vec::new();
    for path in paths {
        let hint = FilterHint {
            class_name: Some(&class_name),
            is_native,
            module_dir: None,
        };
        let filters = filter::filters_for_path(&path, &methods, hint)?;
        let mut tests = test_infos(&path, rel_config, module_name, &filters, ctx)?;
        if tests.len() > 1 && !methods.is_empty() {
            tests = matched_by_annotation(tests, &methods, ctx);
        }
        found.extend(tests);
    }
    Ok(found)
}

/// `module:class[#methods]`, tried as JVM, kernel and gtest class in turn.
pub fn find_by_module_and_class(
    reference: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let Some(parsed) = parse_module_reference(reference) else {
        return Ok(Vec::new());
    };
    let mut class_ref = parsed.pkg_class_name.clone();
    if !parsed.method_name.is_empty() {
        class_ref = format!("{class_ref}#{}", parsed.method_name);
    }
    let Some(module_test) = find_by_module_name(&parsed.module_name, ctx)?.into_iter().next() else {
        return Ok(Vec::new());
    };
    let module_name = parsed.module_name.as_str();
    let rel_config = module_test.config_path.as_str();
    let is_native = ctx.index.is_native_test(module_name);

    let found = find_by_class_name(&class_ref, Some(module_name), Some(rel_config), is_native, ctx)?;
    if !found.is_empty() {
        return Ok(found);
    }
    let found = find_by_kernel_class(module_name, &class_ref, ctx)?;
    if !found.is_empty() {
        return Ok(found);
    }
    find_by_cc_class(&class_ref, Some(module_name), Some(rel_config), ctx)
}

/// A gtest class; `file.Class` drops everything up to the last dot.
pub fn find_by_cc_class(
    class_ref: &str,
    module_name: Option<&str>,
    rel_config: Option<&str>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (class_part, methods_part) = match class_ref.split_once('#') {
        Some((class, methods)) => (class, Some(methods)),
        None => (class_ref, None),
    };
    let class_part = class_part.rsplit('.').next().unwrap_or(class_part);
    let class_ref = match methods_part {
        Some(methods) => format!("{class_part}#{methods}"),
        None => class_part.to_string(),
    };
    find_by_class_name(&class_ref, module_name, rel_config, true, ctx)
}

/// A kernel test selected by the `test-command-line` key of its config.
pub fn find_by_kernel_class(
    module_name: &str,
    class_ref: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (class_name, methods) = split_methods(class_ref)?;
    let synth = ctx.synthesizer();
    let mut found = Vec::new();
    for rel_config in module_test_configs(module_name, None, ctx)? {
        if !test_config::is_kernel_test(&ctx.root().join(&rel_config), &class_name) {
            continue;
        }
        let filters = BTreeSet::from([TestFilter::new(class_name.clone(), methods.iter().cloned())]);
        found.extend(synth.synthesize(synth.base(module_name, &rel_config, filters)));
    }
    Ok(found)
}

fn class_files(
    search_dir: &Path,
    class_name: &str,
    is_native: bool,
    methods: &BTreeSet<String>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<PathBuf>> {
    let mut paths = if is_native {
        ctx.search.find_cc_class_files(search_dir, class_name)
    } else {
        ctx.search.find_class_files(search_dir, class_name)
    };
    if !methods.is_empty() {
        paths.retain(|p| source::has_method_in_file(p, methods, ctx.search));
    }
    let selected = extract_selected(
        paths.iter().map(|p| p.to_string_lossy().into_owned()),
        ctx.adapter,
        false,
    )?;
    Ok(selected.into_iter().map(PathBuf::from).collect())
}

// ============================================================================
// Packages
// ============================================================================

/// A dotted package; methods are rejected since a package has no methods.
pub fn find_by_package(
    package_ref: &str,
    module_name: Option<&str>,
    rel_config: Option<&str>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let (package, methods) = split_methods(package_ref)?;
    if !methods.is_empty() {
        return Err(FinderError::MethodWithoutClass {
            methods: methods.into_iter().collect::<Vec<_>>().join(","),
        });
    }
    let root = ctx.root();
    let search_dir = rel_config
        .and_then(|c| Path::new(c).parent())
        .map(|dir| root.join(dir))
        .unwrap_or_else(|| root.to_path_buf());

    let dirs = ctx.search.find_package_dirs(&search_dir, &package);
    let mut dirs: Vec<PathBuf> = extract_selected(
        dirs.iter().map(|p| p.to_string_lossy().into_owned()),
        ctx.adapter,
        false,
    )?
    .into_iter()
    .map(PathBuf::from)
    .collect();
    if dirs.is_empty() {
        let Some(module_name) = module_name else {
            return Ok(Vec::new());
        };
        dirs = ctx
            .index
            .get_paths(module_name)
            .iter()
            .map(|p| root.join(p))
            .collect();
    }

    let filters = BTreeSet::from([TestFilter::pattern_only(package)]);
    let mut found = Vec::new();
    for dir in dirs {
        found.extend(test_infos(&dir, rel_config, module_name, &filters, ctx)?);
    }
    Ok(found)
}

/// `module:package`.
pub fn find_by_module_and_package(
    reference: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let Some(parsed) = parse_module_reference(reference) else {
        return Ok(Vec::new());
    };
    let mut package_ref = parsed.pkg_class_name.clone();
    if !parsed.method_name.is_empty() {
        package_ref = format!("{package_ref}#{}", parsed.method_name);
    }
    let Some(module_test) = find_by_module_name(&parsed.module_name, ctx)?.into_iter().next() else {
        return Ok(Vec::new());
    };
    find_by_package(
        &package_ref,
        Some(&parsed.module_name),
        Some(&module_test.config_path),
        ctx,
    )
}

// ============================================================================
// Paths
// ============================================================================

/// A file or directory, optionally `file#methods`.
///
/// Outside any module dir, sources are mapped through the modules that
/// compile them or the host unit tests under them.
pub fn find_by_path(rel_path: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
    let (path_part, methods) = split_methods(rel_path)?;
    let path = ctx.absolute(&path_part);
    if !path.exists() {
        debug!(path = %path.display(), "path does not exist");
        return Ok(Vec::new());
    }
    if !methods.is_empty() && !source::has_method_in_file(&path, &methods, ctx.search) {
        debug!(path = %path.display(), ?methods, "methods not found in file");
        return Ok(Vec::new());
    }
    let Some(path_rel) = ctx.search.rel_path(&path) else {
        debug!(path = %path.display(), "path is outside the source tree");
        return Ok(Vec::new());
    };
    let dir_path = if path.is_dir() {
        path.clone()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let Some(rel_module_dir) = ctx.search.find_parent_module_dir(&dir_path, ctx.index) else {
        return find_by_unowned_path(&path, &path_rel, &methods, ctx);
    };
    let rel_config = join_rel(&rel_module_dir, MODULE_CONFIG);
    let module_dir = ctx.root().join(&rel_module_dir);
    let hint = FilterHint {
        module_dir: Some(&module_dir),
        ..FilterHint::default()
    };
    let filters = filter::filters_for_path(&path, &methods, hint)?;
    test_infos(&path, Some(&rel_config), None, &filters, ctx)
}

fn find_by_unowned_path(
    path: &Path,
    path_rel: &str,
    methods: &BTreeSet<String>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let compiling = ctx.index.get_modules_by_path_in_srcs(path_rel);
    let testable = ctx.index.get_modules_by_include_deps(&compiling, true);
    if !testable.is_empty() {
        debug!(path = path_rel, modules = ?testable, "path compiled into test dependencies");
        let filters = filter::filters_for_path(path, methods, FilterHint::default())?;
        let mut found = Vec::new();
        for module_name in &testable {
            let Some(first_path) = ctx.index.get_paths(module_name).first() else {
                continue;
            };
            let rel_config = join_rel(first_path, MODULE_CONFIG);
            found.extend(test_infos(path, Some(&rel_config), Some(module_name), &filters, ctx)?);
        }
        return Ok(found);
    }

    let unit_tests = search::host_unit_tests_under(ctx.index, path_rel);
    debug!(path = path_rel, tests = ?unit_tests, "falling back to host unit tests");
    let mut found = Vec::new();
    for module_name in &unit_tests {
        found.extend(test_infos(path, Some(MODULE_CONFIG), Some(module_name), &BTreeSet::new(), ctx)?);
    }
    Ok(found)
}

// ============================================================================
// Config names
// ============================================================================

/// An extra module config named `<name>.xml`.
pub fn find_by_config_name(name: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
    let synth = ctx.synthesizer();
    for (module_name, record) in ctx.index.records() {
        let Some(rel_config) = record.test_config.iter().find(|c| config_stem(c) == name) else {
            continue;
        };
        let mut test = TestDescriptor::new(name, rel_config.clone()).with_suites(&record.compatibility_suites);
        test.build_targets = synth.build_targets(module_name, rel_config);
        test.aggregate_metrics_result =
            test_config::need_aggregate_metrics_result(&ctx.root().join(rel_config), ctx.search);
        debug!(config = %rel_config, module = %module_name, "found test config");
        return Ok(vec![test]);
    }
    Ok(Vec::new())
}

// ============================================================================
// Shared resolution
// ============================================================================

/// Descriptors for the modules owning `path`, one per module config.
///
/// Without a config the nearest module dir above `path` supplies one.
/// Without a module every testable module at the config dir (and, for a
/// source file, every testable module compiling it) is a candidate.
pub fn test_infos(
    path: &Path,
    rel_config: Option<&str>,
    module_name: Option<&str>,
    filters: &BTreeSet<TestFilter>,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<TestDescriptor>> {
    let rel_config = match rel_config {
        Some(config) => config.to_string(),
        None => {
            let dir = path.parent().unwrap_or(path);
            let Some(module_dir) = ctx.search.find_parent_module_dir(dir, ctx.index) else {
                return Ok(Vec::new());
            };
            join_rel(&module_dir, MODULE_CONFIG)
        }
    };
    let modules = match module_name {
        Some(name) => vec![name.to_string()],
        None => modules_to_test(path, &rel_config, ctx)?,
    };

    let synth = ctx.synthesizer();
    let mut found = Vec::new();
    for module_name in &modules {
        for config in module_test_configs(module_name, Some(&rel_config), ctx)? {
            let base = synth.base(module_name, &config, filters.clone());
            found.extend(synth.synthesize(base));
        }
    }
    Ok(found)
}

fn modules_to_test(
    path: &Path,
    rel_config: &str,
    ctx: &FinderContext<'_>,
) -> FinderResult<Vec<String>> {
    let mut candidates = BTreeSet::new();
    if is_compartmented_source(path) {
        if let Some(path_rel) = ctx.search.rel_path(path) {
            candidates.extend(testable(ctx.index.get_modules_by_path_in_srcs(&path_rel), ctx));
        }
    }
    let config_dir = Path::new(rel_config)
        .parent()
        .map(|d| d.to_string_lossy().into_owned())
        .unwrap_or_default();
    candidates.extend(testable(ctx.index.get_modules_by_path(&config_dir), ctx));
    extract_selected(candidates, ctx.adapter, false)
}

fn testable<'a>(
    names: BTreeSet<String>,
    ctx: &FinderContext<'a>,
) -> impl Iterator<Item = String> + 'a {
    let index = ctx.index;
    names.into_iter().filter(move |name| {
        index
            .get_module_info(name)
            .is_some_and(|record| index.is_testable_module(record))
    })
}

/// A source file, not a directory or build file: it belongs to the modules
/// compiling it rather than to the directory.
fn is_compartmented_source(path: &Path) -> bool {
    path.is_file()
        && !path
            .file_name()
            .is_some_and(|name| BUILD_FILES.iter().any(|b| name == *b))
}

/// Keep only the descriptors whose config annotations select one of
/// `methods`.
///
/// Several modules often share one source file but run different subsets of
/// it through `include-annotation`/`exclude-annotation`. Descriptors whose
/// config restricts nothing are kept.
pub fn matched_by_annotation(
    tests: Vec<TestDescriptor>,
    methods: &BTreeSet<String>,
    ctx: &FinderContext<'_>,
) -> Vec<TestDescriptor> {
    let mut matched: Vec<TestDescriptor> = Vec::new();
    for test in tests {
        let Some((config, srcs)) = test_config::config_and_srcs(&test.test_name, ctx.index) else {
            continue;
        };
        let annotations = test_config::annotation_filters(&config);
        let keep = annotations.is_empty()
            || methods
                .iter()
                .any(|m| srcs_select_method(m, &srcs, &annotations, ctx.root()));
        if keep && !matched.contains(&test) {
            matched.push(test);
        }
    }
    debug!(count = matched.len(), "descriptors matching annotations");
    matched
}

fn srcs_select_method(
    method: &str,
    srcs: &[String],
    annotations: &test_config::AnnotationFilters,
    root: &Path,
) -> bool {
    srcs.iter().any(|src| {
        let Ok(content) = source::read_source(&root.join(src)) else {
            return false;
        };
        let mut selected: BTreeSet<String> = annotations
            .include
            .iter()
            .flat_map(|a| source::annotated_methods(a, &content))
            .collect();
        if !annotations.exclude.is_empty() {
            let excluded: BTreeSet<String> = annotations
                .exclude
                .iter()
                .flat_map(|a| source::annotated_methods(a, &content))
                .collect();
            selected = source::java_methods(&content)
                .difference(&excluded)
                .cloned()
                .collect();
        }
        selected.contains(method)
    })
}

fn join_rel(dir: &str, file: &str) -> String {
    if dir.is_empty() || dir == "." {
        return file.to_string();
    }
    format!("{}/{file}", dir.trim_end_matches('/'))
}

// ============================================================================
// Tests
// ============================================================================
