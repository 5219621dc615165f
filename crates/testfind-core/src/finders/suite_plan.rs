//! Compatibility suite plans.
//!
//! A plan is an XML config shipped with a suite harness, e.g.
//! `test/suite_harness/tools/cts-tradefed/res/config/cts.xml`. Plan dirs are
//! the `res/config` dirs of every `*-tradefed` module plus any configured
//! extras. The suite is read from the `<suite>-tradefed` path component.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::FinderResult;
use crate::interaction::extract_selected;
use crate::reference::split_methods;
use crate::types::{RunnerKind, TestDescriptor};

use super::integration::int_dir_from_path;
use super::FinderContext;

const TRADEFED_SUFFIX: &str = "-tradefed";
const PLAN_SUBDIR: &str = "res/config";

static SUITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|/)(?P<suite>[\w-]+?)-tradefed/res/config/").unwrap());

/// Plan dirs relative to the root, harness dirs first.
pub fn suite_plan_dirs(ctx: &FinderContext<'_>) -> Vec<String> {
    let root = ctx.root();
    let mut dirs: Vec<String> = ctx
        .index
        .records()
        .filter(|(name, _)| name.ends_with(TRADEFED_SUFFIX))
        .flat_map(|(_, record)| record.path.iter())
        .map(|path| format!("{}/{PLAN_SUBDIR}", path.trim_end_matches('/')))
        .filter(|dir| root.join(dir).is_dir())
        .collect();
    for extra in &ctx.options.suite_plan_dirs {
        if !dirs.contains(extra) {
            dirs.push(extra.clone());
        }
    }
    dirs.dedup();
    dirs
}

/// A plan by name, e.g. `cts`.
pub fn find_by_suite_name(name: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
    let root = ctx.root();
    let mut candidates = Vec::new();
    for dir in suite_plan_dirs(ctx) {
        candidates.extend(ctx.search.find_xml_by_name(&root.join(dir), name));
    }
    let selected = extract_selected(
        candidates.iter().map(|p| p.to_string_lossy().into_owned()),
        ctx.adapter,
        false,
    )?;
    Ok(selected
        .iter()
        .filter_map(|path| descriptor(Path::new(path), Some(name), ctx))
        .collect())
}

/// A plan by file path.
pub fn find_by_suite_path(reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
    let (path_part, _) = split_methods(reference)?;
    let path = ctx.absolute(&path_part);
    if int_dir_from_path(&path, &suite_plan_dirs(ctx), ctx.root()).is_none() {
        return Ok(Vec::new());
    }
    Ok(descriptor(&path, None, ctx).into_iter().collect())
}

/// Suite owning a plan path; `None` outside any `<suite>-tradefed` harness.
pub fn suite_of_plan(rel_path: &str) -> Option<String> {
    SUITE_RE
        .captures(rel_path)
        .map(|caps| caps["suite"].to_string())
}

fn descriptor(path: &Path, name: Option<&str>, ctx: &FinderContext<'_>) -> Option<TestDescriptor> {
    let rel_config = ctx.search.rel_path(path)?;
    let Some(suite) = suite_of_plan(&rel_config) else {
        debug!(config = %rel_config, "plan is not under a suite harness");
        return None;
    };
    let name = match name {
        Some(name) => name.to_string(),
        None => plan_stem(path)?,
    };
    let mut test = TestDescriptor::new(name, rel_config);
    test.runner = RunnerKind::SuitePlan;
    test.compatibility_suites.insert(suite.clone());
    test.add_build_target(format!("{suite}{TRADEFED_SUFFIX}"));
    Some(test)
}

fn plan_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}
