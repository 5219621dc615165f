//! Batch resolution.
//!
//! The resolver drives the finder chain over a list of references and does
//! the bookkeeping around it:
//!
//! 1. Wildcard references (`Foo*Tests`) expand to every matching testable
//!    module.
//! 2. Mainline references are checked against the index before any finder
//!    runs.
//! 3. Found descriptors get the module's installed dependencies and, for
//!    mainline references, their mainline modules.
//! 4. References nothing matched fall back to fuzzy suggestions.
//! 5. New resolutions are written to the cache once the batch is done.
//!
//! References are handled strictly in order; a "did you mean" prompt for
//! one reference blocks the next.

use std::collections::{BTreeMap, BTreeSet};

use globset::Glob;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::FinderChain;
use crate::classifier::InterpretationKind;
use crate::error::TestfindError;
use crate::finders::{module, FinderContext};
use crate::fuzzy::FuzzyMatcher;
use crate::reference::parse_test_identifier;
use crate::search;
use crate::test_mapping::TestMappingEntry;
use crate::types::TestDescriptor;

/// Suggestions listed when several modules are close.
pub const MAX_SUGGESTIONS: usize = 10;

/// Fuzzy fallback is skipped for references that cannot be module names.
const NON_MODULE_CHARS: &[char] = &['#', ':', '/'];

/// Fuzzy candidates must be within this length of the input.
const FUZZY_LENGTH_RANGE: usize = 2;

// ============================================================================
// Outcome
// ============================================================================

/// Tests found for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    /// The reference as resolved; a confirmed fuzzy guess replaces the input.
    pub reference: String,
    pub finders: Vec<String>,
    pub tests: Vec<TestDescriptor>,
}

/// Result of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub resolved: Vec<ResolvedReference>,
    /// References nothing matched.
    pub unresolved: Vec<String>,
    /// Module names offered for the unresolved references.
    pub suggestions: Vec<String>,
}

impl BatchOutcome {
    /// Every descriptor, in reference order.
    pub fn tests(&self) -> impl Iterator<Item = &TestDescriptor> {
        self.resolved.iter().flat_map(|r| r.tests.iter())
    }

    /// Union of all build targets.
    pub fn build_targets(&self) -> BTreeSet<String> {
        self.tests()
            .flat_map(|t| t.build_targets.iter().cloned())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves batches of references with one chain and one context.
pub struct Resolver<'a> {
    chain: &'a FinderChain,
    ctx: FinderContext<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(chain: &'a FinderChain, ctx: FinderContext<'a>) -> Self {
        Resolver { chain, ctx }
    }

    pub fn context(&self) -> &FinderContext<'a> {
        &self.ctx
    }

    /// Resolve user references.
    ///
    /// # Errors
    ///
    /// - `InvalidReference` for malformed references.
    /// - `SelectionCancelled` when the user quits a selection menu.
    /// - `MixedFilterTypes` when one test ends up with both wildcard and
    ///   literal filters.
    pub fn resolve_batch<S: AsRef<str>>(&self, references: &[S]) -> Result<BatchOutcome, TestfindError> {
        let mut outcome = BatchOutcome::default();
        let mut to_cache: Vec<(String, Vec<TestDescriptor>)> = Vec::new();

        for reference in self.expand_wildcards(references)? {
            match self.resolve_reference(&reference)? {
                Some(resolved) => {
                    if !resolved.finders.iter().any(|f| f == InterpretationKind::Cache.name()) {
                        to_cache.push((reference.clone(), resolved.tests.clone()));
                    }
                    outcome.resolved.push(resolved);
                }
                None => match self.fuzzy_fallback(&reference)? {
                    Fallback::Resolved(resolved) => outcome.resolved.push(resolved),
                    Fallback::Suggestions(suggestions) => {
                        outcome.unresolved.push(reference);
                        for suggestion in suggestions {
                            if !outcome.suggestions.contains(&suggestion) {
                                outcome.suggestions.push(suggestion);
                            }
                        }
                    }
                },
            }
        }

        check_filter_types(&outcome)?;
        self.store(&to_cache);
        Ok(outcome)
    }

    /// Resolve TEST_MAPPING entries by name, without classification.
    ///
    /// Options and the host flag are attached to every descriptor; nothing
    /// is cached.
    pub fn resolve_entries(&self, entries: &[TestMappingEntry]) -> Result<BatchOutcome, TestfindError> {
        let mut outcome = BatchOutcome::default();
        for entry in entries {
            let (finder, mut tests) = self.find_entry(&entry.name)?;
            if tests.is_empty() {
                warn!(test = %entry.name, "test mapping entry not found");
                outcome.unresolved.push(entry.name.clone());
                continue;
            }
            for test in &mut tests {
                self.add_install_dependencies(test);
                test.module_args = entry.module_args();
                test.host = entry.host;
                test.from_test_mapping = true;
                test.finder = finder.to_string();
            }
            outcome.resolved.push(ResolvedReference {
                reference: entry.name.clone(),
                finders: vec![finder.to_string()],
                tests,
            });
        }
        check_filter_types(&outcome)?;
        Ok(outcome)
    }

    /// Host unit tests under `dir`, relative to the working directory.
    pub fn host_unit_tests(&self, dir: &str) -> BTreeSet<String> {
        let path = self.ctx.absolute(dir);
        let Some(rel) = self.ctx.search.rel_path(&path) else {
            debug!(dir, "directory is outside the source tree");
            return BTreeSet::new();
        };
        search::host_unit_tests_under(self.ctx.index, &rel)
    }

    /// Testable modules close to `input`, closest first.
    pub fn suggest(&self, input: &str) -> Vec<String> {
        let matcher = FuzzyMatcher::new(self.ctx.options.fuzzy_profile, self.ctx.options.max_distance);
        matcher
            .rank(input, self.ctx.index.get_testable_modules(None), FUZZY_LENGTH_RANGE)
            .into_iter()
            .filter(|c| c.distance <= self.ctx.options.max_distance)
            .map(|c| c.module_name)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Per reference
    // ------------------------------------------------------------------------

    fn resolve_reference(&self, reference: &str) -> Result<Option<ResolvedReference>, TestfindError> {
        let identifier = parse_test_identifier(reference);
        if identifier.has_mainline_modules() && !self.verify_mainline(reference) {
            return Ok(None);
        }
        let resolution = self.chain.resolve(reference, &self.ctx)?;
        if resolution.is_empty() {
            return Ok(None);
        }
        let mut tests = resolution.tests;
        for test in &mut tests {
            self.add_install_dependencies(test);
            if identifier.has_mainline_modules() {
                test.rename(reference);
                test.mainline_modules = identifier.module_names.iter().cloned().collect();
            }
        }
        Ok(Some(ResolvedReference {
            reference: reference.to_string(),
            finders: resolution.finders,
            tests,
        }))
    }

    /// `test[a.apk+b.apex]` needs the test, every mainline module, and the
    /// exact combination declared by the test.
    fn verify_mainline(&self, reference: &str) -> bool {
        let identifier = parse_test_identifier(reference);
        let index = self.ctx.index;
        if !index.is_module(&identifier.test_name) {
            warn!(reference, test = %identifier.test_name, "mainline test is not a module");
            return false;
        }
        if let Some(missing) = identifier.module_names.iter().find(|m| !index.is_module(m)) {
            warn!(reference, module = %missing, "mainline module is not a module");
            return false;
        }
        let binaries = identifier.joined_binaries();
        if !index.has_mainline_modules(&identifier.test_name, &binaries) {
            warn!(
                reference,
                mainline_modules = %binaries,
                "test does not declare these mainline modules"
            );
            return false;
        }
        true
    }

    fn fuzzy_fallback(&self, reference: &str) -> Result<Fallback, TestfindError> {
        if !self.ctx.options.fuzzy || reference.contains(NON_MODULE_CHARS) {
            return Ok(Fallback::Suggestions(Vec::new()));
        }
        let mut candidates = self.suggest(reference);
        match candidates.len() {
            0 => Ok(Fallback::Suggestions(Vec::new())),
            1 => {
                let guess = candidates.remove(0);
                let adapter = self.ctx.adapter;
                if adapter.ask_confirm(&format!("Did you mean {guess}?"), adapter.is_interactive())? {
                    if let Some(resolved) = self.resolve_reference(&guess)? {
                        info!(reference, guess = %guess, "resolved through fuzzy match");
                        return Ok(Fallback::Resolved(resolved));
                    }
                }
                Ok(Fallback::Suggestions(vec![guess]))
            }
            _ => {
                candidates.truncate(MAX_SUGGESTIONS);
                self.ctx.adapter.print_info(&format!(
                    "Did you mean the following modules?\n{}",
                    candidates.join("\n")
                ));
                Ok(Fallback::Suggestions(candidates))
            }
        }
    }

    fn find_entry(&self, name: &str) -> Result<(&'static str, Vec<TestDescriptor>), TestfindError> {
        let tests = module::find_by_module_name(name, &self.ctx)?;
        if !tests.is_empty() {
            return Ok((InterpretationKind::Module.name(), tests));
        }
        let tests = module::find_by_config_name(name, &self.ctx)?;
        Ok((InterpretationKind::Config.name(), tests))
    }

    fn add_install_dependencies(&self, test: &mut TestDescriptor) {
        let module_name = if test.raw_test_name.is_empty() {
            test.test_name.clone()
        } else {
            test.raw_test_name.clone()
        };
        let index = self.ctx.index;
        for dep in index.get_install_module_dependency(&module_name) {
            if index.is_module(&dep) {
                test.add_build_target(dep);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Batch helpers
    // ------------------------------------------------------------------------

    fn expand_wildcards<S: AsRef<str>>(&self, references: &[S]) -> Result<Vec<String>, TestfindError> {
        let mut expanded = Vec::new();
        for reference in references.iter().map(AsRef::as_ref) {
            if !reference.contains(['*', '?']) || reference.contains(NON_MODULE_CHARS) {
                expanded.push(reference.to_string());
                continue;
            }
            let matcher = Glob::new(reference)
                .map_err(|err| TestfindError::invalid_args(format!("bad pattern `{reference}`: {err}")))?
                .compile_matcher();
            let matches: Vec<String> = self
                .ctx
                .index
                .get_testable_modules(None)
                .into_iter()
                .filter(|name| matcher.is_match(name))
                .collect();
            debug!(pattern = reference, count = matches.len(), "expanded wildcard");
            if matches.is_empty() {
                expanded.push(reference.to_string());
            } else {
                expanded.extend(matches);
            }
        }
        Ok(expanded)
    }

    fn store(&self, results: &[(String, Vec<TestDescriptor>)]) {
        let Some(cache) = self.ctx.cache.filter(|_| self.ctx.options.use_cache) else {
            return;
        };
        for (reference, tests) in results {
            if tests.iter().any(|t| t.from_test_mapping) {
                continue;
            }
            if let Err(err) = cache.store_result(reference, tests) {
                warn!(reference = %reference, error = %err, "cannot store cache entry");
            }
        }
    }
}

enum Fallback {
    Resolved(ResolvedReference),
    Suggestions(Vec<String>),
}

/// One test must not mix wildcard and literal filters.
fn check_filter_types(outcome: &BatchOutcome) -> Result<(), TestfindError> {
    let mut kinds_by_test: BTreeMap<&str, BTreeSet<_>> = BTreeMap::new();
    for test in outcome.tests() {
        kinds_by_test
            .entry(test.test_name.as_str())
            .or_default()
            .extend(test.filter_kinds());
    }
    match kinds_by_test.into_iter().find(|(_, kinds)| kinds.len() > 1) {
        Some((test_name, _)) => Err(TestfindError::MixedFilterTypes {
            test_name: test_name.to_string(),
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================
