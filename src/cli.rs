//! CLI front door.
//!
//! Each `run_*` function implements one `tfind` subcommand and returns the
//! response to print. The caller (`main.rs`) parses flags, picks the
//! interaction adapter, and turns errors into JSON error responses and exit
//! codes.
//!
//! ## Workspace
//!
//! Commands that consult the source tree take a [`Workspace`]: the resolved
//! configuration, the module index loaded from module-info JSON, and the
//! source search rooted at the tree.
//!
//! ## Error Handling
//!
//! All functions return `Result<T, TestfindError>`. A batch with at least one
//! unresolved reference fails with `NoTestsFound`, carrying the fuzzy
//! suggestions, so that scripts can tell it apart from a successful run.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use testfind_core::cache::ResultCache;
use testfind_core::chain::FinderChain;
use testfind_core::classifier::classify;
use testfind_core::config::{CliOverrides, ResolveOptions, ResolvedConfig};
use testfind_core::error::TestfindError;
use testfind_core::finders::FinderContext;
use testfind_core::interaction::InteractionAdapter;
use testfind_core::module_index::ModuleIndex;
use testfind_core::output::{
    ClassifyResponse, FindResponse, HostUnitTestsResponse, SuggestResponse,
};
use testfind_core::resolver::{BatchOutcome, Resolver, MAX_SUGGESTIONS};
use testfind_core::search::SourceSearch;
use testfind_core::test_mapping::load_entries;

/// module-info JSON location relative to the root, unless `--module-info`
/// says otherwise.
pub const DEFAULT_MODULE_INFO: &str = "out/module-info.json";

// ============================================================================
// Workspace
// ============================================================================

/// A source tree ready for resolution.
pub struct Workspace {
    /// Directory relative references are resolved against.
    pub cwd: PathBuf,
    pub config: ResolvedConfig,
    pub index: ModuleIndex,
    pub search: SourceSearch,
}

impl Workspace {
    /// Load configuration and the module index of the tree at `root`.
    ///
    /// # Errors
    ///
    /// - `Config` for an unreadable config file or bad environment values.
    /// - `ModuleIndex` when the module-info file is missing or malformed.
    pub fn open(
        root: &Path,
        cwd: &Path,
        module_info: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self, TestfindError> {
        let config = ResolvedConfig::resolve(root, overrides)?;
        let index_file = module_info
            .map(|path| cwd.join(path))
            .unwrap_or_else(|| root.join(DEFAULT_MODULE_INFO));
        let index = ModuleIndex::load(root, &index_file)?;
        let search = SourceSearch::new(root, &config.config.search.exclude_dirs);
        debug!(
            root = %root.display(),
            cache = %config.cache_dir.value.display(),
            "opened workspace"
        );
        Ok(Workspace {
            cwd: cwd.to_path_buf(),
            config,
            index,
            search,
        })
    }

    pub fn options(&self) -> ResolveOptions {
        self.config.resolve_options()
    }

    pub fn cache(&self) -> ResultCache {
        ResultCache::new(self.config.cache_dir.value.clone())
    }

    /// Finder context over this workspace.
    pub fn context<'a>(
        &'a self,
        adapter: &'a dyn InteractionAdapter,
        options: &'a ResolveOptions,
        cache: Option<&'a ResultCache>,
    ) -> FinderContext<'a> {
        FinderContext {
            index: &self.index,
            search: &self.search,
            adapter,
            options,
            cache: cache.filter(|_| options.use_cache),
            cwd: &self.cwd,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Arguments of `tfind find`.
#[derive(Debug, Clone, Default)]
pub struct FindArgs {
    pub references: Vec<String>,
    /// Drop cached resolutions of these references first.
    pub clear_cache: bool,
}

/// Resolve references into tests.
///
/// # Errors
///
/// - `InvalidArguments` when no reference is given.
/// - `NoTestsFound` when any reference stays unresolved.
/// - Whatever the batch fails with (malformed references, cancelled
///   selections, mixed filter types).
pub fn run_find(
    workspace: &Workspace,
    args: &FindArgs,
    adapter: &dyn InteractionAdapter,
) -> Result<FindResponse, TestfindError> {
    if args.references.is_empty() {
        return Err(TestfindError::invalid_args("no test references given"));
    }
    let cache = workspace.cache();
    if args.clear_cache {
        cache.clear(args.references.iter().map(String::as_str))?;
        info!(count = args.references.len(), "cleared cached resolutions");
    }
    let options = workspace.options();
    let chain = FinderChain::new();
    let resolver = Resolver::new(&chain, workspace.context(adapter, &options, Some(&cache)));
    let outcome = resolver.resolve_batch(&args.references)?;
    complete(outcome).map(|outcome| FindResponse::from_outcome(&outcome))
}

/// Resolve a TEST_MAPPING entry list.
///
/// # Errors
///
/// - `InvalidArguments` for a malformed entry file.
/// - `NoTestsFound` when an entry names nothing known.
pub fn run_entries(
    workspace: &Workspace,
    file: &Path,
    adapter: &dyn InteractionAdapter,
) -> Result<FindResponse, TestfindError> {
    let entries = load_entries(&workspace.cwd.join(file))?;
    let options = workspace.options();
    let chain = FinderChain::new();
    let resolver = Resolver::new(&chain, workspace.context(adapter, &options, None));
    let outcome = resolver.resolve_entries(&entries)?;
    complete(outcome).map(|outcome| FindResponse::from_outcome(&outcome))
}

/// Testable modules close to `input`.
pub fn run_suggest(
    workspace: &Workspace,
    input: &str,
    adapter: &dyn InteractionAdapter,
) -> SuggestResponse {
    let options = workspace.options();
    let chain = FinderChain::new();
    let resolver = Resolver::new(&chain, workspace.context(adapter, &options, None));
    let mut suggestions = resolver.suggest(input);
    suggestions.truncate(MAX_SUGGESTIONS);
    SuggestResponse::new(input, suggestions)
}

/// Interpretations a reference could have, without touching the tree.
pub fn run_classify(reference: &str) -> ClassifyResponse {
    ClassifyResponse::new(reference, classify(reference))
}

/// Host unit tests under a directory (the working directory by default).
pub fn run_host_unit_tests(
    workspace: &Workspace,
    dir: Option<&str>,
    adapter: &dyn InteractionAdapter,
) -> HostUnitTestsResponse {
    let options = workspace.options();
    let chain = FinderChain::new();
    let resolver = Resolver::new(&chain, workspace.context(adapter, &options, None));
    HostUnitTestsResponse::new(resolver.host_unit_tests(dir.unwrap_or(".")))
}

fn complete(outcome: BatchOutcome) -> Result<BatchOutcome, TestfindError> {
    if outcome.is_complete() {
        return Ok(outcome);
    }
    Err(TestfindError::no_tests_found(
        outcome.unresolved,
        outcome.suggestions,
    ))
}

// ============================================================================
// Tests
// ============================================================================
