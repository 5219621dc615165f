//! Finder strategies.
//!
//! A finder takes one reference and either returns the tests it resolves to
//! or nothing. Which finders run for a reference is decided by the
//! classifier; this module maps each [`InterpretationKind`] to the strategy
//! that implements it.
//!
//! Strategies are plain functions sharing a [`FinderContext`]. [`KindFinder`]
//! wraps one of them in the [`Finder`] trait so the chain can mix built-in
//! strategies with caller-registered finders.

pub mod cache;
pub mod integration;
pub mod module;
pub mod suite_plan;

use std::path::{Component, Path, PathBuf};

use crate::cache::ResultCache;
use crate::classifier::InterpretationKind;
use crate::config::ResolveOptions;
use crate::error::FinderResult;
use crate::interaction::InteractionAdapter;
use crate::module_index::ModuleIndex;
use crate::search::SourceSearch;
use crate::synthesize::Synthesizer;
use crate::types::TestDescriptor;

// ============================================================================
// Context
// ============================================================================

/// Everything a finder may consult.
#[derive(Clone, Copy)]
pub struct FinderContext<'a> {
    pub index: &'a ModuleIndex,
    pub search: &'a SourceSearch,
    pub adapter: &'a dyn InteractionAdapter,
    pub options: &'a ResolveOptions,
    /// Persistent result cache; `None` when caching is off.
    pub cache: Option<&'a ResultCache>,
    /// Directory relative paths are resolved against.
    pub cwd: &'a Path,
}

impl<'a> FinderContext<'a> {
    /// Source tree root.
    pub fn root(&self) -> &'a Path {
        self.index.root()
    }

    pub fn synthesizer(&self) -> Synthesizer<'a> {
        Synthesizer::new(self.index, self.search, self.options)
    }

    /// `path` made absolute against `cwd`, with `.` and `..` folded.
    ///
    /// Symlinks are not followed, so the result stays comparable with paths
    /// built from the root.
    pub fn absolute(&self, path: &str) -> PathBuf {
        let joined = self.cwd.join(path);
        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }
        normalized
    }
}

// ============================================================================
// Finder trait
// ============================================================================

/// One way of turning a reference into tests.
///
/// An empty result means "not mine"; the chain moves on to the next finder.
/// Errors are either propagated to the caller or logged and skipped,
/// depending on [`FinderError::propagates`](crate::error::FinderError::propagates).
pub trait Finder: Send + Sync {
    /// Name recorded on the descriptors this finder produces.
    fn name(&self) -> &str;

    fn find(&self, reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>>;
}

/// Signature shared by the built-in strategies.
pub type Strategy = fn(&str, &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>>;

/// The strategy implementing an interpretation.
pub fn strategy(kind: InterpretationKind) -> Strategy {
    match kind {
        InterpretationKind::Cache => cache::find_cached,
        InterpretationKind::Module => module::find_by_module_name,
        InterpretationKind::MainlineModule => module::find_by_mainline_module,
        InterpretationKind::Class | InterpretationKind::QualifiedClass => {
            |reference, ctx| module::find_by_class_name(reference, None, None, false, ctx)
        }
        InterpretationKind::ModuleClass => module::find_by_module_and_class,
        InterpretationKind::Package => |reference, ctx| module::find_by_package(reference, None, None, ctx),
        InterpretationKind::ModulePackage => module::find_by_module_and_package,
        InterpretationKind::ModulePath => module::find_by_path,
        InterpretationKind::IntegrationPath => integration::find_by_integration_path,
        InterpretationKind::Integration => integration::find_by_integration_name,
        InterpretationKind::CcClass => |reference, ctx| module::find_by_cc_class(reference, None, None, ctx),
        InterpretationKind::SuitePlan => suite_plan::find_by_suite_name,
        InterpretationKind::SuitePlanPath => suite_plan::find_by_suite_path,
        InterpretationKind::Config => module::find_by_config_name,
    }
}

/// A built-in strategy behind the [`Finder`] trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFinder {
    kind: InterpretationKind,
}

impl KindFinder {
    pub fn new(kind: InterpretationKind) -> Self {
        KindFinder { kind }
    }

    pub fn kind(&self) -> InterpretationKind {
        self.kind
    }
}

impl Finder for KindFinder {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn find(&self, reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
        strategy(self.kind)(reference, ctx)
    }
}

// ============================================================================
// Tests
// ============================================================================
