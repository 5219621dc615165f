//! The finder chain.
//!
//! For each reference the chain lines up the caller-registered finders
//! followed by one built-in finder per interpretation the classifier
//! returned, and asks them in that order. The first non-empty answer wins,
//! unless the caller asked for every answer.
//!
//! Input errors (a malformed `#` list, methods on a package, ...) stop the
//! chain: no other interpretation will fix the reference. Anything else a
//! finder fails with is logged and treated as "found nothing".

use tracing::{debug, info, warn};

use crate::classifier::{classify, InterpretationKind};
use crate::error::FinderResult;
use crate::finders::{Finder, FinderContext, KindFinder};
use crate::reference::parse_test_identifier;
use crate::types::TestDescriptor;

/// Tests found for one reference, and who found them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Finder names that contributed, in order.
    pub finders: Vec<String>,
    pub tests: Vec<TestDescriptor>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Ordered finders for references.
#[derive(Default)]
pub struct FinderChain {
    registered: Vec<Box<dyn Finder>>,
}

impl FinderChain {
    /// A chain with only the built-in strategies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finder tried before every built-in one, after earlier
    /// registrations.
    pub fn register(&mut self, finder: Box<dyn Finder>) {
        debug!(finder = finder.name(), "registered finder");
        self.registered.push(finder);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_finder(mut self, finder: Box<dyn Finder>) -> Self {
        self.register(finder);
        self
    }

    /// Names of the finders tried for `reference`, in order.
    pub fn finder_names(&self, reference: &str) -> Vec<String> {
        self.registered
            .iter()
            .map(|f| f.name().to_string())
            .chain(classify(reference).into_iter().map(|k| k.name().to_string()))
            .collect()
    }

    /// Tests of the first finder answering for `reference`.
    ///
    /// # Errors
    ///
    /// Errors that [`propagate`](crate::error::FinderError::propagates).
    pub fn resolve(&self, reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Resolution> {
        self.run(reference, ctx, false)
    }

    /// Tests of every finder answering for `reference`, concatenated.
    pub fn resolve_all(&self, reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Resolution> {
        self.run(reference, ctx, true)
    }

    fn run(&self, reference: &str, ctx: &FinderContext<'_>, merge: bool) -> FinderResult<Resolution> {
        let kinds = classify(reference);
        debug!(reference, ?kinds, "classified reference");
        // Finders see the name without its mainline suffix.
        let test_name = parse_test_identifier(reference).test_name;
        let built_in: Vec<KindFinder> = kinds.iter().copied().map(KindFinder::new).collect();
        let finders = self
            .registered
            .iter()
            .map(|f| f.as_ref())
            .chain(built_in.iter().map(|f| f as &dyn Finder));

        let mut resolution = Resolution {
            finders: Vec::new(),
            tests: Vec::new(),
        };
        for finder in finders {
            let name = finder.name().to_string();
            debug!(reference, finder = %name, "trying finder");
            let mut tests = match finder.find(&test_name, ctx) {
                Ok(tests) => tests,
                Err(err) if err.propagates() => return Err(err),
                Err(err) => {
                    warn!(reference, finder = %name, error = %err, "finder failed, skipping");
                    continue;
                }
            };
            if tests.is_empty() {
                continue;
            }
            info!(reference, finder = %name, count = tests.len(), "found tests");
            if name != InterpretationKind::Cache.name() {
                for test in &mut tests {
                    test.finder = name.clone();
                }
            }
            resolution.finders.push(name);
            resolution.tests.extend(tests);
            if !merge {
                break;
            }
        }
        if resolution.is_empty() {
            debug!(reference, "no finder found tests");
        }
        Ok(resolution)
    }
}

// ============================================================================
// Tests
// ============================================================================
