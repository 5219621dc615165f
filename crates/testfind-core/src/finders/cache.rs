//! Cached resolutions.

use tracing::{debug, info};

use crate::cache::CacheValidator;
use crate::error::FinderResult;
use crate::types::TestDescriptor;

use super::FinderContext;

/// Descriptors stored for this exact reference, if they are still valid.
///
/// A stale entry is left on disk; the next successful resolution of the
/// reference overwrites it.
pub fn find_cached(reference: &str, ctx: &FinderContext<'_>) -> FinderResult<Vec<TestDescriptor>> {
    let Some(cache) = ctx.cache.filter(|_| ctx.options.use_cache) else {
        return Ok(Vec::new());
    };
    let Some(entry) = cache.load_entry(reference) else {
        return Ok(Vec::new());
    };
    match CacheValidator::new(ctx.index).validate_entry(&entry) {
        Some(tests) => {
            info!(reference, stored_at = %entry.stored_at, "using cached result");
            Ok(tests)
        }
        None => {
            debug!(reference, "cached result is stale");
            Ok(Vec::new())
        }
    }
}
