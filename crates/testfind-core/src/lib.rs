//! Core engine for testfind.
//!
//! This crate turns loosely written test references into test descriptors:
//! - Reference parsing and classification
//! - Module index loading and source tree search
//! - Test config (XML) reading and filter building
//! - The finder chain with one strategy per interpretation
//! - Descriptor synthesis, batch resolution and fuzzy suggestions
//! - The persistent resolution cache
//! - Configuration layering and JSON output types

pub mod cache;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod finders;
pub mod fuzzy;
pub mod interaction;
pub mod module_index;
pub mod output;
pub mod reference;
pub mod resolver;
pub mod search;
pub mod source;
pub mod synthesize;
pub mod test_config;
pub mod test_mapping;
pub mod types;

pub use chain::{FinderChain, Resolution};
pub use classifier::{classify, InterpretationKind};
pub use error::{FinderError, OutputErrorCode, TestfindError};
pub use finders::{Finder, FinderContext};
pub use module_index::ModuleIndex;
pub use resolver::{BatchOutcome, Resolver};
pub use types::{RunnerKind, TestDescriptor, TestFilter};
