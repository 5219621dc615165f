//! testfind: resolve loosely written test references into runnable tests.
//!
//! The resolution engine lives in `testfind-core`; this crate re-exports it
//! and adds the terminal front door used by the `tfind` binary.

// Core engine - re-exported from testfind-core
pub use testfind_core::cache;
pub use testfind_core::chain;
pub use testfind_core::classifier;
pub use testfind_core::config;
pub use testfind_core::error;
pub use testfind_core::filter;
pub use testfind_core::finders;
pub use testfind_core::fuzzy;
pub use testfind_core::interaction;
pub use testfind_core::module_index;
pub use testfind_core::output;
pub use testfind_core::reference;
pub use testfind_core::resolver;
pub use testfind_core::search;
pub use testfind_core::source;
pub use testfind_core::synthesize;
pub use testfind_core::test_config;
pub use testfind_core::test_mapping;
pub use testfind_core::types;

// Front door
pub mod cli;
pub mod terminal;
