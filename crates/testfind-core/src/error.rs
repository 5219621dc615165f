//! Error types and exit codes for testfind.
//!
//! Two layers live here:
//!
//! - `FinderError`: raised inside the resolution engine (finders, filter
//!   building, source scanning). A handful of variants are user-input errors
//!   that abort the resolution of a reference; the rest are recoverable and
//!   only mean "this finder found nothing".
//! - `TestfindError`: the unified error for the front door. Every subsystem
//!   error is bridged into it with `From`, and it maps onto a stable
//!   `OutputErrorCode` used as the process exit code.
//!
//! ## Exit codes
//!
//! - `2`: Invalid arguments (malformed references, bad flags, bad config)
//! - `3`: No tests found for at least one reference
//! - `4`: Interactive selection was cancelled
//! - `10`: Internal errors (IO, corrupt index, unexpected state)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::interaction::InteractionError;
use crate::module_index::IndexError;
use crate::test_mapping::TestMappingError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes, used both as exit codes and in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad reference syntax, bad flags).
    InvalidArguments = 2,
    /// Resolution finished without finding any test.
    NoTestsFound = 3,
    /// The user aborted an interactive selection.
    SelectionCancelled = 4,
    /// Internal errors (bugs, IO failures, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Finder Errors
// ============================================================================

const SEPARATOR_HINT: &str = "multiple classes should be separated by space, and methods \
belonging to the same class should be separated by comma, e.g. \
`class1 class2#method1 class3#method2,method3`";

/// Errors raised while resolving a single reference.
#[derive(Debug, Error)]
pub enum FinderError {
    /// More than one `#` in a reference.
    #[error("too many \"#\" characters in reference `{reference}`: {}", SEPARATOR_HINT)]
    TooManyMethods { reference: String },

    /// A `,` without any `#`, i.e. `ClassA,ClassB`.
    #[error("too many \",\" characters in reference `{reference}`: {}", SEPARATOR_HINT)]
    MoreThanOneClass { reference: String },

    /// Methods were requested on something that is not a class.
    #[error("method filtering requires a class: {methods}")]
    MethodWithoutClass { methods: String },

    /// A C++ source file was matched but declares no test case.
    #[error("cannot find a C++ test case in {}", .path.display())]
    MissingCcTestCase { path: PathBuf },

    /// A Java/Kotlin test file has no `package` declaration.
    #[error("{}: test class file does not contain a package name", .path.display())]
    MissingPackageName { path: PathBuf },

    /// The user picked `Quit` in a selection menu.
    #[error("selection aborted")]
    SelectionAborted,

    /// Reading a source or config file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A test config could not be parsed.
    #[error("malformed XML in {}: {message}", .path.display())]
    Xml { path: PathBuf, message: String },

    /// Prompting the user failed.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

impl FinderError {
    /// Create an IO error bound to the file being read.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FinderError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an XML parse error.
    pub fn xml(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        FinderError::Xml {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for malformed user input: the reference itself is wrong and no
    /// other interpretation will fix it.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            FinderError::TooManyMethods { .. }
                | FinderError::MoreThanOneClass { .. }
                | FinderError::MethodWithoutClass { .. }
                | FinderError::MissingCcTestCase { .. }
        )
    }

    /// True when the error must stop the finder chain instead of being
    /// treated as "not found".
    pub fn propagates(&self) -> bool {
        self.is_input_error()
            || matches!(
                self,
                FinderError::SelectionAborted | FinderError::Interaction(_)
            )
    }
}

/// Result type for finder operations.
pub type FinderResult<T> = Result<T, FinderError>;

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI front door.
#[derive(Debug, Error)]
pub enum TestfindError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A reference could not be interpreted because of its syntax.
    #[error("invalid test reference: {message}")]
    InvalidReference { message: String },

    /// Nothing matched one or more references.
    #[error("no tests found for: {}", .references.join(", "))]
    NoTestsFound {
        references: Vec<String>,
        suggestions: Vec<String>,
    },

    /// Resolved tests mix wildcard and regular filters for one test.
    #[error("mixed type filters found for {test_name}; please separate tests into different runs")]
    MixedFilterTypes { test_name: String },

    /// The user cancelled an interactive prompt.
    #[error("selection cancelled")]
    SelectionCancelled,

    /// The module index could not be loaded.
    #[error("module index error: {message}")]
    ModuleIndex { message: String },

    /// Configuration could not be loaded.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&TestfindError> for OutputErrorCode {
    fn from(err: &TestfindError) -> Self {
        match err {
            TestfindError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            TestfindError::InvalidReference { .. } => OutputErrorCode::InvalidArguments,
            TestfindError::NoTestsFound { .. } => OutputErrorCode::NoTestsFound,
            TestfindError::MixedFilterTypes { .. } => OutputErrorCode::InvalidArguments,
            TestfindError::SelectionCancelled => OutputErrorCode::SelectionCancelled,
            TestfindError::ModuleIndex { .. } => OutputErrorCode::InternalError,
            TestfindError::Config { .. } => OutputErrorCode::InvalidArguments,
            TestfindError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<TestfindError> for OutputErrorCode {
    fn from(err: TestfindError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<FinderError> for TestfindError {
    fn from(err: FinderError) -> Self {
        match err {
            FinderError::SelectionAborted => TestfindError::SelectionCancelled,
            FinderError::Interaction(InteractionError::Cancelled) => {
                TestfindError::SelectionCancelled
            }
            err if err.is_input_error() => TestfindError::InvalidReference {
                message: err.to_string(),
            },
            err => TestfindError::InternalError {
                message: err.to_string(),
            },
        }
    }
}

impl From<IndexError> for TestfindError {
    fn from(err: IndexError) -> Self {
        TestfindError::ModuleIndex {
            message: err.to_string(),
        }
    }
}

impl From<CacheError> for TestfindError {
    fn from(err: CacheError) -> Self {
        TestfindError::InternalError {
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for TestfindError {
    fn from(err: ConfigError) -> Self {
        TestfindError::Config {
            message: err.to_string(),
        }
    }
}

impl From<TestMappingError> for TestfindError {
    fn from(err: TestMappingError) -> Self {
        match err {
            TestMappingError::Io { .. } => TestfindError::InternalError {
                message: err.to_string(),
            },
            _ => TestfindError::InvalidArguments {
                message: err.to_string(),
            },
        }
    }
}

impl From<InteractionError> for TestfindError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::Cancelled => TestfindError::SelectionCancelled,
            other => TestfindError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl TestfindError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        TestfindError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a no-tests-found error.
    pub fn no_tests_found(references: Vec<String>, suggestions: Vec<String>) -> Self {
        TestfindError::NoTestsFound {
            references,
            suggestions,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        TestfindError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
