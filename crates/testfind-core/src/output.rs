//! JSON responses of the `tfind` front door.
//!
//! Every response is a single JSON document on stdout:
//!
//! 1. **Status first:** `status` is `"ok"` or `"error"` and always the first field
//! 2. **Versioned:** `schema_version` follows `status`
//! 3. **Deterministic:** sets are emitted sorted, descriptors in resolution order
//!
//! Errors use `{status: "error", schema_version, error: {code, message, details?}}`
//! where `code` matches the process exit code.

use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;

use crate::classifier::InterpretationKind;
use crate::error::{OutputErrorCode, TestfindError};
use crate::resolver::BatchOutcome;
use crate::types::TestDescriptor;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Errors
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Same value as the exit code.
    pub code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &TestfindError) -> Self {
        let details = match err {
            TestfindError::NoTestsFound {
                references,
                suggestions,
            } => Some(serde_json::json!({
                "references": references,
                "suggestions": suggestions,
            })),
            TestfindError::MixedFilterTypes { test_name } => {
                Some(serde_json::json!({ "test": test_name }))
            }
            _ => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &TestfindError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response for `find` and `entries`.
#[derive(Debug, Clone, Serialize)]
pub struct FindResponse {
    pub status: String,
    pub schema_version: String,
    pub tests: Vec<TestDescriptor>,
    /// Union of the tests' build targets.
    pub build_targets: BTreeSet<String>,
    /// References nothing matched.
    pub unresolved: Vec<String>,
    pub suggestions: Vec<String>,
}

impl FindResponse {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        FindResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            tests: outcome.tests().cloned().collect(),
            build_targets: outcome.build_targets(),
            unresolved: outcome.unresolved.clone(),
            suggestions: outcome.suggestions.clone(),
        }
    }
}

/// Response for `suggest`.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestResponse {
    pub status: String,
    pub schema_version: String,
    pub input: String,
    /// Closest first.
    pub suggestions: Vec<String>,
}

impl SuggestResponse {
    pub fn new(input: impl Into<String>, suggestions: Vec<String>) -> Self {
        SuggestResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            input: input.into(),
            suggestions,
        }
    }
}

/// Response for `classify`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResponse {
    pub status: String,
    pub schema_version: String,
    pub reference: String,
    /// Interpretations in the order finders try them.
    pub interpretations: Vec<InterpretationKind>,
}

impl ClassifyResponse {
    pub fn new(reference: impl Into<String>, interpretations: Vec<InterpretationKind>) -> Self {
        ClassifyResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            reference: reference.into(),
            interpretations,
        }
    }
}

/// Response for `host-unit-tests`.
#[derive(Debug, Clone, Serialize)]
pub struct HostUnitTestsResponse {
    pub status: String,
    pub schema_version: String,
    pub tests: BTreeSet<String>,
}

impl HostUnitTestsResponse {
    pub fn new(tests: BTreeSet<String>) -> Self {
        HostUnitTestsResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            tests,
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Emit a response as a single JSON line.
pub fn emit_response_compact<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json =
        serde_json::to_string(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedReference;

    fn emit_value<T: Serialize>(response: &T) -> serde_json::Value {
        let mut output = Vec::new();
        emit_response(response, &mut output).unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn status_and_version_come_first() {
        let response = SuggestResponse::new("fst", vec!["fist".to_string()]);
        let mut output = Vec::new();
        emit_response_compact(&response, &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with(r#"{"status":"ok","schema_version":"1""#));
    }

    #[test]
    fn find_response_collects_targets() {
        let mut test = TestDescriptor::new("FooTests", "foo/AndroidTest.xml");
        test.add_build_target("FooTests");
        test.add_build_target("MODULES-IN-foo");
        let outcome = BatchOutcome {
            resolved: vec![ResolvedReference {
                reference: "FooTests".to_string(),
                finders: vec!["MODULE".to_string()],
                tests: vec![test],
            }],
            ..BatchOutcome::default()
        };
        let value = emit_value(&FindResponse::from_outcome(&outcome));
        assert_eq!(value["tests"][0]["test_name"], "FooTests");
        assert_eq!(
            value["build_targets"],
            serde_json::json!(["FooTests", "MODULES-IN-foo"])
        );
        assert_eq!(value["unresolved"], serde_json::json!([]));
    }

    #[test]
    fn no_tests_found_error_has_details() {
        let err = TestfindError::no_tests_found(
            vec!["no_such_module_xyz".to_string()],
            vec!["no_such_module_xy".to_string()],
        );
        let value = emit_value(&ErrorResponse::from_error(&err));
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], 3);
        assert_eq!(
            value["error"]["details"]["suggestions"][0],
            "no_such_module_xy"
        );
    }

    #[test]
    fn classify_uses_screaming_names() {
        let response = ClassifyResponse::new("Foo", vec![InterpretationKind::Cache, InterpretationKind::Module]);
        let value = emit_value(&response);
        assert_eq!(value["interpretations"], serde_json::json!(["CACHE", "MODULE"]));
    }
}
