//! Reference classification.
//!
//! The same literal is often ambiguous: `FooTest` may be a module, a class, a
//! suite plan or an integration config. `classify` never commits to one
//! answer. It returns a priority-ordered list of interpretations and the
//! finder chain tries them in turn.

use std::fmt;

use serde::Serialize;

use crate::reference::{is_mainline_reference, parse_module_reference};

/// Source extensions that make a dotted reference a file path.
const SOURCE_EXTENSIONS: &[&str] = &["java", "kt", "bp", "mk", "cc", "cpp"];

/// One way of interpreting a reference; each maps to one finder strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpretationKind {
    /// A previously cached resolution of the literal reference.
    Cache,
    /// A module name.
    Module,
    /// `module[a.apk+b.apex]`.
    MainlineModule,
    /// A bare Java/Kotlin class name.
    Class,
    /// A fully qualified class name.
    QualifiedClass,
    /// `module:class`.
    ModuleClass,
    /// A dotted Java package.
    Package,
    /// `module:package`.
    ModulePackage,
    /// A file or directory path inside the tree.
    ModulePath,
    /// A path to an integration config xml.
    IntegrationPath,
    /// An integration config name.
    Integration,
    /// A C++ gtest class name.
    CcClass,
    /// A suite plan name such as `cts`.
    SuitePlan,
    /// A path to a suite plan xml.
    SuitePlanPath,
    /// A test config base name.
    Config,
}

impl InterpretationKind {
    /// Stable upper-case name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            InterpretationKind::Cache => "CACHE",
            InterpretationKind::Module => "MODULE",
            InterpretationKind::MainlineModule => "MAINLINE_MODULE",
            InterpretationKind::Class => "CLASS",
            InterpretationKind::QualifiedClass => "QUALIFIED_CLASS",
            InterpretationKind::ModuleClass => "MODULE_CLASS",
            InterpretationKind::Package => "PACKAGE",
            InterpretationKind::ModulePackage => "MODULE_PACKAGE",
            InterpretationKind::ModulePath => "MODULE_FILE_PATH",
            InterpretationKind::IntegrationPath => "INTEGRATION_FILE_PATH",
            InterpretationKind::Integration => "INTEGRATION",
            InterpretationKind::CcClass => "CC_CLASS",
            InterpretationKind::SuitePlan => "SUITE_PLAN",
            InterpretationKind::SuitePlanPath => "SUITE_PLAN_FILE_PATH",
            InterpretationKind::Config => "CONFIG",
        }
    }
}

impl fmt::Display for InterpretationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use InterpretationKind::*;

/// Ordered interpretations for a raw reference. Pure and total.
pub fn classify(reference: &str) -> Vec<InterpretationKind> {
    if reference.starts_with('.') || reference.contains("..") {
        return vec![Cache, ModulePath, IntegrationPath, SuitePlanPath];
    }
    if reference.contains('/') {
        if reference.starts_with('/') {
            return vec![Cache, ModulePath, IntegrationPath, SuitePlanPath];
        }
        if reference.contains(':') {
            return vec![
                Cache,
                ModulePath,
                IntegrationPath,
                Integration,
                SuitePlanPath,
                ModuleClass,
            ];
        }
        return vec![
            Cache,
            ModulePath,
            IntegrationPath,
            Integration,
            SuitePlanPath,
            CcClass,
        ];
    }
    if is_mainline_reference(reference) {
        return vec![Cache, MainlineModule];
    }

    let dotted_end = reference.rsplit_once('.').map(|(_, end)| end);
    if parse_module_reference(reference).is_some() {
        return match dotted_end {
            Some(end) if !starts_upper(end) => vec![Cache, ModulePackage, ModuleClass],
            _ => vec![Cache, ModuleClass, Integration],
        };
    }
    if let Some(end) = dotted_end {
        // `Foo.java#method` classifies by `java`.
        let end = end.split('#').next().unwrap_or(end);
        if SOURCE_EXTENSIONS.contains(&end) {
            return vec![Cache, ModulePath];
        }
        if end == "xml" {
            return vec![Cache, IntegrationPath, SuitePlanPath];
        }
        return vec![Cache, Module, QualifiedClass, Package];
    }
    vec![
        Cache,
        Module,
        Integration,
        Config,
        SuitePlan,
        Class,
        CcClass,
    ]
}

fn starts_upper(segment: &str) -> bool {
    segment.chars().next().is_some_and(char::is_uppercase)
}

// ============================================================================
// Tests
// ============================================================================
