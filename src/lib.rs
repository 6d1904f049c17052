//! Incremental diagnostic analysis engine for the Lumen language platform
//!
//! This crate runs a dynamic set of pluggable analyzers over a multi-project
//! solution of immutable snapshots, producing diagnostics at syntax, semantic
//! and whole-project granularity. Compilation artifacts are cached by content
//! fingerprint, semantic results are reused incrementally across member-level
//! edits, and expensive analyzers can be deferred to low-priority passes to
//! keep interactive requests responsive.

pub mod analyzer;
pub mod cancellation;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;

// Re-export main types
pub use analyzer::{AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerSet, DiagnosticAnalyzer};
pub use cancellation::CancellationToken;
pub use diagnostics::{Diagnostic, DiagnosticAnalysisResult, Severity};
pub use engine::{
    DiagnosticService, DiagnosticServiceBuilder, EngineSettings, RequestPriority,
};
pub use error::{AnalysisError, Result};
pub use model::{DocumentId, DocumentSnapshot, ProjectId, ProjectSnapshot, TextSpan};
