//! Pluggable diagnostic analyzers
//!
//! Analyzers are opaque units of diagnostic-producing logic registered at
//! startup. The engine interrogates them through capability queries (which
//! analysis kinds they handle, whether they can analyze a sub-span of a
//! document, how heavy their registered actions are) instead of inspecting
//! their concrete types, and addresses them by stable [`AnalyzerId`].

pub mod builtin;
pub mod host_info;
pub mod set;
pub mod telemetry;

pub use builtin::{
    CompilerDiagnosticsAnalyzer, FileContentLoadAnalyzer, GeneratorDiagnosticsAnalyzer,
};
pub use host_info::HostAnalyzerInfo;
pub use set::{AnalyzerSet, AnalyzerSetFingerprint};
pub use telemetry::{AnalyzerTelemetryInfo, TelemetryReporter};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::model::{Compilation, DocumentId, TextSpan};

/// Stable identity of an analyzer, used for equality, hashing and the remote
/// wire format
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalyzerId(String);

impl AnalyzerId {
    /// Create an analyzer id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the compiler analyzer
    pub fn is_compiler(&self) -> bool {
        self.0 == CompilerDiagnosticsAnalyzer::ID
    }

    /// True for the file-content-load analyzer
    pub fn is_file_content_load(&self) -> bool {
        self.0 == FileContentLoadAnalyzer::ID
    }

    /// True for the generator-diagnostics placeholder
    pub fn is_generator_placeholder(&self) -> bool {
        self.0 == GeneratorDiagnosticsAnalyzer::ID
    }
}

impl fmt::Display for AnalyzerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnalyzerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Granularity of one analysis pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    /// Analysis of a document's syntax tree only
    Syntax,
    /// Analysis requiring semantic information
    Semantic,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Syntax => f.write_str("syntax"),
            AnalysisKind::Semantic => f.write_str("semantic"),
        }
    }
}

/// What one analysis request covers: a document (or the whole project), an
/// optional span within the document, and the analysis kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisScope {
    /// Document under analysis; `None` means the whole project
    pub document: Option<DocumentId>,
    /// Sub-span of the document; `None` means the whole document
    pub span: Option<TextSpan>,
    /// Kind of analysis requested
    pub kind: AnalysisKind,
}

impl AnalysisScope {
    /// Whole-document scope for the given kind
    pub fn document(document: DocumentId, kind: AnalysisKind) -> Self {
        Self {
            document: Some(document),
            span: None,
            kind,
        }
    }

    /// Span-scoped semantic analysis of one document
    pub fn document_span(document: DocumentId, span: TextSpan, kind: AnalysisKind) -> Self {
        Self {
            document: Some(document),
            span: Some(span),
            kind,
        }
    }

    /// Whole-project scope; project analysis is semantic by nature
    pub fn project() -> Self {
        Self {
            document: None,
            span: None,
            kind: AnalysisKind::Semantic,
        }
    }

    /// True when the scope targets the whole project
    pub fn is_project(&self) -> bool {
        self.document.is_none()
    }
}

/// Action categories an analyzer registers, used to estimate its cost for
/// narrow span queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProfile {
    /// Number of registered symbol-start actions
    pub symbol_start_actions: u32,
    /// Number of registered symbol-end actions
    pub symbol_end_actions: u32,
    /// Number of registered semantic-model actions
    pub semantic_model_actions: u32,
}

impl ActionProfile {
    /// Profile for an analyzer registering none of the tracked actions
    pub const fn empty() -> Self {
        Self {
            symbol_start_actions: 0,
            symbol_end_actions: 0,
            semantic_model_actions: 0,
        }
    }
}

/// A pluggable unit of diagnostic-producing logic.
///
/// Implementations are immutable once constructed and owned either by the
/// host process or by a project's analyzer references.
#[async_trait]
pub trait DiagnosticAnalyzer: Send + Sync {
    /// Stable identity of this analyzer
    fn id(&self) -> AnalyzerId;

    /// Declared execution priority; non-negative for regular analyzers,
    /// lower values run earlier
    fn priority(&self) -> i32 {
        0
    }

    /// Whether the analyzer participates in the given analysis kind
    fn supports_kind(&self, kind: AnalysisKind) -> bool;

    /// Whether semantic analysis can be scoped to a sub-span of a document,
    /// enabling member-edit incremental reuse
    fn supports_span_based_semantic_analysis(&self) -> bool {
        false
    }

    /// Action categories this analyzer registers
    fn action_profile(&self) -> ActionProfile {
        ActionProfile::empty()
    }

    /// Workspace placeholders participate in ordering but produce no
    /// diagnostics; they are filtered out before compilation attachment
    fn is_placeholder(&self) -> bool {
        false
    }

    /// Workspace analyzers drive other UI affordances and are never
    /// deprioritized
    fn is_workspace_analyzer(&self) -> bool {
        false
    }

    /// Run the analyzer over the given scope.
    ///
    /// Implementations honoring `scope.span` should restrict their work to
    /// the span; the engine additionally filters returned diagnostics by
    /// span intersection.
    async fn analyze(
        &self,
        scope: &AnalysisScope,
        compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>>;
}

/// Shared handle to an analyzer
pub type AnalyzerRef = Arc<dyn DiagnosticAnalyzer>;
