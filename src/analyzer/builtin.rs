//! Built-in host analyzers
//!
//! Three analyzers ship with the platform itself: the compiler analyzer
//! surfacing stored parse and binding output, the file-content-load analyzer
//! surfacing documents whose text could not be read, and the placeholder that
//! carries source-generator diagnostics into analysis results.

use async_trait::async_trait;

use crate::analyzer::{AnalysisKind, AnalysisScope, AnalyzerId, DiagnosticAnalyzer};
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::model::{Compilation, DocumentId};

/// Surfaces the compiler's own parse and binding diagnostics.
#[derive(Debug, Default)]
pub struct CompilerDiagnosticsAnalyzer;

impl CompilerDiagnosticsAnalyzer {
    /// Stable id of the compiler analyzer
    pub const ID: &'static str = "lumen.compiler";
}

#[async_trait]
impl DiagnosticAnalyzer for CompilerDiagnosticsAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(Self::ID)
    }

    fn supports_kind(&self, _kind: AnalysisKind) -> bool {
        true
    }

    fn supports_span_based_semantic_analysis(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        scope: &AnalysisScope,
        compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        cancellation.ensure_not_cancelled()?;
        let Some(document_id) = &scope.document else {
            // Compiler diagnostics are all document-attributed.
            return Ok(Vec::new());
        };
        let Some(document) = compilation.document(document_id) else {
            return Ok(Vec::new());
        };
        let stored = match scope.kind {
            AnalysisKind::Syntax => document.syntax_diagnostics(),
            AnalysisKind::Semantic => document.semantic_diagnostics(),
        };
        let diagnostics = stored
            .iter()
            .filter(|d| scope.span.map_or(true, |span| d.intersects(&span)))
            .map(|d| anchor(d.clone(), document_id.clone()))
            .collect();
        Ok(diagnostics)
    }
}

/// Reports documents whose content failed to load.
#[derive(Debug, Default)]
pub struct FileContentLoadAnalyzer;

impl FileContentLoadAnalyzer {
    /// Stable id of the file-content-load analyzer
    pub const ID: &'static str = "lumen.file-content-load";

    /// Diagnostic id reported for unreadable documents
    pub const DIAGNOSTIC_ID: &'static str = "LM0005";
}

#[async_trait]
impl DiagnosticAnalyzer for FileContentLoadAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(Self::ID)
    }

    fn supports_kind(&self, kind: AnalysisKind) -> bool {
        kind == AnalysisKind::Syntax
    }

    async fn analyze(
        &self,
        scope: &AnalysisScope,
        compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        cancellation.ensure_not_cancelled()?;
        let Some(document_id) = &scope.document else {
            return Ok(Vec::new());
        };
        let Some(document) = compilation.document(document_id) else {
            return Ok(Vec::new());
        };
        let Some(message) = document.load_error() else {
            return Ok(Vec::new());
        };
        Ok(vec![Diagnostic::error(
            Self::DIAGNOSTIC_ID,
            format!("unable to load file content: {message}"),
        )
        .with_document(document_id.clone())])
    }
}

/// Carries source-generator diagnostics into project analysis results.
#[derive(Debug, Default)]
pub struct GeneratorDiagnosticsAnalyzer;

impl GeneratorDiagnosticsAnalyzer {
    /// Stable id of the generator-diagnostics placeholder
    pub const ID: &'static str = "lumen.generator-diagnostics";
}

#[async_trait]
impl DiagnosticAnalyzer for GeneratorDiagnosticsAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(Self::ID)
    }

    fn supports_kind(&self, kind: AnalysisKind) -> bool {
        kind == AnalysisKind::Semantic
    }

    async fn analyze(
        &self,
        scope: &AnalysisScope,
        compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        cancellation.ensure_not_cancelled()?;
        if !scope.is_project() {
            // Generator output is only folded in during project passes.
            return Ok(Vec::new());
        }
        Ok(compilation.generator_diagnostics().to_vec())
    }
}

fn anchor(mut diagnostic: Diagnostic, document: DocumentId) -> Diagnostic {
    if diagnostic.document.is_none() {
        diagnostic.document = Some(document);
    }
    diagnostic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentSnapshot, ProjectSnapshot, TextSpan};

    fn compilation() -> Compilation {
        let project = ProjectSnapshot::builder("app")
            .document(
                DocumentSnapshot::new("a.lm", "fn a() { ??? }").with_syntax_diagnostic(
                    Diagnostic::error("LM0001", "unexpected token")
                        .with_location(DocumentId::new("a.lm"), TextSpan::new(9, 12)),
                ),
            )
            .document(DocumentSnapshot::new("b.lm", "fn b() {}").with_load_error("disk offline"))
            .build();
        Compilation::build(&project)
    }

    #[tokio::test]
    async fn compiler_analyzer_surfaces_stored_syntax_diagnostics() {
        let compilation = compilation();
        let scope = AnalysisScope::document("a.lm".into(), AnalysisKind::Syntax);
        let diagnostics = CompilerDiagnosticsAnalyzer
            .analyze(&scope, &compilation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].id, "LM0001");
    }

    #[tokio::test]
    async fn compiler_analyzer_respects_span() {
        let compilation = compilation();
        let scope = AnalysisScope::document_span(
            "a.lm".into(),
            TextSpan::new(0, 5),
            AnalysisKind::Syntax,
        );
        let diagnostics = CompilerDiagnosticsAnalyzer
            .analyze(&scope, &compilation, &CancellationToken::new())
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn load_analyzer_reports_unreadable_documents() {
        let compilation = compilation();
        let scope = AnalysisScope::document("b.lm".into(), AnalysisKind::Syntax);
        let diagnostics = FileContentLoadAnalyzer
            .analyze(&scope, &compilation, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].id, FileContentLoadAnalyzer::DIAGNOSTIC_ID);
    }
}
