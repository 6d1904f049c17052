//! Per-document analysis execution
//!
//! Given a scope (document, optional span, analysis kind) the executor runs
//! each analyzer and returns its local diagnostics, transparently choosing
//! the incremental member-edit path for whole-document semantic requests by
//! analyzers that can analyze sub-spans, and direct execution for everything
//! else.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::analyzer::{AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerRef};
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::engine::driver::AttachedCompilation;
use crate::engine::incremental::IncrementalMemberEditAnalyzer;
use crate::engine::runner::AnalyzerRunner;
use crate::error::{AnalysisError, Result};
use crate::model::{DocumentId, ProjectSnapshot};

/// Runs analyzers over one document scope.
pub struct DocumentAnalysisExecutor {
    runner: Arc<AnalyzerRunner>,
    incremental: Arc<IncrementalMemberEditAnalyzer>,
}

impl DocumentAnalysisExecutor {
    /// Create an executor over the given runner and incremental cache
    pub fn new(runner: Arc<AnalyzerRunner>, incremental: Arc<IncrementalMemberEditAnalyzer>) -> Self {
        Self {
            runner,
            incremental,
        }
    }

    /// Compute each analyzer's local diagnostics for the scoped document.
    pub async fn compute(
        &self,
        project: &ProjectSnapshot,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        let document_id = scope.document.as_ref().ok_or_else(|| {
            AnalysisError::invalid_scope("document analysis requires a document")
        })?;
        let document = project
            .document(document_id)
            .ok_or_else(|| AnalysisError::UnknownDocument {
                document: document_id.to_string(),
            })?;
        cancellation.ensure_not_cancelled()?;

        // Only a whole-document semantic request can exploit span-based
        // reuse; a sub-span request was already narrowed by the caller.
        if scope.kind != AnalysisKind::Semantic || scope.span.is_some() {
            return self
                .direct(document_id, scope, analyzers, attached, cancellation)
                .await;
        }

        let mut span_based: Vec<AnalyzerRef> = Vec::new();
        let mut document_based: Vec<AnalyzerRef> = Vec::new();
        for analyzer in analyzers {
            if analyzer.supports_span_based_semantic_analysis() {
                span_based.push(Arc::clone(analyzer));
            } else {
                document_based.push(Arc::clone(analyzer));
            }
        }

        let mut results = FxHashMap::default();
        if !span_based.is_empty() {
            results.extend(
                self.incremental
                    .analyze(document, &span_based, &self.runner, attached, cancellation)
                    .await?,
            );
        }
        if !document_based.is_empty() {
            results.extend(
                self.direct(document_id, scope, &document_based, attached, cancellation)
                    .await?,
            );
        }
        Ok(results)
    }

    async fn direct(
        &self,
        document_id: &DocumentId,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        let run = self
            .runner
            .analyze_document(scope, analyzers, attached, cancellation)
            .await?;
        let mut results = FxHashMap::default();
        for analyzer in analyzers {
            let id = analyzer.id();
            let diagnostics = run
                .local_diagnostics(&id, document_id, scope.kind)
                .to_vec();
            results.insert(id, diagnostics);
        }
        Ok(results)
    }
}
