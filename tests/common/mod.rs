//! Shared analyzer doubles for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use lumen_analysis::analyzer::{
    ActionProfile, AnalysisKind, AnalysisScope, AnalyzerId, DiagnosticAnalyzer,
};
use lumen_analysis::error::AnalysisError;
use lumen_analysis::model::Compilation;
use lumen_analysis::{CancellationToken, Diagnostic, Result};

/// Emits a fixed list of diagnostics for matching scopes and counts its
/// invocations.
pub struct StaticAnalyzer {
    id: &'static str,
    kind: AnalysisKind,
    span_based: bool,
    profile: ActionProfile,
    document_diagnostics: Vec<Diagnostic>,
    project_diagnostics: Vec<Diagnostic>,
    calls: AtomicUsize,
}

impl StaticAnalyzer {
    pub fn new(id: &'static str, kind: AnalysisKind) -> Self {
        Self {
            id,
            kind,
            span_based: false,
            profile: ActionProfile::empty(),
            document_diagnostics: Vec::new(),
            project_diagnostics: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn span_based(mut self) -> Self {
        self.span_based = true;
        self
    }

    pub fn with_profile(mut self, profile: ActionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Emitted on document scopes targeting the diagnostic's document
    pub fn with_document_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.document_diagnostics.push(diagnostic);
        self
    }

    /// Emitted on whole-project scopes
    pub fn with_project_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.project_diagnostics.push(diagnostic);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosticAnalyzer for StaticAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(self.id)
    }

    fn supports_kind(&self, kind: AnalysisKind) -> bool {
        kind == self.kind
    }

    fn supports_span_based_semantic_analysis(&self) -> bool {
        self.span_based
    }

    fn action_profile(&self) -> ActionProfile {
        self.profile
    }

    async fn analyze(
        &self,
        scope: &AnalysisScope,
        _compilation: &Compilation,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        cancellation.ensure_not_cancelled()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if scope.is_project() {
            return Ok(self.project_diagnostics.clone());
        }
        Ok(self
            .document_diagnostics
            .iter()
            .filter(|d| d.document.as_ref() == scope.document.as_ref())
            .filter(|d| scope.span.map_or(true, |span| d.intersects(&span)))
            .cloned()
            .collect())
    }
}

/// Reports one warning per top-level member intersecting the analyzed scope,
/// and records every scope it was invoked with.
pub struct MemberWarningAnalyzer {
    id: &'static str,
    diagnostic_id: &'static str,
    scopes: Mutex<Vec<AnalysisScope>>,
}

impl MemberWarningAnalyzer {
    pub fn new(id: &'static str, diagnostic_id: &'static str) -> Self {
        Self {
            id,
            diagnostic_id,
            scopes: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_scopes(&self) -> Vec<AnalysisScope> {
        self.scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticAnalyzer for MemberWarningAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(self.id)
    }

    fn supports_kind(&self, kind: AnalysisKind) -> bool {
        kind == AnalysisKind::Semantic
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
        self.scopes.lock().unwrap().push(scope.clone());
        let Some(document_id) = &scope.document else {
            return Ok(Vec::new());
        };
        let Some(document) = compilation.document(document_id) else {
            return Ok(Vec::new());
        };
        let mut diagnostics = Vec::new();
        for member in document.members() {
            if scope.span.map_or(true, |span| member.intersects(&span)) {
                diagnostics.push(
                    Diagnostic::warning(self.diagnostic_id, "member body check")
                        .with_location(document_id.clone(), *member),
                );
            }
        }
        Ok(diagnostics)
    }
}

/// Fails on every invocation.
pub struct FailingAnalyzer(pub &'static str);

#[async_trait]
impl DiagnosticAnalyzer for FailingAnalyzer {
    fn id(&self) -> AnalyzerId {
        AnalyzerId::new(self.0)
    }

    fn supports_kind(&self, _kind: AnalysisKind) -> bool {
        true
    }

    async fn analyze(
        &self,
        _scope: &AnalysisScope,
        _compilation: &Compilation,
        _cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        Err(AnalysisError::fault(AnalyzerId::new(self.0), "synthetic failure"))
    }
}
