//! Per-analyzer analysis results
//!
//! One `DiagnosticAnalysisResult` holds everything a single analyzer reported
//! for one project pass, bucketed per document into syntax, semantic and
//! non-local diagnostics plus a project-wide bucket. Results are built
//! append-only through `DiagnosticResultBuilder` and frozen on completion;
//! every diagnostic lands in exactly one bucket.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalysisKind;
use crate::diagnostics::Diagnostic;
use crate::model::DocumentId;

/// Diagnostics one analyzer reported for a single document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDiagnostics {
    /// Diagnostics from syntax-level analysis of this document
    pub syntax: Vec<Diagnostic>,
    /// Diagnostics from semantic-level analysis of this document
    pub semantic: Vec<Diagnostic>,
    /// Diagnostics attributed to this document by analysis of *other*
    /// documents or of the whole project
    pub non_local: Vec<Diagnostic>,
}

impl DocumentDiagnostics {
    /// Local diagnostics (syntax + semantic), in bucket order
    pub fn local(&self) -> impl Iterator<Item = &Diagnostic> {
        self.syntax.iter().chain(self.semantic.iter())
    }

    /// True when no bucket holds a diagnostic
    pub fn is_empty(&self) -> bool {
        self.syntax.is_empty() && self.semantic.is_empty() && self.non_local.is_empty()
    }
}

/// Frozen result of running one analyzer over a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticAnalysisResult {
    by_document: FxHashMap<DocumentId, DocumentDiagnostics>,
    other: Vec<Diagnostic>,
}

impl DiagnosticAnalysisResult {
    /// Diagnostics bucketed for the given document
    pub fn document(&self, id: &DocumentId) -> Option<&DocumentDiagnostics> {
        self.by_document.get(id)
    }

    /// Every document with at least one recorded diagnostic
    pub fn documents(&self) -> impl Iterator<Item = (&DocumentId, &DocumentDiagnostics)> {
        self.by_document.iter()
    }

    /// Project-wide diagnostics not tied to one document
    pub fn other(&self) -> &[Diagnostic] {
        &self.other
    }

    /// Total number of diagnostics across all buckets
    pub fn len(&self) -> usize {
        self.by_document
            .values()
            .map(|d| d.syntax.len() + d.semantic.len() + d.non_local.len())
            .sum::<usize>()
            + self.other.len()
    }

    /// True when the analyzer reported nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only builder for a [`DiagnosticAnalysisResult`]
#[derive(Debug, Default)]
pub struct DiagnosticResultBuilder {
    by_document: FxHashMap<DocumentId, DocumentDiagnostics>,
    other: Vec<Diagnostic>,
}

impl DiagnosticResultBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local diagnostic for `document` under the bucket for `kind`
    pub fn add_local(&mut self, document: DocumentId, kind: AnalysisKind, diagnostic: Diagnostic) {
        let entry = self.by_document.entry(document).or_default();
        match kind {
            AnalysisKind::Syntax => entry.syntax.push(diagnostic),
            AnalysisKind::Semantic => entry.semantic.push(diagnostic),
        }
    }

    /// Record a diagnostic attributed to `document` from elsewhere
    pub fn add_non_local(&mut self, document: DocumentId, diagnostic: Diagnostic) {
        self.by_document
            .entry(document)
            .or_default()
            .non_local
            .push(diagnostic);
    }

    /// Record a project-wide diagnostic
    pub fn add_other(&mut self, diagnostic: Diagnostic) {
        self.other.push(diagnostic);
    }

    /// Append every bucket of a previously frozen partial result.
    ///
    /// Used when per-document passes computed in parallel are folded into one
    /// result per analyzer.
    pub fn absorb(&mut self, partial: DiagnosticAnalysisResult) {
        for (document, buckets) in partial.by_document {
            let entry = self.by_document.entry(document).or_default();
            entry.syntax.extend(buckets.syntax);
            entry.semantic.extend(buckets.semantic);
            entry.non_local.extend(buckets.non_local);
        }
        self.other.extend(partial.other);
    }

    /// Freeze the builder into an immutable result
    pub fn freeze(self) -> DiagnosticAnalysisResult {
        DiagnosticAnalysisResult {
            by_document: self.by_document,
            other: self.other,
        }
    }
}
