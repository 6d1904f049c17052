//! Immutable project snapshots and content checksums
//!
//! A project snapshot is a versioned view of everything that feeds one
//! compilation: documents, analyzer references and analyzer configuration.
//! Snapshots are never mutated; an edit produces a new snapshot with a bumped
//! project-state generation. The content checksum fingerprints all inputs and
//! keys the attached-compilation cache.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::analyzer::{AnalyzerId, DiagnosticAnalyzer};
use crate::diagnostics::Diagnostic;
use crate::error::{AnalysisError, Result};
use crate::model::{DocumentId, DocumentSnapshot};

/// Stable identity of a project across snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Content fingerprint over a project's compilation inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectChecksum([u8; 32]);

impl ProjectChecksum {
    /// The raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ProjectChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Immutable versioned view of a project's compilation inputs
#[derive(Clone)]
pub struct ProjectSnapshot {
    id: ProjectId,
    generation: u64,
    documents: IndexMap<DocumentId, Arc<DocumentSnapshot>>,
    analyzer_references: Vec<Arc<dyn DiagnosticAnalyzer>>,
    analyzer_config: Vec<String>,
    skipped_analyzers: HashSet<AnalyzerId>,
    sdk_style_analyzers: bool,
    generator_diagnostics: Vec<Diagnostic>,
    checksum: OnceCell<ProjectChecksum>,
}

impl ProjectSnapshot {
    /// Start building a snapshot for the given project id
    pub fn builder(id: impl Into<ProjectId>) -> ProjectSnapshotBuilder {
        ProjectSnapshotBuilder {
            id: id.into(),
            documents: IndexMap::new(),
            analyzer_references: Vec::new(),
            analyzer_config: Vec::new(),
            skipped_analyzers: HashSet::new(),
            sdk_style_analyzers: false,
            generator_diagnostics: Vec::new(),
        }
    }

    /// Stable identity of the project
    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    /// Project-state generation; advances on every derived snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up a document by id
    pub fn document(&self, id: &DocumentId) -> Option<&Arc<DocumentSnapshot>> {
        self.documents.get(id)
    }

    /// All documents in insertion order
    pub fn documents(&self) -> impl Iterator<Item = &Arc<DocumentSnapshot>> {
        self.documents.values()
    }

    /// Ids of all documents in insertion order
    pub fn document_ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }

    /// Analyzers supplied by the project's own references
    pub fn analyzer_references(&self) -> &[Arc<dyn DiagnosticAnalyzer>] {
        &self.analyzer_references
    }

    /// Analyzers the project asked to skip
    pub fn skipped_analyzers(&self) -> &HashSet<AnalyzerId> {
        &self.skipped_analyzers
    }

    /// True when the project uses SDK-provided style analyzers that duplicate
    /// host-provided ones
    pub fn uses_sdk_style_analyzers(&self) -> bool {
        self.sdk_style_analyzers
    }

    /// Project-wide diagnostics reported by source generators
    pub fn generator_diagnostics(&self) -> &[Diagnostic] {
        &self.generator_diagnostics
    }

    /// Content checksum over all source and analyzer-config inputs.
    ///
    /// Computed once per snapshot and cached; two snapshots with identical
    /// inputs produce identical checksums regardless of generation.
    pub fn checksum(&self) -> ProjectChecksum {
        *self.checksum.get_or_init(|| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(self.id.as_str().as_bytes());
            for (id, document) in &self.documents {
                hasher.update(id.as_str().as_bytes());
                hasher.update(document.text().as_bytes());
            }
            for line in &self.analyzer_config {
                hasher.update(line.as_bytes());
            }
            for analyzer in &self.analyzer_references {
                hasher.update(analyzer.id().as_str().as_bytes());
            }
            ProjectChecksum(*hasher.finalize().as_bytes())
        })
    }

    /// Derive the snapshot that results from replacing one document's text.
    pub fn with_edited_document(
        &self,
        id: &DocumentId,
        text: impl Into<Arc<str>>,
    ) -> Result<ProjectSnapshot> {
        let document = self
            .document(id)
            .ok_or_else(|| AnalysisError::UnknownDocument {
                document: id.to_string(),
            })?;
        let edited = Arc::new(document.edited(text));
        let mut next = self.derive();
        next.documents.insert(id.clone(), edited);
        Ok(next)
    }

    /// Derive the snapshot that results from adding or replacing a document.
    pub fn with_document(&self, document: DocumentSnapshot) -> ProjectSnapshot {
        let mut next = self.derive();
        next.documents
            .insert(document.id().clone(), Arc::new(document));
        next
    }

    fn derive(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            id: self.id.clone(),
            generation: self.generation + 1,
            documents: self.documents.clone(),
            analyzer_references: self.analyzer_references.clone(),
            analyzer_config: self.analyzer_config.clone(),
            skipped_analyzers: self.skipped_analyzers.clone(),
            sdk_style_analyzers: self.sdk_style_analyzers,
            generator_diagnostics: self.generator_diagnostics.clone(),
            checksum: OnceCell::new(),
        }
    }
}

impl fmt::Debug for ProjectSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectSnapshot")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("documents", &self.documents.len())
            .field("analyzer_references", &self.analyzer_references.len())
            .finish()
    }
}

/// Builder for the initial snapshot of a project
pub struct ProjectSnapshotBuilder {
    id: ProjectId,
    documents: IndexMap<DocumentId, Arc<DocumentSnapshot>>,
    analyzer_references: Vec<Arc<dyn DiagnosticAnalyzer>>,
    analyzer_config: Vec<String>,
    skipped_analyzers: HashSet<AnalyzerId>,
    sdk_style_analyzers: bool,
    generator_diagnostics: Vec<Diagnostic>,
}

impl ProjectSnapshotBuilder {
    /// Add a document
    pub fn document(mut self, document: DocumentSnapshot) -> Self {
        self.documents
            .insert(document.id().clone(), Arc::new(document));
        self
    }

    /// Add a project-supplied analyzer reference
    pub fn analyzer(mut self, analyzer: Arc<dyn DiagnosticAnalyzer>) -> Self {
        self.analyzer_references.push(analyzer);
        self
    }

    /// Add an analyzer-configuration input (participates in the checksum)
    pub fn analyzer_config(mut self, line: impl Into<String>) -> Self {
        self.analyzer_config.push(line.into());
        self
    }

    /// Suppress an analyzer for this project
    pub fn skip_analyzer(mut self, id: AnalyzerId) -> Self {
        self.skipped_analyzers.insert(id);
        self
    }

    /// Mark the project as using SDK-provided style analyzers
    pub fn sdk_style_analyzers(mut self, enabled: bool) -> Self {
        self.sdk_style_analyzers = enabled;
        self
    }

    /// Record a project-wide generator diagnostic
    pub fn generator_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.generator_diagnostics.push(diagnostic);
        self
    }

    /// Finish the snapshot at generation zero
    pub fn build(self) -> ProjectSnapshot {
        ProjectSnapshot {
            id: self.id,
            generation: 0,
            documents: self.documents,
            analyzer_references: self.analyzer_references,
            analyzer_config: self.analyzer_config,
            skipped_analyzers: self.skipped_analyzers,
            sdk_style_analyzers: self.sdk_style_analyzers,
            generator_diagnostics: self.generator_diagnostics,
            checksum: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProjectSnapshot {
        ProjectSnapshot::builder("app")
            .document(DocumentSnapshot::new("a.lm", "fn a() {}"))
            .document(DocumentSnapshot::new("b.lm", "fn b() {}"))
            .analyzer_config("style.indent = 4")
            .build()
    }

    #[test]
    fn checksum_is_content_based() {
        let a = snapshot();
        let b = snapshot();
        assert_eq!(a.checksum(), b.checksum());

        let edited = a
            .with_edited_document(&DocumentId::new("a.lm"), "fn a() { panic() }")
            .unwrap();
        assert_ne!(a.checksum(), edited.checksum());
    }

    #[test]
    fn edits_advance_generation() {
        let a = snapshot();
        let b = a
            .with_edited_document(&DocumentId::new("b.lm"), "fn b() { 1 }")
            .unwrap();
        assert_eq!(a.generation() + 1, b.generation());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn editing_unknown_document_is_an_error() {
        let err = snapshot()
            .with_edited_document(&DocumentId::new("missing.lm"), "")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownDocument { .. }));
    }
}
