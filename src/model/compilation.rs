//! Opaque compilation facade
//!
//! The full binder and type checker live outside this crate. What the engine
//! sees is a sealed `Compilation` built from a project snapshot: the set of
//! documents with their stored compiler output, addressable by document id.
//! Building one is the expensive step the attached-compilation cache exists
//! to amortize.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::diagnostics::Diagnostic;
use crate::model::{DocumentId, DocumentSnapshot, ProjectChecksum, ProjectId, ProjectSnapshot};

/// A compiled view of one project snapshot.
#[derive(Debug)]
pub struct Compilation {
    project_id: ProjectId,
    checksum: ProjectChecksum,
    documents: FxHashMap<DocumentId, Arc<DocumentSnapshot>>,
    document_order: Vec<DocumentId>,
    generator_diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// Compile a project snapshot.
    ///
    /// This walks every document and materializes the per-document index; it
    /// is the unit of work the cache memoizes, so callers should obtain
    /// compilations through the engine rather than constructing them ad hoc.
    pub fn build(project: &ProjectSnapshot) -> Self {
        let mut documents = FxHashMap::default();
        let mut document_order = Vec::new();
        for document in project.documents() {
            documents.insert(document.id().clone(), Arc::clone(document));
            document_order.push(document.id().clone());
        }
        log::debug!(
            "compiled project {} ({} documents, checksum {})",
            project.id(),
            document_order.len(),
            project.checksum()
        );
        Self {
            project_id: project.id().clone(),
            checksum: project.checksum(),
            documents,
            document_order,
            generator_diagnostics: project.generator_diagnostics().to_vec(),
        }
    }

    /// Identity of the compiled project
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Checksum of the snapshot this compilation was built from
    pub fn checksum(&self) -> ProjectChecksum {
        self.checksum
    }

    /// Look up a document by id
    pub fn document(&self, id: &DocumentId) -> Option<&Arc<DocumentSnapshot>> {
        self.documents.get(id)
    }

    /// All documents in project order
    pub fn documents(&self) -> impl Iterator<Item = &Arc<DocumentSnapshot>> {
        self.document_order
            .iter()
            .filter_map(move |id| self.documents.get(id))
    }

    /// Project-wide diagnostics produced by source generators
    pub fn generator_diagnostics(&self) -> &[Diagnostic] {
        &self.generator_diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_indexes_documents() {
        let project = ProjectSnapshot::builder("app")
            .document(DocumentSnapshot::new("a.lm", "fn a() {}"))
            .document(DocumentSnapshot::new("b.lm", "fn b() {}"))
            .build();
        let compilation = Compilation::build(&project);

        assert_eq!(compilation.documents().count(), 2);
        assert!(compilation.document(&DocumentId::new("a.lm")).is_some());
        assert!(compilation.document(&DocumentId::new("c.lm")).is_none());
        assert_eq!(compilation.checksum(), project.checksum());
    }
}
