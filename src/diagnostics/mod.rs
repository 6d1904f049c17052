//! Diagnostic types produced by analyzers
//!
//! A diagnostic is identified by a stable code (`LM0001`, `STYLE0004`, ...),
//! carries a severity and message, and is optionally anchored to a span in a
//! specific document. Diagnostics without a precise anchor are either
//! non-local (attributable to a document but not a span) or project-wide.

pub mod result;

pub use result::{DiagnosticAnalysisResult, DiagnosticResultBuilder, DocumentDiagnostics};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{DocumentId, TextSpan};

/// How serious a diagnostic is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// Informational hint, usually rendered subtly
    Hint,
    /// Informational message
    Info,
    /// Something suspicious that does not block compilation
    Warning,
    /// A definite problem
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Hint => "hint",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// One diagnostic produced by an analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code, used by id-based filtering
    pub id: String,
    /// Human-readable message
    pub message: String,
    /// Severity of the diagnostic
    pub severity: Severity,
    /// Document the diagnostic is attributed to, if any
    pub document: Option<DocumentId>,
    /// Precise span within the document, if known
    pub span: Option<TextSpan>,
}

impl Diagnostic {
    /// Create a diagnostic with the given severity
    pub fn new(id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            severity,
            document: None,
            span: None,
        }
    }

    /// Create an error diagnostic
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, message, Severity::Error)
    }

    /// Create a warning diagnostic
    pub fn warning(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, message, Severity::Warning)
    }

    /// Anchor the diagnostic to a span in a document
    pub fn with_location(mut self, document: DocumentId, span: TextSpan) -> Self {
        self.document = Some(document);
        self.span = Some(span);
        self
    }

    /// Attribute the diagnostic to a document without a precise span
    pub fn with_document(mut self, document: DocumentId) -> Self {
        self.document = Some(document);
        self
    }

    /// True when the diagnostic's span intersects `span`.
    ///
    /// Diagnostics without a span are considered to intersect everything in
    /// their document, matching how span-scoped requests surface them.
    pub fn intersects(&self, span: &TextSpan) -> bool {
        match &self.span {
            Some(own) => own.intersects(span),
            None => true,
        }
    }

    /// Shift the diagnostic's span by a signed byte delta, if it has one
    pub fn shifted(&self, delta: isize) -> Diagnostic {
        let mut shifted = self.clone();
        shifted.span = self.span.map(|s| s.shifted(delta));
        shifted
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.id, self.message)?;
        if let (Some(document), Some(span)) = (&self.document, &self.span) {
            write!(f, " at {document}{span}")?;
        }
        Ok(())
    }
}
