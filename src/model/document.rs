//! Immutable document snapshots
//!
//! A document snapshot carries the text of one source file together with the
//! outline of its top-level members. The outline is what the member-edit
//! incremental strategy diffs against: an edit confined to one member body
//! invalidates only that member's region.
//!
//! Parsing proper is owned by the syntax subsystem; snapshots therefore also
//! carry any precomputed compiler diagnostics (parse and binding output) that
//! the built-in analyzers surface.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::diagnostics::Diagnostic;
use crate::model::TextSpan;

/// Stable identity of a document across snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a document id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Monotonic version of a document's text
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TextVersion(u64);

impl TextVersion {
    /// The initial version of a newly opened document
    pub const fn initial() -> Self {
        Self(0)
    }

    /// The version following this one
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TextVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Immutable view of one document's compilation inputs
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    id: DocumentId,
    version: TextVersion,
    text: Arc<str>,
    members: Vec<TextSpan>,
    syntax_diagnostics: Vec<Diagnostic>,
    semantic_diagnostics: Vec<Diagnostic>,
    load_error: Option<String>,
}

impl DocumentSnapshot {
    /// Create a snapshot for the given text at the initial version
    pub fn new(id: impl Into<DocumentId>, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let members = member_outline(&text);
        Self {
            id: id.into(),
            version: TextVersion::initial(),
            text,
            members,
            syntax_diagnostics: Vec::new(),
            semantic_diagnostics: Vec::new(),
            load_error: None,
        }
    }

    /// Produce the snapshot that results from replacing the whole text.
    ///
    /// The version advances and any stored compiler diagnostics are dropped,
    /// since they described the previous parse.
    pub fn edited(&self, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let members = member_outline(&text);
        Self {
            id: self.id.clone(),
            version: self.version.next(),
            text,
            members,
            syntax_diagnostics: Vec::new(),
            semantic_diagnostics: Vec::new(),
            load_error: None,
        }
    }

    /// Attach a syntax-level compiler diagnostic (parser output)
    pub fn with_syntax_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.syntax_diagnostics.push(diagnostic);
        self
    }

    /// Attach a semantic-level compiler diagnostic (binder output)
    pub fn with_semantic_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.semantic_diagnostics.push(diagnostic);
        self
    }

    /// Record that the document's content could not be loaded
    pub fn with_load_error(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Stable identity of the document
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Version of this snapshot's text
    pub fn version(&self) -> TextVersion {
        self.version
    }

    /// The document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Spans of the document's top-level members, in source order
    pub fn members(&self) -> &[TextSpan] {
        &self.members
    }

    /// The span covering the entire document
    pub fn full_span(&self) -> TextSpan {
        TextSpan::new(0, self.text.len())
    }

    /// Precomputed syntax-level compiler diagnostics
    pub fn syntax_diagnostics(&self) -> &[Diagnostic] {
        &self.syntax_diagnostics
    }

    /// Precomputed semantic-level compiler diagnostics
    pub fn semantic_diagnostics(&self) -> &[Diagnostic] {
        &self.semantic_diagnostics
    }

    /// Load failure recorded for this document, if any
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }
}

/// One member whose body differs between two snapshots of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberChange {
    /// Index of the member in both outlines
    pub index: usize,
    /// The member's span in the older snapshot
    pub old_span: TextSpan,
    /// The member's span in the newer snapshot
    pub new_span: TextSpan,
}

impl MemberChange {
    /// Byte-length delta this change contributes to later spans
    pub fn delta(&self) -> isize {
        self.new_span.len() as isize - self.old_span.len() as isize
    }
}

/// Compute the minimal set of member-level changes between two snapshots of
/// the same document.
///
/// Returns `None` when the outlines are not comparable (member added or
/// removed), in which case callers fall back to whole-document analysis.
pub fn changed_member_spans(
    old: &DocumentSnapshot,
    new: &DocumentSnapshot,
) -> Option<SmallVec<[MemberChange; 4]>> {
    if old.members.len() != new.members.len() {
        return None;
    }
    let mut changes = SmallVec::new();
    for (index, (old_span, new_span)) in old.members.iter().zip(new.members.iter()).enumerate() {
        let old_text = &old.text[old_span.start..old_span.end];
        let new_text = &new.text[new_span.start..new_span.end];
        if old_text != new_text {
            changes.push(MemberChange {
                index,
                old_span: *old_span,
                new_span: *new_span,
            });
        }
    }
    Some(changes)
}

/// Scan the outline of a document's top-level members.
///
/// A member starts at the first non-whitespace byte after the previous member
/// and ends at the `;` or the `}` that returns brace nesting to the top level.
/// This stands in for the syntax tree's member table; the engine only needs
/// span boundaries, not structure.
fn member_outline(text: &str) -> Vec<TextSpan> {
    let bytes = text.as_bytes();
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start.take() {
                        members.push(TextSpan::new(s, i + 1));
                    }
                }
            }
            b';' if depth == 0 => {
                if let Some(s) = start.take() {
                    members.push(TextSpan::new(s, i + 1));
                }
            }
            _ if !b.is_ascii_whitespace() && start.is_none() => {
                start = Some(i);
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        members.push(TextSpan::new(s, bytes.len()));
    }
    members
}
