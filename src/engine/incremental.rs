//! Member-edit incremental semantic analysis
//!
//! Most edits touch one member body, so semantic diagnostics for the rest of
//! a document are still valid. This layer caches the last computed semantic
//! diagnostics per document and, on the next whole-document request, diffs
//! the member outline against the cached snapshot: diagnostics in unchanged
//! members are spliced from the cache (re-anchored for any length delta),
//! and only the changed member spans are re-analyzed.
//!
//! The strategy applies only to analyzers that support span-based semantic
//! analysis and only to whole-document requests; a sub-span request already
//! narrowed scope and falls through to direct computation.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::analyzer::{AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerRef};
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::engine::driver::AttachedCompilation;
use crate::engine::runner::AnalyzerRunner;
use crate::error::Result;
use crate::model::{changed_member_spans, DocumentId, DocumentSnapshot, MemberChange};

/// Cached semantic diagnostics for one document version.
#[derive(Debug)]
struct CachedDocumentDiagnostics {
    snapshot: Arc<DocumentSnapshot>,
    by_analyzer: FxHashMap<AnalyzerId, Vec<Diagnostic>>,
}

/// Span-scoped caching layer for whole-document semantic analysis.
#[derive(Default)]
pub struct IncrementalMemberEditAnalyzer {
    // Updates for one document are serialized by its entry's mutex; the
    // outer map only hands out entries.
    cache: DashMap<DocumentId, Arc<Mutex<Option<CachedDocumentDiagnostics>>>>,
}

impl IncrementalMemberEditAnalyzer {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute whole-document semantic diagnostics for `analyzers`, reusing
    /// cached diagnostics for members the edit did not touch.
    ///
    /// Every analyzer passed here must support span-based semantic analysis;
    /// the executor routes the rest to plain whole-document computation.
    pub async fn analyze(
        &self,
        document: &Arc<DocumentSnapshot>,
        analyzers: &[AnalyzerRef],
        runner: &AnalyzerRunner,
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        cancellation.ensure_not_cancelled()?;

        let entry = Arc::clone(
            &self
                .cache
                .entry(document.id().clone())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        );
        let mut slot = entry.lock().await;

        let results = match slot.as_ref() {
            Some(cached) if cached.snapshot.version() == document.version() => {
                self.refresh_missing(cached, document, analyzers, runner, attached, cancellation)
                    .await?
            }
            Some(cached) => {
                match changed_member_spans(&cached.snapshot, document) {
                    Some(changes) => {
                        self.reanalyze_changed(
                            cached,
                            document,
                            &changes,
                            analyzers,
                            runner,
                            attached,
                            cancellation,
                        )
                        .await?
                    }
                    // Members were added or removed; the outline is not
                    // comparable and everything is recomputed.
                    None => {
                        self.full(document, analyzers, runner, attached, cancellation)
                            .await?
                    }
                }
            }
            None => {
                self.full(document, analyzers, runner, attached, cancellation)
                    .await?
            }
        };

        *slot = Some(CachedDocumentDiagnostics {
            snapshot: Arc::clone(document),
            by_analyzer: results.clone(),
        });
        Ok(results)
    }

    /// Drop the cached diagnostics for a document (e.g. when it leaves the
    /// project).
    pub fn forget_document(&self, document: &DocumentId) {
        self.cache.remove(document);
    }

    /// Cache hit for the exact version: only analyzers missing from the
    /// cached entry need computing.
    async fn refresh_missing(
        &self,
        cached: &CachedDocumentDiagnostics,
        document: &Arc<DocumentSnapshot>,
        analyzers: &[AnalyzerRef],
        runner: &AnalyzerRunner,
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        let mut results = FxHashMap::default();
        let mut missing = Vec::new();
        for analyzer in analyzers {
            let id = analyzer.id();
            match cached.by_analyzer.get(&id) {
                Some(diagnostics) => {
                    results.insert(id, diagnostics.clone());
                }
                None => missing.push(Arc::clone(analyzer)),
            }
        }
        if !missing.is_empty() {
            let fresh = self
                .full(document, &missing, runner, attached, cancellation)
                .await?;
            results.extend(fresh);
        }
        Ok(results)
    }

    /// Splice cached diagnostics for unchanged members with fresh span
    /// analysis over the changed members.
    #[allow(clippy::too_many_arguments)]
    async fn reanalyze_changed(
        &self,
        cached: &CachedDocumentDiagnostics,
        document: &Arc<DocumentSnapshot>,
        changes: &[MemberChange],
        analyzers: &[AnalyzerRef],
        runner: &AnalyzerRunner,
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        let mut results: FxHashMap<AnalyzerId, Vec<Diagnostic>> = FxHashMap::default();
        let mut covered: Vec<AnalyzerRef> = Vec::new();
        let mut uncached: Vec<AnalyzerRef> = Vec::new();

        for analyzer in analyzers {
            match cached.by_analyzer.get(&analyzer.id()) {
                Some(diagnostics) => {
                    results.insert(analyzer.id(), reusable(diagnostics, changes));
                    covered.push(Arc::clone(analyzer));
                }
                None => uncached.push(Arc::clone(analyzer)),
            }
        }

        // Analyzers with no cached baseline run over the whole document.
        if !uncached.is_empty() {
            let fresh = self
                .full(document, &uncached, runner, attached, cancellation)
                .await?;
            results.extend(fresh);
        }

        if covered.is_empty() {
            return Ok(results);
        }
        for change in changes {
            let scope = AnalysisScope::document_span(
                document.id().clone(),
                change.new_span,
                AnalysisKind::Semantic,
            );
            let run = runner
                .analyze_document(&scope, &covered, attached, cancellation)
                .await?;
            for analyzer in &covered {
                let id = analyzer.id();
                let fresh =
                    run.local_diagnostics(&id, document.id(), AnalysisKind::Semantic);
                merge_deduplicated(results.entry(id).or_default(), fresh);
            }
        }

        Ok(results)
    }

    async fn full(
        &self,
        document: &Arc<DocumentSnapshot>,
        analyzers: &[AnalyzerRef],
        runner: &AnalyzerRunner,
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, Vec<Diagnostic>>> {
        let scope = AnalysisScope::document(document.id().clone(), AnalysisKind::Semantic);
        let run = runner
            .analyze_document(&scope, analyzers, attached, cancellation)
            .await?;
        let mut results = FxHashMap::default();
        for analyzer in analyzers {
            let id = analyzer.id();
            let diagnostics = run
                .local_diagnostics(&id, document.id(), AnalysisKind::Semantic)
                .to_vec();
            results.insert(id, diagnostics);
        }
        Ok(results)
    }
}

/// Cached diagnostics that survive the given changes, re-anchored by the
/// accumulated length delta of changes before them. Diagnostics touching a
/// changed member, and diagnostics with no span at all, are invalidated; the
/// fresh span passes regenerate them.
fn reusable(cached: &[Diagnostic], changes: &[MemberChange]) -> Vec<Diagnostic> {
    cached
        .iter()
        .filter_map(|diagnostic| {
            let span = diagnostic.span?;
            if changes.iter().any(|c| span.intersects(&c.old_span)) {
                return None;
            }
            let delta: isize = changes
                .iter()
                .filter(|c| c.old_span.end <= span.start)
                .map(MemberChange::delta)
                .sum();
            Some(diagnostic.shifted(delta))
        })
        .collect()
}

/// Append `fresh` diagnostics, dropping exact duplicates already present
/// (a span-less diagnostic can be reported by more than one span pass).
fn merge_deduplicated(into: &mut Vec<Diagnostic>, fresh: &[Diagnostic]) {
    for diagnostic in fresh {
        if !into.contains(diagnostic) {
            into.push(diagnostic.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextSpan;

    fn diag(id: &str, span: TextSpan) -> Diagnostic {
        Diagnostic::warning(id, "w").with_location(DocumentId::new("a.lm"), span)
    }

    #[test]
    fn reuse_drops_diagnostics_in_changed_members() {
        let changes = [MemberChange {
            index: 1,
            old_span: TextSpan::new(20, 40),
            new_span: TextSpan::new(20, 44),
        }];
        let cached = vec![diag("before", TextSpan::new(5, 10)), diag("inside", TextSpan::new(25, 30))];
        let reused = reusable(&cached, &changes);
        assert_eq!(reused.len(), 1);
        assert_eq!(reused[0].id, "before");
    }

    #[test]
    fn reuse_shifts_diagnostics_after_the_edit() {
        let changes = [MemberChange {
            index: 0,
            old_span: TextSpan::new(0, 10),
            new_span: TextSpan::new(0, 16),
        }];
        let cached = vec![diag("after", TextSpan::new(20, 24))];
        let reused = reusable(&cached, &changes);
        assert_eq!(reused[0].span, Some(TextSpan::new(26, 30)));
    }

    #[test]
    fn spanless_cached_diagnostics_are_invalidated() {
        let changes = [MemberChange {
            index: 0,
            old_span: TextSpan::new(0, 10),
            new_span: TextSpan::new(0, 10),
        }];
        let cached =
            vec![Diagnostic::warning("loose", "w").with_document(DocumentId::new("a.lm"))];
        assert!(reusable(&cached, &changes).is_empty());
    }
}
