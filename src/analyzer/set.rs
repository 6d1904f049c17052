//! Ordered, deduplicated analyzer collections
//!
//! An `AnalyzerSet` keeps its analyzers in a deterministic execution order
//! but identifies itself order-insensitively: the set `[A, B]` and the set
//! `[B, A]` carry the same fingerprint and hit the same cache entry.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::analyzer::{AnalyzerId, AnalyzerRef};

/// Order-insensitive identity of an analyzer set, usable as a cache key.
#[derive(Debug, Clone)]
pub struct AnalyzerSetFingerprint {
    sorted_ids: Arc<[AnalyzerId]>,
    hash: u64,
}

impl AnalyzerSetFingerprint {
    fn from_ids(mut ids: Vec<AnalyzerId>) -> Self {
        ids.sort();
        let mut hasher = FxHasher::default();
        for id in &ids {
            id.hash(&mut hasher);
        }
        Self {
            sorted_ids: ids.into(),
            hash: hasher.finish(),
        }
    }

    /// The analyzer ids in sorted order
    pub fn sorted_ids(&self) -> &[AnalyzerId] {
        &self.sorted_ids
    }
}

impl PartialEq for AnalyzerSetFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_ids == other.sorted_ids
    }
}

impl Eq for AnalyzerSetFingerprint {}

impl Hash for AnalyzerSetFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// An ordered, deduplicated collection of analyzers for one project snapshot.
#[derive(Clone)]
pub struct AnalyzerSet {
    analyzers: Vec<AnalyzerRef>,
    fingerprint: AnalyzerSetFingerprint,
}

impl AnalyzerSet {
    /// Build a set from the given analyzers, dropping duplicate ids while
    /// preserving first-occurrence order.
    pub fn new(analyzers: impl IntoIterator<Item = AnalyzerRef>) -> Self {
        let mut seen = Vec::new();
        let mut deduped: Vec<AnalyzerRef> = Vec::new();
        for analyzer in analyzers {
            let id = analyzer.id();
            if !seen.contains(&id) {
                seen.push(id);
                deduped.push(analyzer);
            }
        }
        let fingerprint = AnalyzerSetFingerprint::from_ids(seen);
        Self {
            analyzers: deduped,
            fingerprint,
        }
    }

    /// The empty set
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Analyzers in execution order
    pub fn iter(&self) -> impl Iterator<Item = &AnalyzerRef> {
        self.analyzers.iter()
    }

    /// Number of analyzers in the set
    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    /// True when the set holds no analyzers
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// True when an analyzer with the given id is present
    pub fn contains(&self, id: &AnalyzerId) -> bool {
        self.fingerprint.sorted_ids.binary_search(id).is_ok()
    }

    /// Look up an analyzer by id
    pub fn get(&self, id: &AnalyzerId) -> Option<&AnalyzerRef> {
        self.analyzers.iter().find(|a| &a.id() == id)
    }

    /// Order-insensitive identity of the set
    pub fn fingerprint(&self) -> &AnalyzerSetFingerprint {
        &self.fingerprint
    }

    /// Ids in execution order
    pub fn ids(&self) -> impl Iterator<Item = AnalyzerId> + '_ {
        self.analyzers.iter().map(|a| a.id())
    }
}

impl PartialEq for AnalyzerSet {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for AnalyzerSet {}

impl Hash for AnalyzerSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl FromIterator<AnalyzerRef> for AnalyzerSet {
    fn from_iter<I: IntoIterator<Item = AnalyzerRef>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Debug for AnalyzerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisKind, AnalysisScope, DiagnosticAnalyzer};
    use crate::cancellation::CancellationToken;
    use crate::diagnostics::Diagnostic;
    use crate::error::Result;
    use crate::model::Compilation;
    use async_trait::async_trait;
    use std::collections::hash_map::DefaultHasher;

    struct Named(&'static str);

    #[async_trait]
    impl DiagnosticAnalyzer for Named {
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
            Ok(Vec::new())
        }
    }

    fn named(id: &'static str) -> AnalyzerRef {
        Arc::new(Named(id))
    }

    fn hash_of(set: &AnalyzerSet) -> u64 {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_and_hash_ignore_order() {
        let ab = AnalyzerSet::new([named("a"), named("b")]);
        let ba = AnalyzerSet::new([named("b"), named("a")]);
        assert_eq!(ab, ba);
        assert_eq!(hash_of(&ab), hash_of(&ba));
    }

    #[test]
    fn execution_order_is_first_occurrence() {
        let set = AnalyzerSet::new([named("b"), named("a"), named("b")]);
        let ids: Vec<_> = set.ids().map(|id| id.as_str().to_string()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn different_membership_differs() {
        let ab = AnalyzerSet::new([named("a"), named("b")]);
        let abc = AnalyzerSet::new([named("a"), named("b"), named("c")]);
        assert_ne!(ab, abc);
        assert!(abc.contains(&AnalyzerId::new("c")));
        assert!(!ab.contains(&AnalyzerId::new("c")));
    }
}
