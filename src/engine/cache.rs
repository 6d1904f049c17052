//! Single-flight cache of attached compilations
//!
//! Attaching an analyzer set to a project snapshot requires a full
//! compilation, so the result is memoized per project state, keyed by
//! (content checksum, analyzer-set fingerprint) with order-insensitive
//! analyzer-set equality. Concurrent identical requests share one
//! computation: the global lock is held only while inserting the lazy cell,
//! never while the expensive construction runs.
//!
//! Project states are explicitly retired rather than weakly collected:
//! entries are keyed by (project id, generation) and evicted when the caller
//! signals that a project state is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, OnceCell};

use crate::analyzer::{AnalyzerRef, AnalyzerSet, AnalyzerSetFingerprint, HostAnalyzerInfo};
use crate::cancellation::CancellationToken;
use crate::engine::driver::{AttachOptions, AttachedCompilation};
use crate::error::Result;
use crate::model::{Compilation, ProjectChecksum, ProjectId, ProjectSnapshot};

type DriverCell = Arc<OnceCell<Option<Arc<AttachedCompilation>>>>;
type EntryKey = (ProjectChecksum, AnalyzerSetFingerprint);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProjectStateKey {
    project: ProjectId,
    generation: u64,
}

/// Hit/miss counters for the attached-compilation cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered by an existing entry
    pub hits: u64,
    /// Requests that created a new entry
    pub misses: u64,
}

/// Memoizes attached compilations per project state.
pub struct CompilationCache {
    entries: DashMap<ProjectStateKey, FxHashMap<EntryKey, DriverCell>>,
    // Guards only the insert-or-fetch of a lazy cell.
    gate: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for CompilationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            gate: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get or create the attached compilation for `(project, analyzers)`.
    ///
    /// Returns `None` when, after filtering workspace placeholders, no real
    /// analyzer remains; attaching an empty set is wasted work downstream.
    /// A canceled waiter does not invalidate the computation for others.
    pub async fn get_or_create(
        &self,
        project: &ProjectSnapshot,
        analyzers: &AnalyzerSet,
        host_info: &HostAnalyzerInfo,
        options: AttachOptions,
        cancellation: &CancellationToken,
    ) -> Result<Option<Arc<AttachedCompilation>>> {
        cancellation.ensure_not_cancelled()?;

        let state_key = ProjectStateKey {
            project: project.id().clone(),
            generation: project.generation(),
        };
        let entry_key = (project.checksum(), analyzers.fingerprint().clone());

        let cell: DriverCell = {
            let _gate = self.gate.lock().await;
            let mut entries = self.entries.entry(state_key).or_default();
            if let Some(existing) = entries.get(&entry_key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(existing)
            } else {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let cell: DriverCell = Arc::new(OnceCell::new());
                entries.insert(entry_key, Arc::clone(&cell));
                cell
            }
        };

        // Single-flight: concurrent identical requests share this
        // computation without holding the gate.
        let attached = cell
            .get_or_try_init(|| attach(project, analyzers, host_info, options, cancellation))
            .await?;
        Ok(attached.clone())
    }

    /// Evict every entry belonging to the given project.
    pub fn retire_project_state(&self, project: &ProjectId) {
        self.entries.retain(|key, _| &key.project != project);
    }

    /// Evict entries for one superseded generation of a project.
    pub fn retire_generation(&self, project: &ProjectId, generation: u64) {
        self.entries.remove(&ProjectStateKey {
            project: project.clone(),
            generation,
        });
    }

    /// Current hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// The memoized computation: split the set into project and host groups,
/// drop placeholders, and build the compilation.
async fn attach(
    project: &ProjectSnapshot,
    analyzers: &AnalyzerSet,
    host_info: &HostAnalyzerInfo,
    options: AttachOptions,
    cancellation: &CancellationToken,
) -> Result<Option<Arc<AttachedCompilation>>> {
    cancellation.ensure_not_cancelled()?;

    let real: Vec<AnalyzerRef> = analyzers
        .iter()
        .filter(|analyzer| !analyzer.is_placeholder())
        .cloned()
        .collect();
    if real.is_empty() {
        log::debug!(
            "no real analyzers for project {}, skipping attachment",
            project.id()
        );
        return Ok(None);
    }

    let (project_set, host_set) = host_info.split(&AnalyzerSet::new(real));
    let compilation = Arc::new(Compilation::build(project));
    cancellation.ensure_not_cancelled()?;

    Ok(Some(Arc::new(AttachedCompilation::new(
        compilation,
        project_set,
        host_set,
        options,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{
        AnalysisKind, AnalysisScope, AnalyzerId, DiagnosticAnalyzer,
    };
    use crate::diagnostics::Diagnostic;
    use crate::model::DocumentSnapshot;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct Plain(&'static str);

    #[async_trait]
    impl DiagnosticAnalyzer for Plain {
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

    struct Placeholder;

    #[async_trait]
    impl DiagnosticAnalyzer for Placeholder {
        fn id(&self) -> AnalyzerId {
            AnalyzerId::new("workspace.placeholder")
        }

        fn supports_kind(&self, _kind: AnalysisKind) -> bool {
            false
        }

        fn is_placeholder(&self) -> bool {
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

    fn project() -> ProjectSnapshot {
        ProjectSnapshot::builder("app")
            .document(DocumentSnapshot::new("a.lm", "fn a() {}"))
            .build()
    }

    fn info_for(project: &ProjectSnapshot, analyzers: &[AnalyzerRef]) -> HostAnalyzerInfo {
        HostAnalyzerInfo::for_project(analyzers, project, &HashSet::new())
    }

    #[tokio::test]
    async fn identical_requests_share_one_driver() {
        let cache = CompilationCache::new();
        let project = project();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(Plain("a")), Arc::new(Plain("b"))];
        let info = info_for(&project, &analyzers);
        let set = AnalyzerSet::new(analyzers.clone());
        let token = CancellationToken::new();

        let first = cache
            .get_or_create(&project, &set, &info, AttachOptions::default(), &token)
            .await
            .unwrap()
            .unwrap();
        let second = cache
            .get_or_create(&project, &set, &info, AttachOptions::default(), &token)
            .await
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn reordered_sets_hit_the_same_entry() {
        let cache = CompilationCache::new();
        let project = project();
        let a: AnalyzerRef = Arc::new(Plain("a"));
        let b: AnalyzerRef = Arc::new(Plain("b"));
        let analyzers = vec![Arc::clone(&a), Arc::clone(&b)];
        let info = info_for(&project, &analyzers);
        let token = CancellationToken::new();

        let ab = cache
            .get_or_create(
                &project,
                &AnalyzerSet::new([Arc::clone(&a), Arc::clone(&b)]),
                &info,
                AttachOptions::default(),
                &token,
            )
            .await
            .unwrap()
            .unwrap();
        let ba = cache
            .get_or_create(
                &project,
                &AnalyzerSet::new([b, a]),
                &info,
                AttachOptions::default(),
                &token,
            )
            .await
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&ab, &ba));
    }

    #[tokio::test]
    async fn placeholder_only_sets_attach_nothing() {
        let cache = CompilationCache::new();
        let project = project();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(Placeholder)];
        let info = info_for(&project, &analyzers);
        let attached = cache
            .get_or_create(
                &project,
                &AnalyzerSet::new(analyzers),
                &info,
                AttachOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(attached.is_none());
    }

    #[tokio::test]
    async fn canceled_waiter_does_not_poison_the_entry() {
        let cache = CompilationCache::new();
        let project = project();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(Plain("a"))];
        let info = info_for(&project, &analyzers);
        let set = AnalyzerSet::new(analyzers);

        let canceled = CancellationToken::new();
        canceled.cancel();
        let err = cache
            .get_or_create(&project, &set, &info, AttachOptions::default(), &canceled)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());

        let attached = cache
            .get_or_create(
                &project,
                &set,
                &info,
                AttachOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(attached.is_some());
    }

    #[tokio::test]
    async fn retiring_a_project_state_evicts_its_drivers() {
        let cache = CompilationCache::new();
        let project = project();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(Plain("a"))];
        let info = info_for(&project, &analyzers);
        let set = AnalyzerSet::new(analyzers);
        let token = CancellationToken::new();

        let first = cache
            .get_or_create(&project, &set, &info, AttachOptions::default(), &token)
            .await
            .unwrap()
            .unwrap();
        cache.retire_project_state(project.id());
        let second = cache
            .get_or_create(&project, &set, &info, AttachOptions::default(), &token)
            .await
            .unwrap()
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
