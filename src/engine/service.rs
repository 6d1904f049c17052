//! The diagnostic service: top-level orchestration and public API
//!
//! For each request the service resolves the project's analyzers through
//! `HostAnalyzerInfo`, obtains the cached attached compilation, lets the
//! scheduler filter the set, and folds the diagnostics coming back from the
//! executor into one response. Whole-project "force analyze" passes fan out
//! across documents in parallel and their results are cached by checksum so
//! later project queries over a subset of analyzers reuse them.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use rustc_hash::FxHashMap;

use crate::analyzer::{
    AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerRef, AnalyzerSet,
    CompilerDiagnosticsAnalyzer, FileContentLoadAnalyzer, GeneratorDiagnosticsAnalyzer,
    HostAnalyzerInfo, TelemetryReporter,
};
use crate::cancellation::CancellationToken;
use crate::diagnostics::{Diagnostic, DiagnosticAnalysisResult, DiagnosticResultBuilder};
use crate::engine::cache::{CacheStats, CompilationCache};
use crate::engine::driver::{AttachOptions, AttachedCompilation};
use crate::engine::executor::DocumentAnalysisExecutor;
use crate::engine::incremental::IncrementalMemberEditAnalyzer;
use crate::engine::runner::{AnalyzerRunResult, AnalyzerRunner, RemoteAnalyzerClient};
use crate::engine::scheduler::PriorityScheduler;
use crate::engine::{EngineSettings, RequestPriority};
use crate::error::{AnalysisError, Result};
use crate::model::{DocumentId, ProjectChecksum, ProjectId, ProjectSnapshot, TextSpan};

/// Diagnostics for one span request plus the analyzers deferred out of it.
#[derive(Debug, Default)]
pub struct SpanAnalysisResult {
    /// Diagnostics that intersect the requested span, in analyzer order
    pub diagnostics: Vec<Diagnostic>,
    /// Analyzers deferred to a subsequent Low-priority request
    pub deferred_analyzers: Vec<AnalyzerId>,
}

/// Parameters of a whole-project diagnostics query.
#[derive(Debug, Clone)]
pub struct ProjectDiagnosticsRequest {
    /// Restrict to these analyzers; `None` runs every active analyzer
    pub analyzer_ids: Option<HashSet<AnalyzerId>>,
    /// Restrict to these diagnostic ids; `None` accepts all
    pub diagnostic_ids: Option<HashSet<String>>,
    /// Restrict to these documents; `None` covers the whole project and
    /// enables project-wide diagnostics
    pub document_ids: Option<Vec<DocumentId>>,
    /// Fold in local (syntax + semantic) diagnostics
    pub include_local: bool,
    /// Fold in non-local diagnostics
    pub include_non_local: bool,
    /// Fold in project-wide diagnostics (only when no documents were
    /// targeted)
    pub include_project_wide: bool,
}

impl Default for ProjectDiagnosticsRequest {
    fn default() -> Self {
        Self {
            analyzer_ids: None,
            diagnostic_ids: None,
            document_ids: None,
            include_local: true,
            include_non_local: true,
            include_project_wide: true,
        }
    }
}

struct ForceAnalysisEntry {
    checksum: ProjectChecksum,
    analyzer_ids: HashSet<AnalyzerId>,
    results: Arc<FxHashMap<AnalyzerId, DiagnosticAnalysisResult>>,
}

/// The engine's public entry point.
pub struct DiagnosticService {
    host_analyzers: Vec<AnalyzerRef>,
    sdk_style_duplicates: HashSet<AnalyzerId>,
    settings: EngineSettings,
    cache: Arc<CompilationCache>,
    runner: Arc<AnalyzerRunner>,
    executor: DocumentAnalysisExecutor,
    incremental: Arc<IncrementalMemberEditAnalyzer>,
    telemetry: Arc<TelemetryReporter>,
    force_analysis: DashMap<ProjectId, ForceAnalysisEntry>,
}

impl DiagnosticService {
    /// Start building a service
    pub fn builder() -> DiagnosticServiceBuilder {
        DiagnosticServiceBuilder::default()
    }

    /// Host/project classification for one project, with the project's
    /// suppression list already applied
    pub fn host_info_for(&self, project: &ProjectSnapshot) -> HostAnalyzerInfo {
        HostAnalyzerInfo::for_project(&self.host_analyzers, project, &self.sdk_style_duplicates)
    }

    /// Diagnostics for a document span.
    ///
    /// `span == None` requests the whole document. At Normal priority with an
    /// explicit span, expensive analyzers may be deferred; their ids come
    /// back in [`SpanAnalysisResult::deferred_analyzers`] and a follow-up
    /// request at `RequestPriority::Low` picks them up.
    pub async fn diagnostics_for_span(
        &self,
        project: &ProjectSnapshot,
        document: &DocumentId,
        span: Option<TextSpan>,
        diagnostic_ids: Option<&HashSet<String>>,
        priority: RequestPriority,
        kind: AnalysisKind,
        cancellation: &CancellationToken,
    ) -> Result<SpanAnalysisResult> {
        cancellation.ensure_not_cancelled()?;
        if project.document(document).is_none() {
            return Err(AnalysisError::UnknownDocument {
                document: document.to_string(),
            });
        }

        let host_info = self.host_info_for(project);
        let ordered = host_info.ordered_all_analyzers();
        let Some(attached) = self
            .attach(project, &ordered, &host_info, cancellation)
            .await?
        else {
            return Ok(SpanAnalysisResult::default());
        };

        let eligible: Vec<AnalyzerRef> = ordered
            .into_iter()
            .filter(|a| !a.is_placeholder() && a.supports_kind(kind))
            .collect();
        let scope = match span {
            Some(span) => AnalysisScope::document_span(document.clone(), span, kind),
            None => AnalysisScope::document(document.clone(), kind),
        };
        let decision =
            PriorityScheduler::partition(&eligible, &scope, priority, &attached, &self.settings);

        let per_analyzer = self
            .executor
            .compute(project, &scope, &decision.run_now, &attached, cancellation)
            .await?;

        let mut diagnostics = Vec::new();
        for analyzer in &decision.run_now {
            let Some(found) = per_analyzer.get(&analyzer.id()) else {
                continue;
            };
            for diagnostic in found {
                if let Some(span) = &span {
                    if !diagnostic.intersects(span) {
                        continue;
                    }
                }
                if include_id(diagnostic_ids, &diagnostic.id) {
                    diagnostics.push(diagnostic.clone());
                }
            }
        }

        Ok(SpanAnalysisResult {
            diagnostics,
            deferred_analyzers: decision.deferred,
        })
    }

    /// Run every active analyzer over the whole project and cache the result
    /// map for reuse by later [`project_diagnostics`](Self::project_diagnostics)
    /// calls against the same checksum.
    pub async fn force_analyze_project(
        &self,
        project: &ProjectSnapshot,
        cancellation: &CancellationToken,
    ) -> Result<Arc<FxHashMap<AnalyzerId, DiagnosticAnalysisResult>>> {
        let host_info = self.host_info_for(project);
        let ordered = host_info.ordered_all_analyzers();
        let analyzers: Vec<AnalyzerRef> = ordered
            .into_iter()
            .filter(|a| !a.is_placeholder())
            .collect();

        let results = match self
            .attach(project, &analyzers, &host_info, cancellation)
            .await?
        {
            Some(attached) => Arc::new(
                self.compute_project_results(project, &analyzers, &attached, cancellation)
                    .await?,
            ),
            None => Arc::new(FxHashMap::default()),
        };

        self.force_analysis.insert(
            project.id().clone(),
            ForceAnalysisEntry {
                checksum: project.checksum(),
                analyzer_ids: analyzers.iter().map(|a| a.id()).collect(),
                results: Arc::clone(&results),
            },
        );
        log::debug!(
            "force analysis of {} complete: {} analyzers",
            project.id(),
            results.len()
        );
        Ok(results)
    }

    /// Whole-project diagnostics, folded across the requested analyzers,
    /// documents and buckets.
    ///
    /// When a prior force-analysis pass for the same checksum covers a
    /// superset of the requested analyzers its cached results are reused; a
    /// checksum mismatch is treated as a plain cache miss and recomputed.
    pub async fn project_diagnostics(
        &self,
        project: &ProjectSnapshot,
        request: &ProjectDiagnosticsRequest,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        cancellation.ensure_not_cancelled()?;

        let host_info = self.host_info_for(project);
        let candidates: Vec<AnalyzerRef> = host_info
            .ordered_all_analyzers()
            .into_iter()
            .filter(|a| !a.is_placeholder())
            .filter(|a| {
                request
                    .analyzer_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&a.id()))
            })
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let candidate_ids: HashSet<AnalyzerId> = candidates.iter().map(|a| a.id()).collect();

        let reused = self.force_analysis.get(project.id()).and_then(|entry| {
            let valid = entry.checksum == project.checksum()
                && candidate_ids.is_subset(&entry.analyzer_ids);
            valid.then(|| Arc::clone(&entry.results))
        });

        let results = match reused {
            Some(results) => results,
            None => match self
                .attach(project, &candidates, &host_info, cancellation)
                .await?
            {
                Some(attached) => Arc::new(
                    self.compute_project_results(project, &candidates, &attached, cancellation)
                        .await?,
                ),
                None => return Ok(Vec::new()),
            },
        };

        let target_documents: Vec<DocumentId> = match &request.document_ids {
            Some(ids) => ids.clone(),
            None => project.document_ids().cloned().collect(),
        };

        let ids = request.diagnostic_ids.as_ref();
        let mut diagnostics = Vec::new();
        for analyzer in &candidates {
            let Some(result) = results.get(&analyzer.id()) else {
                continue;
            };
            for document in &target_documents {
                let Some(buckets) = result.document(document) else {
                    continue;
                };
                if request.include_local {
                    diagnostics.extend(buckets.local().filter(|d| include_id(ids, &d.id)).cloned());
                }
                if request.include_non_local {
                    diagnostics.extend(
                        buckets
                            .non_local
                            .iter()
                            .filter(|d| include_id(ids, &d.id))
                            .cloned(),
                    );
                }
            }
            if request.include_project_wide && request.document_ids.is_none() {
                diagnostics.extend(
                    result
                        .other()
                        .iter()
                        .filter(|d| include_id(ids, &d.id))
                        .cloned(),
                );
            }
        }
        Ok(diagnostics)
    }

    /// Every analyzer active for the project, in execution order.
    /// Test and diagnostic hook only.
    pub fn analyzers_for_testing(&self, project: &ProjectSnapshot) -> Vec<AnalyzerRef> {
        self.host_info_for(project).ordered_all_analyzers()
    }

    /// Evict everything cached for a retired project.
    pub fn retire_project_state(&self, project: &ProjectId) {
        self.cache.retire_project_state(project);
        self.force_analysis.remove(project);
    }

    /// Drop incremental state for a document that left the project.
    pub fn forget_document(&self, document: &DocumentId) {
        self.incremental.forget_document(document);
    }

    /// The telemetry reporter (exposes the test drain hook)
    pub fn telemetry(&self) -> &Arc<TelemetryReporter> {
        &self.telemetry
    }

    /// Hit/miss counters of the attached-compilation cache
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn attach(
        &self,
        project: &ProjectSnapshot,
        analyzers: &[AnalyzerRef],
        host_info: &HostAnalyzerInfo,
        cancellation: &CancellationToken,
    ) -> Result<Option<Arc<AttachedCompilation>>> {
        let set = AnalyzerSet::new(analyzers.iter().cloned());
        let options = AttachOptions {
            concurrent: false,
            crash_on_analyzer_exception: self.settings.crash_on_analyzer_exception,
        };
        self.cache
            .get_or_create(project, &set, host_info, options, cancellation)
            .await
    }

    /// Compute full results for the given analyzers: per-document syntax and
    /// semantic passes fanned out in parallel, then one project pass.
    async fn compute_project_results(
        &self,
        project: &ProjectSnapshot,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<FxHashMap<AnalyzerId, DiagnosticAnalysisResult>> {
        let mut builders: FxHashMap<AnalyzerId, DiagnosticResultBuilder> = analyzers
            .iter()
            .map(|a| (a.id(), DiagnosticResultBuilder::new()))
            .collect();

        // Documents are independent; fan out across them while analyzer
        // execution inside the attached compilation stays sequential.
        let document_ids: Vec<DocumentId> = project.document_ids().cloned().collect();
        let mut passes = futures::stream::iter(document_ids.into_iter().map(|document_id| {
            let runner = Arc::clone(&self.runner);
            let attached = Arc::clone(attached);
            let analyzers = analyzers.to_vec();
            let cancellation = cancellation.clone();
            async move {
                let mut partials: Vec<AnalyzerRunResult> = Vec::new();
                for kind in [AnalysisKind::Syntax, AnalysisKind::Semantic] {
                    let scope = AnalysisScope::document(document_id.clone(), kind);
                    partials.push(
                        runner
                            .analyze_document(&scope, &analyzers, &attached, &cancellation)
                            .await?,
                    );
                }
                Ok::<Vec<AnalyzerRunResult>, AnalysisError>(partials)
            }
        }))
        .buffer_unordered(self.settings.max_parallel_documents.max(1));

        while let Some(outcome) = passes.next().await {
            for run in outcome? {
                for (id, result) in run.results {
                    builders.entry(id).or_default().absorb(result);
                }
            }
        }

        let project_run = self
            .runner
            .analyze_project(analyzers, attached, cancellation)
            .await?;
        for (id, result) in project_run.results {
            builders.entry(id).or_default().absorb(result);
        }

        Ok(builders
            .into_iter()
            .map(|(id, builder)| (id, builder.freeze()))
            .collect())
    }
}

/// Uniform id-based inclusion predicate applied to cached and fresh
/// diagnostics alike.
fn include_id(ids: Option<&HashSet<String>>, id: &str) -> bool {
    ids.map_or(true, |set| set.contains(id))
}

/// Builder for a [`DiagnosticService`].
#[derive(Default)]
pub struct DiagnosticServiceBuilder {
    host_analyzers: Vec<AnalyzerRef>,
    sdk_style_duplicates: HashSet<AnalyzerId>,
    remote: Option<Arc<dyn RemoteAnalyzerClient>>,
    settings: EngineSettings,
}

impl DiagnosticServiceBuilder {
    /// Register a host-supplied analyzer
    pub fn host_analyzer(mut self, analyzer: AnalyzerRef) -> Self {
        self.host_analyzers.push(analyzer);
        self
    }

    /// Mark a host analyzer id as duplicated by SDK-provided style analyzers
    pub fn sdk_style_duplicate(mut self, id: AnalyzerId) -> Self {
        self.sdk_style_duplicates.insert(id);
        self
    }

    /// Route analysis to a remote execution host
    pub fn remote_client(mut self, client: Arc<dyn RemoteAnalyzerClient>) -> Self {
        self.remote = Some(client);
        self
    }

    /// Override the engine settings
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish the service. The platform's built-in analyzers (compiler,
    /// file-content-load, generator diagnostics) are always registered.
    pub fn build(self) -> DiagnosticService {
        let mut host_analyzers: Vec<AnalyzerRef> = vec![
            Arc::new(CompilerDiagnosticsAnalyzer) as AnalyzerRef,
            Arc::new(FileContentLoadAnalyzer),
            Arc::new(GeneratorDiagnosticsAnalyzer),
        ];
        host_analyzers.extend(self.host_analyzers);

        let telemetry = Arc::new(TelemetryReporter::new(self.settings.report_telemetry));
        let runner = Arc::new(AnalyzerRunner::new(
            self.remote,
            Arc::clone(&telemetry),
            self.settings.clone(),
        ));
        let incremental = Arc::new(IncrementalMemberEditAnalyzer::new());
        let executor =
            DocumentAnalysisExecutor::new(Arc::clone(&runner), Arc::clone(&incremental));

        DiagnosticService {
            host_analyzers,
            sdk_style_duplicates: self.sdk_style_duplicates,
            settings: self.settings,
            cache: Arc::new(CompilationCache::new()),
            runner,
            executor,
            incremental,
            telemetry,
            force_analysis: DashMap::new(),
        }
    }
}
