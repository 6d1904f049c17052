//! In-process and remote analyzer execution
//!
//! Every per-document and per-project analysis funnels through
//! `AnalyzerRunner`: when a remote execution host is configured the request
//! is serialized and shipped there, otherwise each analyzer runs locally
//! against the attached compilation. Results and telemetry come back in the
//! same shape either way.
//!
//! A failed or absent remote response yields an *empty* result for the
//! request; the runner never falls back to local execution on its own.

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::analyzer::{
    AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerRef, AnalyzerTelemetryInfo,
    TelemetryReporter,
};
use crate::cancellation::CancellationToken;
use crate::diagnostics::{Diagnostic, DiagnosticAnalysisResult, DiagnosticResultBuilder};
use crate::engine::driver::AttachedCompilation;
use crate::engine::EngineSettings;
use crate::error::{AnalysisError, Result};
use crate::model::{DocumentId, ProjectId, TextSpan};

/// Serialized request shipped to a remote analyzer host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticArguments {
    /// Emit per-analyzer performance reports on the remote side
    pub log_performance_info: bool,
    /// Return per-analyzer telemetry with the results
    pub get_telemetry_info: bool,
    /// Document under analysis; `None` for whole-project requests
    pub document_id: Option<DocumentId>,
    /// Sub-span of the document, if the request is span-scoped
    pub span: Option<TextSpan>,
    /// Analysis kind; `None` for whole-project requests
    pub kind: Option<AnalysisKind>,
    /// Project under analysis
    pub project_id: ProjectId,
    /// Ids of the project-supplied analyzers to run
    pub project_analyzer_ids: Vec<String>,
    /// Ids of the host-supplied analyzers to run
    pub host_analyzer_ids: Vec<String>,
}

/// Results returned from a remote analyzer host, keyed by analyzer-id string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAnalysisResults {
    /// Per-analyzer diagnostic maps
    pub results: Vec<(String, DiagnosticAnalysisResult)>,
    /// Per-analyzer telemetry, when requested
    pub telemetry: Vec<(String, AnalyzerTelemetryInfo)>,
}

impl RemoteAnalysisResults {
    /// Encode for a transport that carries JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode from a JSON transport payload
    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Client for an out-of-process analyzer host.
///
/// Absence of a client means "no remote host". Any failure (unreachable
/// host, serialization error, remote exception) must surface as `None`.
#[async_trait]
pub trait RemoteAnalyzerClient: Send + Sync {
    /// Invoke remote analysis; `None` on any failure
    async fn try_invoke(
        &self,
        arguments: DiagnosticArguments,
        cancellation: &CancellationToken,
    ) -> Option<RemoteAnalysisResults>;
}

/// Uniform result of one analyzer run, local or remote.
#[derive(Debug, Default)]
pub struct AnalyzerRunResult {
    /// Per-analyzer diagnostic maps
    pub results: FxHashMap<AnalyzerId, DiagnosticAnalysisResult>,
    /// Per-analyzer telemetry for this run
    pub telemetry: FxHashMap<AnalyzerId, AnalyzerTelemetryInfo>,
}

impl AnalyzerRunResult {
    /// Local diagnostics (syntax or semantic, per `kind`) one analyzer
    /// reported for `document` in this run
    pub fn local_diagnostics(
        &self,
        analyzer: &AnalyzerId,
        document: &DocumentId,
        kind: AnalysisKind,
    ) -> &[Diagnostic] {
        self.results
            .get(analyzer)
            .and_then(|result| result.document(document))
            .map(|buckets| match kind {
                AnalysisKind::Syntax => buckets.syntax.as_slice(),
                AnalysisKind::Semantic => buckets.semantic.as_slice(),
            })
            .unwrap_or(&[])
    }
}

/// Routes analysis to the remote host when one is available, else runs every
/// analyzer locally.
pub struct AnalyzerRunner {
    remote: Option<Arc<dyn RemoteAnalyzerClient>>,
    telemetry: Arc<TelemetryReporter>,
    settings: EngineSettings,
}

impl AnalyzerRunner {
    /// Create a runner
    pub fn new(
        remote: Option<Arc<dyn RemoteAnalyzerClient>>,
        telemetry: Arc<TelemetryReporter>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            remote,
            telemetry,
            settings,
        }
    }

    /// True when requests will be routed to a remote host
    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Analyze one document scope with the given analyzers.
    pub async fn analyze_document(
        &self,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<AnalyzerRunResult> {
        if scope.document.is_none() {
            return Err(AnalysisError::invalid_scope(
                "document analysis requires a document",
            ));
        }
        self.analyze(scope, analyzers, attached, cancellation).await
    }

    /// Analyze the whole project with the given analyzers.
    pub async fn analyze_project(
        &self,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<AnalyzerRunResult> {
        self.analyze(&AnalysisScope::project(), analyzers, attached, cancellation)
            .await
    }

    async fn analyze(
        &self,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<AnalyzerRunResult> {
        cancellation.ensure_not_cancelled()?;
        match &self.remote {
            Some(client) => {
                self.analyze_remote(client, scope, analyzers, attached, cancellation)
                    .await
            }
            None => self.analyze_local(scope, analyzers, attached, cancellation).await,
        }
    }

    async fn analyze_local(
        &self,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<AnalyzerRunResult> {
        let mut run = AnalyzerRunResult::default();
        for analyzer in analyzers {
            let id = analyzer.id();
            let outcome = attached
                .execution_unit(analyzer)
                .analyze(scope, cancellation)
                .await?;

            let mut builder = DiagnosticResultBuilder::new();
            for diagnostic in outcome.diagnostics {
                bucket(&mut builder, scope, diagnostic);
            }
            run.results.insert(id.clone(), builder.freeze());

            if self.settings.log_performance_info {
                self.telemetry
                    .report_performance(id.clone(), outcome.telemetry.clone());
            }
            run.telemetry.insert(id, outcome.telemetry);
        }
        Ok(run)
    }

    async fn analyze_remote(
        &self,
        client: &Arc<dyn RemoteAnalyzerClient>,
        scope: &AnalysisScope,
        analyzers: &[AnalyzerRef],
        attached: &Arc<AttachedCompilation>,
        cancellation: &CancellationToken,
    ) -> Result<AnalyzerRunResult> {
        // Maps built just before the call; the response is resolved back
        // through them.
        let mut by_id: FxHashMap<String, AnalyzerId> = FxHashMap::default();
        let mut project_analyzer_ids = Vec::new();
        let mut host_analyzer_ids = Vec::new();
        for analyzer in analyzers {
            let id = analyzer.id();
            if attached.host_analyzers().contains(&id) {
                host_analyzer_ids.push(id.as_str().to_string());
            } else {
                project_analyzer_ids.push(id.as_str().to_string());
            }
            by_id.insert(id.as_str().to_string(), id);
        }

        let arguments = DiagnosticArguments {
            log_performance_info: self.settings.log_performance_info,
            get_telemetry_info: self.settings.report_telemetry,
            document_id: scope.document.clone(),
            span: scope.span,
            kind: if scope.is_project() {
                None
            } else {
                Some(scope.kind)
            },
            project_id: attached.compilation().project_id().clone(),
            project_analyzer_ids,
            host_analyzer_ids,
        };

        let mut run = AnalyzerRunResult::default();
        let Some(response) = client.try_invoke(arguments, cancellation).await else {
            cancellation.ensure_not_cancelled()?;
            log::debug!(
                "remote analysis returned no value for project {}; reporting empty result",
                attached.compilation().project_id()
            );
            return Ok(run);
        };
        cancellation.ensure_not_cancelled()?;

        for (id_string, result) in response.results {
            match by_id.get(&id_string) {
                Some(id) => {
                    run.results.insert(id.clone(), result);
                }
                None => log::warn!("remote returned unknown analyzer id '{id_string}'"),
            }
        }
        for (id_string, info) in response.telemetry {
            let Some(id) = by_id.get(&id_string) else {
                continue;
            };
            if self.settings.log_performance_info {
                self.telemetry.report_performance(id.clone(), info.clone());
            }
            run.telemetry.insert(id.clone(), info);
        }
        Ok(run)
    }
}

/// Assign one diagnostic to its bucket for the given scope.
///
/// Document scopes: diagnostics on the analyzed document are local (by
/// kind), diagnostics pointing at other documents are non-local there, and
/// unattributed diagnostics are project-wide. Project scopes have no local
/// bucket at all.
fn bucket(builder: &mut DiagnosticResultBuilder, scope: &AnalysisScope, diagnostic: Diagnostic) {
    let Some(target) = diagnostic.document.clone() else {
        builder.add_other(diagnostic);
        return;
    };
    if scope.document.as_ref() == Some(&target) {
        if let Some(span) = &scope.span {
            if !diagnostic.intersects(span) {
                return;
            }
        }
        builder.add_local(target, scope.kind, diagnostic);
    } else {
        builder.add_non_local(target, diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalyzerSet, DiagnosticAnalyzer};
    use crate::engine::driver::AttachOptions;
    use crate::model::{Compilation, DocumentSnapshot, ProjectSnapshot};
    use async_trait::async_trait;

    struct OneWarning;

    #[async_trait]
    impl DiagnosticAnalyzer for OneWarning {
        fn id(&self) -> AnalyzerId {
            AnalyzerId::new("one-warning")
        }

        fn supports_kind(&self, _kind: AnalysisKind) -> bool {
            true
        }

        async fn analyze(
            &self,
            scope: &AnalysisScope,
            _compilation: &Compilation,
            _cancellation: &CancellationToken,
        ) -> Result<Vec<Diagnostic>> {
            let document = scope.document.clone().expect("document scope");
            Ok(vec![Diagnostic::warning("W1", "something")
                .with_location(document, TextSpan::new(0, 4))])
        }
    }

    fn attached() -> Arc<AttachedCompilation> {
        let project = ProjectSnapshot::builder("app")
            .document(DocumentSnapshot::new("a.lm", "fn a() {}"))
            .build();
        Arc::new(AttachedCompilation::new(
            Arc::new(Compilation::build(&project)),
            AnalyzerSet::empty(),
            AnalyzerSet::new([Arc::new(OneWarning) as AnalyzerRef]),
            AttachOptions::default(),
        ))
    }

    struct CannedRemote(RemoteAnalysisResults);

    #[async_trait]
    impl RemoteAnalyzerClient for CannedRemote {
        async fn try_invoke(
            &self,
            _arguments: DiagnosticArguments,
            _cancellation: &CancellationToken,
        ) -> Option<RemoteAnalysisResults> {
            Some(self.0.clone())
        }
    }

    struct UnreachableRemote;

    #[async_trait]
    impl RemoteAnalyzerClient for UnreachableRemote {
        async fn try_invoke(
            &self,
            _arguments: DiagnosticArguments,
            _cancellation: &CancellationToken,
        ) -> Option<RemoteAnalysisResults> {
            None
        }
    }

    #[tokio::test]
    async fn local_run_buckets_by_kind() {
        let runner = AnalyzerRunner::new(
            None,
            Arc::new(TelemetryReporter::new(true)),
            EngineSettings::default(),
        );
        let attached = attached();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(OneWarning)];
        let scope = AnalysisScope::document("a.lm".into(), AnalysisKind::Semantic);
        let run = runner
            .analyze_document(&scope, &analyzers, &attached, &CancellationToken::new())
            .await
            .unwrap();
        let local = run.local_diagnostics(
            &AnalyzerId::new("one-warning"),
            &"a.lm".into(),
            AnalysisKind::Semantic,
        );
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, "W1");
    }

    #[tokio::test]
    async fn failed_remote_yields_empty_without_local_fallback() {
        let runner = AnalyzerRunner::new(
            Some(Arc::new(UnreachableRemote)),
            Arc::new(TelemetryReporter::new(true)),
            EngineSettings::default(),
        );
        let attached = attached();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(OneWarning)];
        let scope = AnalysisScope::document("a.lm".into(), AnalysisKind::Semantic);
        let run = runner
            .analyze_document(&scope, &analyzers, &attached, &CancellationToken::new())
            .await
            .unwrap();
        assert!(run.results.is_empty());
    }

    #[tokio::test]
    async fn remote_results_resolve_back_to_analyzer_ids() {
        let mut canned = RemoteAnalysisResults::default();
        let mut builder = DiagnosticResultBuilder::new();
        builder.add_local(
            "a.lm".into(),
            AnalysisKind::Semantic,
            Diagnostic::warning("W1", "from remote")
                .with_location("a.lm".into(), TextSpan::new(0, 4)),
        );
        canned.results.push(("one-warning".into(), builder.freeze()));
        canned
            .results
            .push(("unknown-analyzer".into(), DiagnosticAnalysisResult::default()));

        let runner = AnalyzerRunner::new(
            Some(Arc::new(CannedRemote(canned))),
            Arc::new(TelemetryReporter::new(true)),
            EngineSettings::default(),
        );
        let attached = attached();
        let analyzers: Vec<AnalyzerRef> = vec![Arc::new(OneWarning)];
        let scope = AnalysisScope::document("a.lm".into(), AnalysisKind::Semantic);
        let run = runner
            .analyze_document(&scope, &analyzers, &attached, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.results.len(), 1);
        let local = run.local_diagnostics(
            &AnalyzerId::new("one-warning"),
            &"a.lm".into(),
            AnalysisKind::Semantic,
        );
        assert_eq!(local[0].message, "from remote");
    }

    #[test]
    fn wire_round_trip() {
        let mut canned = RemoteAnalysisResults::default();
        let mut builder = DiagnosticResultBuilder::new();
        builder.add_other(Diagnostic::error("E1", "project-wide"));
        canned.results.push(("x".into(), builder.freeze()));
        let decoded = RemoteAnalysisResults::from_json(&canned.to_json().unwrap()).unwrap();
        assert_eq!(decoded, canned);
    }
}
