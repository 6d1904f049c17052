//! Remote execution: wire arguments, id resolution, and local/remote
//! equivalence.

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use common::StaticAnalyzer;
use lumen_analysis::analyzer::AnalysisKind;
use lumen_analysis::diagnostics::DiagnosticResultBuilder;
use lumen_analysis::engine::{DiagnosticArguments, RemoteAnalyzerClient, RemoteAnalysisResults};
use lumen_analysis::model::{DocumentSnapshot, ProjectSnapshot};
use lumen_analysis::{
    CancellationToken, Diagnostic, DiagnosticService, DocumentId, RequestPriority, TextSpan,
};

fn project() -> ProjectSnapshot {
    ProjectSnapshot::builder("app")
        .document(DocumentSnapshot::new("a.lm", "fn alpha() { beta() }\n"))
        .build()
}

fn equivalence_analyzer() -> StaticAnalyzer {
    StaticAnalyzer::new("equiv", AnalysisKind::Semantic).with_document_diagnostic(
        Diagnostic::warning("EQ01", "finding")
            .with_location(DocumentId::new("a.lm"), TextSpan::new(13, 19)),
    )
}

/// Records the serialized arguments and answers with a canned result.
struct CannedRemote {
    response: Option<RemoteAnalysisResults>,
    seen: Mutex<Vec<DiagnosticArguments>>,
}

impl CannedRemote {
    fn new(response: Option<RemoteAnalysisResults>) -> Self {
        Self {
            response,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteAnalyzerClient for CannedRemote {
    async fn try_invoke(
        &self,
        arguments: DiagnosticArguments,
        _cancellation: &CancellationToken,
    ) -> Option<RemoteAnalysisResults> {
        self.seen.lock().unwrap().push(arguments);
        self.response.clone()
    }
}

fn canned_equiv_response() -> RemoteAnalysisResults {
    let mut builder = DiagnosticResultBuilder::new();
    builder.add_local(
        DocumentId::new("a.lm"),
        AnalysisKind::Semantic,
        Diagnostic::warning("EQ01", "finding")
            .with_location(DocumentId::new("a.lm"), TextSpan::new(13, 19)),
    );
    RemoteAnalysisResults {
        results: vec![("equiv".to_string(), builder.freeze())],
        telemetry: Vec::new(),
    }
}

#[tokio::test]
async fn remote_and_local_runs_agree_on_the_same_request() {
    let span = Some(TextSpan::new(10, 21));
    let token = CancellationToken::new();
    let project = project();

    let local_service = DiagnosticService::builder()
        .host_analyzer(Arc::new(equivalence_analyzer()))
        .build();
    let local = local_service
        .diagnostics_for_span(
            &project,
            &DocumentId::new("a.lm"),
            span,
            None,
            RequestPriority::High,
            AnalysisKind::Semantic,
            &token,
        )
        .await
        .unwrap();

    let remote_service = DiagnosticService::builder()
        .host_analyzer(Arc::new(equivalence_analyzer()))
        .remote_client(Arc::new(CannedRemote::new(Some(canned_equiv_response()))))
        .build();
    let remote = remote_service
        .diagnostics_for_span(
            &project,
            &DocumentId::new("a.lm"),
            span,
            None,
            RequestPriority::High,
            AnalysisKind::Semantic,
            &token,
        )
        .await
        .unwrap();

    let key = |diagnostics: &[Diagnostic]| {
        let mut pairs: Vec<(String, Option<TextSpan>)> = diagnostics
            .iter()
            .map(|d| (d.id.clone(), d.span))
            .collect();
        pairs.sort();
        pairs
    };
    assert_eq!(key(&local.diagnostics), key(&remote.diagnostics));
}

#[tokio::test]
async fn wire_arguments_carry_scope_and_analyzer_split() {
    let client = Arc::new(CannedRemote::new(Some(canned_equiv_response())));
    let project_analyzer = StaticAnalyzer::new("project-owned", AnalysisKind::Semantic);
    let project = ProjectSnapshot::builder("app")
        .document(DocumentSnapshot::new("a.lm", "fn alpha() {}\n"))
        .analyzer(Arc::new(project_analyzer))
        .build();
    let service = DiagnosticService::builder()
        .host_analyzer(Arc::new(equivalence_analyzer()))
        .remote_client(Arc::clone(&client) as _)
        .build();

    service
        .diagnostics_for_span(
            &project,
            &DocumentId::new("a.lm"),
            Some(TextSpan::new(0, 8)),
            None,
            RequestPriority::High,
            AnalysisKind::Semantic,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let seen = client.seen.lock().unwrap();
    assert!(!seen.is_empty());
    let arguments = &seen[0];
    assert_eq!(arguments.document_id, Some(DocumentId::new("a.lm")));
    assert_eq!(arguments.span, Some(TextSpan::new(0, 8)));
    assert_eq!(arguments.kind, Some(AnalysisKind::Semantic));
    assert!(arguments
        .host_analyzer_ids
        .contains(&"equiv".to_string()));
    assert!(arguments
        .project_analyzer_ids
        .contains(&"project-owned".to_string()));
}

#[tokio::test]
async fn unreachable_remote_yields_empty_diagnostics_without_fallback() {
    let analyzer = Arc::new(equivalence_analyzer());
    let service = DiagnosticService::builder()
        .host_analyzer(Arc::clone(&analyzer) as _)
        .remote_client(Arc::new(CannedRemote::new(None)))
        .build();

    let result = service
        .diagnostics_for_span(
            &project(),
            &DocumentId::new("a.lm"),
            Some(TextSpan::new(0, 21)),
            None,
            RequestPriority::High,
            AnalysisKind::Semantic,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.diagnostics.is_empty());
    // No local fallback: the analyzer never ran in this process.
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn unknown_remote_analyzer_ids_are_dropped() {
    let mut response = canned_equiv_response();
    let mut builder = DiagnosticResultBuilder::new();
    builder.add_local(
        DocumentId::new("a.lm"),
        AnalysisKind::Semantic,
        Diagnostic::error("ZZ99", "phantom")
            .with_location(DocumentId::new("a.lm"), TextSpan::new(0, 1)),
    );
    response
        .results
        .push(("not-registered".to_string(), builder.freeze()));

    let service = DiagnosticService::builder()
        .host_analyzer(Arc::new(equivalence_analyzer()))
        .remote_client(Arc::new(CannedRemote::new(Some(response))))
        .build();

    let result = service
        .diagnostics_for_span(
            &project(),
            &DocumentId::new("a.lm"),
            Some(TextSpan::new(0, 21)),
            None,
            RequestPriority::High,
            AnalysisKind::Semantic,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.diagnostics.iter().any(|d| d.id == "EQ01"));
    assert!(!result.diagnostics.iter().any(|d| d.id == "ZZ99"));
}
