//! The diagnostic analysis engine
//!
//! Orchestration of everything this crate exists for: attaching analyzer sets
//! to compilations and caching the result by content fingerprint, running
//! analyzers in-process or on a remote host, reusing semantic diagnostics
//! across member-level edits, and deferring expensive analyzers out of
//! interactive requests.

pub mod cache;
pub mod driver;
pub mod executor;
pub mod incremental;
pub mod runner;
pub mod scheduler;
pub mod service;

pub use cache::{CacheStats, CompilationCache};
pub use driver::{AttachOptions, AttachedCompilation, ExecutionUnit, PassOutcome};
pub use executor::DocumentAnalysisExecutor;
pub use incremental::IncrementalMemberEditAnalyzer;
pub use runner::{
    AnalyzerRunResult, AnalyzerRunner, DiagnosticArguments, RemoteAnalyzerClient,
    RemoteAnalysisResults,
};
pub use scheduler::{PriorityScheduler, SchedulingDecision};
pub use service::{
    DiagnosticService, DiagnosticServiceBuilder, ProjectDiagnosticsRequest, SpanAnalysisResult,
};

use serde::{Deserialize, Serialize};

/// Urgency of one analysis request.
///
/// `High` runs everything immediately, `Normal` may defer expensive analyzers
/// to a later `Low` pass, and `Low` is that later pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestPriority {
    /// Deferred work picked up after interactive requests settle
    Low,
    /// Ordinary interactive requests
    Normal,
    /// Must not be deferred (explicit user gesture)
    High,
}

/// Host- and user-configurable behavior of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Abort the process when an analyzer faults instead of swallowing the
    /// fault (diagnostic/telemetry configurations)
    pub crash_on_analyzer_exception: bool,
    /// Drop deprioritized analyzers from Normal-priority span requests
    /// entirely instead of deferring them to a Low pass
    pub skip_deprioritized_analyzers: bool,
    /// Emit fire-and-forget per-analyzer performance reports
    pub log_performance_info: bool,
    /// Collect per-analyzer telemetry
    pub report_telemetry: bool,
    /// Fan-out width for whole-project analysis across documents
    pub max_parallel_documents: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            crash_on_analyzer_exception: false,
            skip_deprioritized_analyzers: false,
            log_performance_info: true,
            report_telemetry: true,
            max_parallel_documents: 8,
        }
    }
}
