//! Attached compilations and per-analyzer execution units
//!
//! An `AttachedCompilation` is the pairing of an analyzer set (split into
//! project and host sub-groups) with a compiled project snapshot. It is
//! expensive to create and cheap to reuse; ownership stays with the cache
//! entry that created it. Analyzer execution within one attached compilation
//! is deliberately sequential to avoid thread-pool starvation when the host
//! blocks on async work.
//!
//! `ExecutionUnit` wraps one analyzer of the attached set into a runnable
//! unit that isolates faults: an analyzer failure never reaches a sibling
//! analyzer or the caller, unless the engine is configured to fail fast.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::analyzer::{
    AnalysisScope, AnalyzerId, AnalyzerRef, AnalyzerSet, AnalyzerTelemetryInfo,
};
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::error::{AnalysisError, Result};
use crate::model::Compilation;

/// Options fixed at attachment time.
#[derive(Debug, Clone)]
pub struct AttachOptions {
    /// Run analyzers concurrently within this attached compilation.
    /// The engine always attaches non-concurrent.
    pub concurrent: bool,
    /// Fail fast on analyzer faults instead of attributing them
    pub crash_on_analyzer_exception: bool,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            concurrent: false,
            crash_on_analyzer_exception: false,
        }
    }
}

/// The outcome of running one analyzer over one scope.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// Diagnostics the analyzer reported
    pub diagnostics: Vec<Diagnostic>,
    /// Telemetry for this pass alone
    pub telemetry: AnalyzerTelemetryInfo,
}

/// An analyzer set attached to a compiled project snapshot.
pub struct AttachedCompilation {
    compilation: Arc<Compilation>,
    project_analyzers: AnalyzerSet,
    host_analyzers: AnalyzerSet,
    options: AttachOptions,
    telemetry: DashMap<AnalyzerId, AnalyzerTelemetryInfo>,
    run_gate: Mutex<()>,
}

impl AttachedCompilation {
    /// Attach the given analyzer groups to a compilation.
    pub fn new(
        compilation: Arc<Compilation>,
        project_analyzers: AnalyzerSet,
        host_analyzers: AnalyzerSet,
        options: AttachOptions,
    ) -> Self {
        let telemetry = DashMap::new();
        for analyzer in project_analyzers.iter().chain(host_analyzers.iter()) {
            telemetry.insert(
                analyzer.id(),
                AnalyzerTelemetryInfo::from_profile(&analyzer.action_profile()),
            );
        }
        Self {
            compilation,
            project_analyzers,
            host_analyzers,
            options,
            telemetry,
            run_gate: Mutex::new(()),
        }
    }

    /// The underlying compilation
    pub fn compilation(&self) -> &Arc<Compilation> {
        &self.compilation
    }

    /// Analyzers supplied by the project's references
    pub fn project_analyzers(&self) -> &AnalyzerSet {
        &self.project_analyzers
    }

    /// Analyzers supplied by the host installation
    pub fn host_analyzers(&self) -> &AnalyzerSet {
        &self.host_analyzers
    }

    /// Look up an attached analyzer by id
    pub fn analyzer(&self, id: &AnalyzerId) -> Option<&AnalyzerRef> {
        self.project_analyzers
            .get(id)
            .or_else(|| self.host_analyzers.get(id))
    }

    /// Telemetry observed for one analyzer since attachment (seeded from its
    /// action profile)
    pub fn telemetry_for(&self, id: &AnalyzerId) -> AnalyzerTelemetryInfo {
        self.telemetry
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Telemetry for every attached analyzer
    pub fn telemetry_snapshot(&self) -> FxHashMap<AnalyzerId, AnalyzerTelemetryInfo> {
        self.telemetry
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Wrap one analyzer into a runnable, fault-isolated unit
    pub fn execution_unit<'a>(&'a self, analyzer: &AnalyzerRef) -> ExecutionUnit<'a> {
        ExecutionUnit {
            analyzer: Arc::clone(analyzer),
            attached: self,
        }
    }

    fn record(&self, id: AnalyzerId, pass: &AnalyzerTelemetryInfo) {
        self.telemetry.entry(id).or_default().merge(pass);
    }
}

impl std::fmt::Debug for AttachedCompilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedCompilation")
            .field("project", self.compilation.project_id())
            .field("checksum", &self.compilation.checksum())
            .field("project_analyzers", &self.project_analyzers)
            .field("host_analyzers", &self.host_analyzers)
            .finish()
    }
}

/// One analyzer of an attached compilation, runnable with fault isolation.
pub struct ExecutionUnit<'a> {
    analyzer: AnalyzerRef,
    attached: &'a AttachedCompilation,
}

impl ExecutionUnit<'_> {
    /// Run the analyzer over the given scope.
    ///
    /// Cancellation propagates unchanged. Any other analyzer failure is
    /// intercepted here: attributed to the analyzer and swallowed, or, when
    /// the attachment was configured to fail fast, reported and escalated to
    /// process teardown.
    pub async fn analyze(
        &self,
        scope: &AnalysisScope,
        cancellation: &CancellationToken,
    ) -> Result<PassOutcome> {
        cancellation.ensure_not_cancelled()?;

        if !self.analyzer.supports_kind(scope.kind) {
            return Ok(PassOutcome {
                diagnostics: Vec::new(),
                telemetry: AnalyzerTelemetryInfo::default(),
            });
        }

        // Sequential execution within one attached compilation.
        let _gate = if self.attached.options.concurrent {
            None
        } else {
            Some(self.attached.run_gate.lock().await)
        };

        let id = self.analyzer.id();
        let started = Instant::now();
        let outcome = self
            .analyzer
            .analyze(scope, self.attached.compilation(), cancellation)
            .await;
        let elapsed = started.elapsed();

        let mut pass = AnalyzerTelemetryInfo {
            execution_time: elapsed,
            ..AnalyzerTelemetryInfo::from_profile(&self.analyzer.action_profile())
        };

        let diagnostics = match outcome {
            Ok(diagnostics) => diagnostics,
            Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
            Err(error) => {
                pass.exception_count += 1;
                if self.attached.options.crash_on_analyzer_exception {
                    log::error!("fatal analyzer fault in {id}: {error}");
                    std::process::abort();
                }
                log::warn!("analyzer {id} faulted, attributing empty result: {error}");
                Vec::new()
            }
        };

        self.attached.record(id, &pass);
        cancellation.ensure_not_cancelled()?;
        Ok(PassOutcome {
            diagnostics,
            telemetry: pass,
        })
    }

    /// The wrapped analyzer
    pub fn analyzer(&self) -> &AnalyzerRef {
        &self.analyzer
    }
}
