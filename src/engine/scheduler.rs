//! Priority scheduling and analyzer deprioritization
//!
//! Analyzers that register symbol-start/end or semantic-model actions pay a
//! cost far out of proportion for narrow span queries. When an interactive
//! request at Normal priority asks for a sub-span, those analyzers are pulled
//! out of the immediate pass: either dropped outright (when the host opted
//! in) or reported back as deferred so a later Low-priority request picks
//! them up. High-priority requests always run everything; skipping here can
//! only delay a diagnostic, never change one.

use std::sync::Arc;

use crate::analyzer::{AnalysisKind, AnalysisScope, AnalyzerId, AnalyzerRef};
use crate::engine::driver::AttachedCompilation;
use crate::engine::{EngineSettings, RequestPriority};

/// Which analyzers run now and which were deferred to a Low pass.
#[derive(Default)]
pub struct SchedulingDecision {
    /// Analyzers to execute for the current request, in the given order
    pub run_now: Vec<AnalyzerRef>,
    /// Analyzers deferred to a subsequent Low-priority request
    pub deferred: Vec<AnalyzerId>,
}

/// Decides which analyzers are eligible for the current request.
pub struct PriorityScheduler;

impl PriorityScheduler {
    /// Partition `analyzers` for the given scope and priority.
    ///
    /// Deprioritization applies only to Normal-priority semantic requests
    /// for an explicit sub-span; everything else runs unfiltered.
    pub fn partition(
        analyzers: &[AnalyzerRef],
        scope: &AnalysisScope,
        priority: RequestPriority,
        attached: &AttachedCompilation,
        settings: &EngineSettings,
    ) -> SchedulingDecision {
        let applies = scope.kind == AnalysisKind::Semantic
            && scope.span.is_some()
            && priority == RequestPriority::Normal;
        if !applies {
            return SchedulingDecision {
                run_now: analyzers.to_vec(),
                deferred: Vec::new(),
            };
        }

        let mut decision = SchedulingDecision::default();
        for analyzer in analyzers {
            let id = analyzer.id();
            if Self::is_candidate(analyzer, &id, attached) {
                if settings.skip_deprioritized_analyzers {
                    log::debug!("skipping deprioritized analyzer {id} for span request");
                } else {
                    decision.deferred.push(id);
                }
            } else {
                decision.run_now.push(Arc::clone(analyzer));
            }
        }
        decision
    }

    /// An analyzer is a deprioritization candidate when observed telemetry
    /// shows expensive action registrations, excluding the compiler analyzer
    /// and workspace analyzers.
    fn is_candidate(analyzer: &AnalyzerRef, id: &AnalyzerId, attached: &AttachedCompilation) -> bool {
        if id.is_compiler() || analyzer.is_workspace_analyzer() {
            return false;
        }
        attached.telemetry_for(id).registers_expensive_actions()
    }
}
