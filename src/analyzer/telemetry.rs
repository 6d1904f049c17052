//! Per-analyzer execution telemetry
//!
//! The engine tracks how long each analyzer runs, how often it faults, and
//! which expensive action categories it registers. Performance reports are
//! fire-and-forget: they are spawned as detached tasks whose failures are
//! logged and never observed by the analysis caller. Every spawned report is
//! tracked in an in-flight registry so tests can drain before asserting.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::analyzer::{ActionProfile, AnalyzerId};

/// Observed execution telemetry for one analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerTelemetryInfo {
    /// Accumulated execution time
    pub execution_time: Duration,
    /// Number of intercepted analyzer faults
    pub exception_count: u32,
    /// Registered symbol-start actions
    pub symbol_start_actions: u32,
    /// Registered symbol-end actions
    pub symbol_end_actions: u32,
    /// Registered semantic-model actions
    pub semantic_model_actions: u32,
}

impl AnalyzerTelemetryInfo {
    /// Seed telemetry from an analyzer's declared action profile
    pub fn from_profile(profile: &ActionProfile) -> Self {
        Self {
            symbol_start_actions: profile.symbol_start_actions,
            symbol_end_actions: profile.symbol_end_actions,
            semantic_model_actions: profile.semantic_model_actions,
            ..Self::default()
        }
    }

    /// Fold another telemetry record into this one
    pub fn merge(&mut self, other: &AnalyzerTelemetryInfo) {
        self.execution_time += other.execution_time;
        self.exception_count += other.exception_count;
        self.symbol_start_actions = self.symbol_start_actions.max(other.symbol_start_actions);
        self.symbol_end_actions = self.symbol_end_actions.max(other.symbol_end_actions);
        self.semantic_model_actions = self
            .semantic_model_actions
            .max(other.semantic_model_actions);
    }

    /// True when the analyzer registered action categories that make narrow
    /// span queries disproportionately expensive
    pub fn registers_expensive_actions(&self) -> bool {
        self.symbol_start_actions > 0
            || self.symbol_end_actions > 0
            || self.semantic_model_actions > 0
    }
}

#[derive(Debug, Default)]
struct InFlightState {
    pending: AtomicUsize,
    idle: Notify,
}

/// Registry of detached operations still running.
#[derive(Debug, Default)]
pub struct InFlightOperations {
    state: Arc<InFlightState>,
}

impl InFlightOperations {
    /// Spawn `future` as a tracked detached task.
    pub fn track<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            future.await;
            if state.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                state.idle.notify_waiters();
            }
        });
    }

    /// Wait until every tracked operation has finished.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.state.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Collects per-analyzer telemetry and accepts fire-and-forget performance
/// reports.
#[derive(Debug)]
pub struct TelemetryReporter {
    aggregate: Arc<RwLock<FxHashMap<AnalyzerId, AnalyzerTelemetryInfo>>>,
    in_flight: InFlightOperations,
    enabled: bool,
}

impl TelemetryReporter {
    /// Create a reporter; a disabled reporter drops all reports
    pub fn new(enabled: bool) -> Self {
        Self {
            aggregate: Arc::new(RwLock::new(FxHashMap::default())),
            in_flight: InFlightOperations::default(),
            enabled,
        }
    }

    /// Report one analyzer's performance for a finished pass.
    ///
    /// The report is applied on a detached task; the caller never observes
    /// its completion or its failure. Must be called from within a tokio
    /// runtime.
    pub fn report_performance(&self, analyzer: AnalyzerId, info: AnalyzerTelemetryInfo) {
        if !self.enabled {
            return;
        }
        let aggregate = Arc::clone(&self.aggregate);
        self.in_flight.track(async move {
            log::debug!(
                "analyzer {analyzer}: {:?} elapsed, {} faults",
                info.execution_time,
                info.exception_count
            );
            aggregate.write().entry(analyzer).or_default().merge(&info);
        });
    }

    /// Telemetry aggregated so far for one analyzer
    pub fn recorded(&self, analyzer: &AnalyzerId) -> Option<AnalyzerTelemetryInfo> {
        self.aggregate.read().get(analyzer).cloned()
    }

    /// Wait for all outstanding reports to be applied (test hook).
    pub async fn wait_until_idle(&self) {
        self.in_flight.wait_until_idle().await;
    }
}
