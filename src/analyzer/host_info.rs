//! Host/project analyzer classification and execution ordering
//!
//! Analyzers come from two places: the host installation and the project's
//! own analyzer references. `HostAnalyzerInfo` records which is which for one
//! project, applies SDK-style redirection and suppression lists, and produces
//! the deterministic execution order every run follows: the compiler analyzer
//! first, then the other platform analyzers, then regular analyzers by their
//! declared priority with insertion order breaking ties.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::analyzer::{AnalyzerId, AnalyzerRef, AnalyzerSet};
use crate::model::ProjectSnapshot;

/// Sort key assigned to the compiler analyzer
const COMPILER_ORDER: i32 = -3;
/// Sort key assigned to the file-content-load analyzer
const FILE_CONTENT_LOAD_ORDER: i32 = -2;
/// Sort key assigned to the generator-diagnostics placeholder
const GENERATOR_PLACEHOLDER_ORDER: i32 = -1;

/// Classification and ordering of the analyzers active for one project.
#[derive(Clone)]
pub struct HostAnalyzerInfo {
    host: IndexMap<AnalyzerId, AnalyzerRef>,
    project: IndexMap<AnalyzerId, AnalyzerRef>,
}

impl HostAnalyzerInfo {
    /// Classify the given host and project analyzers for `project`.
    ///
    /// When the project uses SDK-provided style analyzers, the host analyzers
    /// named in `sdk_style_duplicates` are treated as project analyzers for
    /// this project only, so they do not pick up host-level fallback options.
    pub fn for_project(
        host_analyzers: &[AnalyzerRef],
        project: &ProjectSnapshot,
        sdk_style_duplicates: &HashSet<AnalyzerId>,
    ) -> Self {
        let redirect = project.uses_sdk_style_analyzers();
        let mut host = IndexMap::new();
        let mut project_map = IndexMap::new();

        for analyzer in host_analyzers {
            let id = analyzer.id();
            if redirect && sdk_style_duplicates.contains(&id) {
                project_map.entry(id).or_insert_with(|| Arc::clone(analyzer));
            } else {
                host.entry(id).or_insert_with(|| Arc::clone(analyzer));
            }
        }
        for analyzer in project.analyzer_references() {
            let id = analyzer.id();
            if !host.contains_key(&id) {
                project_map.entry(id).or_insert_with(|| Arc::clone(analyzer));
            }
        }

        let info = Self {
            host,
            project: project_map,
        };
        info.with_excluded_analyzers(project.skipped_analyzers())
    }

    /// True when the analyzer came from the host installation rather than
    /// the project's references
    pub fn is_host_analyzer(&self, id: &AnalyzerId) -> bool {
        self.host.contains_key(id)
    }

    /// All analyzers, unordered by priority (host first, then project, in
    /// insertion order)
    pub fn all_analyzers(&self) -> impl Iterator<Item = &AnalyzerRef> {
        self.host.values().chain(self.project.values())
    }

    /// Look up an analyzer by id
    pub fn get(&self, id: &AnalyzerId) -> Option<&AnalyzerRef> {
        self.host.get(id).or_else(|| self.project.get(id))
    }

    /// All analyzers in deterministic execution order.
    pub fn ordered_all_analyzers(&self) -> Vec<AnalyzerRef> {
        let mut ordered: Vec<AnalyzerRef> = self.all_analyzers().cloned().collect();
        // Stable sort keeps insertion order for equal keys.
        ordered.sort_by_key(|analyzer| execution_order(analyzer));
        ordered
    }

    /// A new instance with the given analyzers removed from both groups.
    pub fn with_excluded_analyzers(&self, excluded: &HashSet<AnalyzerId>) -> Self {
        if excluded.is_empty() {
            return self.clone();
        }
        Self {
            host: self
                .host
                .iter()
                .filter(|(id, _)| !excluded.contains(*id))
                .map(|(id, a)| (id.clone(), Arc::clone(a)))
                .collect(),
            project: self
                .project
                .iter()
                .filter(|(id, _)| !excluded.contains(*id))
                .map(|(id, a)| (id.clone(), Arc::clone(a)))
                .collect(),
        }
    }

    /// Split a set into its (project, host) sub-groups for attachment.
    pub fn split(&self, analyzers: &AnalyzerSet) -> (AnalyzerSet, AnalyzerSet) {
        let mut project = Vec::new();
        let mut host = Vec::new();
        for analyzer in analyzers.iter() {
            if self.is_host_analyzer(&analyzer.id()) {
                host.push(Arc::clone(analyzer));
            } else {
                project.push(Arc::clone(analyzer));
            }
        }
        (AnalyzerSet::new(project), AnalyzerSet::new(host))
    }
}

/// Numeric execution order for an analyzer: platform analyzers get fixed
/// negative keys, everything else its declared non-negative priority.
fn execution_order(analyzer: &AnalyzerRef) -> i32 {
    let id = analyzer.id();
    if id.is_compiler() {
        COMPILER_ORDER
    } else if id.is_file_content_load() {
        FILE_CONTENT_LOAD_ORDER
    } else if id.is_generator_placeholder() {
        GENERATOR_PLACEHOLDER_ORDER
    } else {
        analyzer.priority().max(0)
    }
}
