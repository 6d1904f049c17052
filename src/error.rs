//! Error types for diagnostic analysis
//!
//! This module defines the error taxonomy used throughout the analysis engine.

use thiserror::Error;

use crate::analyzer::AnalyzerId;

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Comprehensive error type for analysis operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The request's cancellation token was triggered
    #[error("analysis cancelled")]
    Cancelled,

    /// An analyzer threw during execution
    #[error("analyzer '{analyzer}' failed: {message}")]
    AnalyzerFault { analyzer: AnalyzerId, message: String },

    /// A request was shaped in a way the engine cannot execute
    #[error("invalid analysis scope: {message}")]
    InvalidScope { message: String },

    /// A document referenced by a request is not part of the project snapshot
    #[error("unknown document '{document}'")]
    UnknownDocument { document: String },
}

impl AnalysisError {
    /// Create an analyzer fault error
    pub fn fault(analyzer: AnalyzerId, message: impl Into<String>) -> Self {
        Self::AnalyzerFault {
            analyzer,
            message: message.into(),
        }
    }

    /// Create an invalid-scope error
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// True when this error is a cooperative cancellation, which always
    /// propagates unchanged rather than being attributed to an analyzer.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
