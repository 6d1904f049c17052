//! Cooperative cancellation for analysis requests
//!
//! One token is threaded through every suspension point of a request and
//! checked before and after each unit of work. Cancellation is cooperative:
//! triggering the token never interrupts an in-flight analyzer, it only stops
//! further work from starting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AnalysisError, Result};

/// Cooperative cancellation signal shared across one analysis request.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation for every holder of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return `Err(AnalysisError::Cancelled)` if the token was triggered
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
