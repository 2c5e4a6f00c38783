//! Failure reporting for accepted work.

use std::fmt;

use quarry_core::Error;

use crate::work::WorkKind;

/// A failure that happened after a work item was accepted.
#[derive(Debug)]
pub struct FailureContext {
    /// Orchestrator that ran the work.
    pub orchestrator: String,
    /// Kind of the failed work, `None` for background actions.
    pub kind: Option<WorkKind>,
    /// Description of the failed work or action.
    pub work: String,
    /// The error.
    pub error: Error,
}

/// Receives failures of accepted work.
///
/// Called from orchestrator tasks; must not block.
pub trait FailureHandler: Send + Sync + fmt::Debug {
    /// Handle one failure.
    fn handle(&self, context: FailureContext);
}

/// Logs failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureHandler;

impl FailureHandler for LoggingFailureHandler {
    fn handle(&self, context: FailureContext) {
        tracing::error!(
            orchestrator = %context.orchestrator,
            work = %context.work,
            fatal = context.error.is_fatal(),
            error = %context.error,
            "indexing work failed"
        );
    }
}
