//! The engine's error taxonomy.
//!
//! One enum covers every failure kind the engine itself defines (§7): the
//! Foundry-level driver, the Smith orchestrator, and the composite
//! operations all return this type, so callers match on one set of variants
//! regardless of which layer produced the failure.

use crate::id::{ExecutionId, OperationId, WorkflowId};
use thiserror::Error;

/// Errors produced by the engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FoundryError {
    /// A required argument was missing, empty, or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The Foundry or Smith was in a state that forbids the requested call
    /// (already executing, frozen, disposed, or the workflow is malformed).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An operation's `execute` returned an error.
    #[error("operation {operation_name} ({operation_id}) failed during execution {execution_id}: {cause}")]
    OperationFailure {
        /// The run this failure occurred in.
        execution_id: ExecutionId,
        /// The workflow this failure occurred in, if bound.
        workflow_id: Option<WorkflowId>,
        /// The failing operation's name.
        operation_name: String,
        /// The failing operation's id.
        operation_id: OperationId,
        /// The underlying cause.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An operation's `restore` returned an error during compensation.
    #[error("operation {operation_name} ({operation_id}) failed to restore: {cause}")]
    RestoreFailure {
        /// The failing operation's name.
        operation_name: String,
        /// The failing operation's id.
        operation_id: OperationId,
        /// The underlying cause.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Multiple underlying failures, collected together. Never contains a
    /// nested `Aggregate` — constructing one flattens any nested aggregates.
    #[error("{} aggregated failures: {}", .0.len(), render_aggregate(.0))]
    Aggregate(Vec<FoundryError>),

    /// A `ForEach` (or other timed operation) exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The run was cancelled. Never wrapped; propagates unchanged and short
    /// circuits compensation.
    #[error("operation was cancelled")]
    Cancelled,

    /// `restore` was called directly (outside engine-driven compensation)
    /// on an operation whose `supports_restore()` is false.
    #[error("operation {0} does not support restore")]
    NotSupported(String),

    /// Catch-all for errors originating outside the engine's own taxonomy.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

fn render_aggregate(errors: &[FoundryError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FoundryError {
    /// Build an aggregate error, flattening any nested aggregates so that
    /// `Aggregate` is never found nested inside another `Aggregate`.
    pub fn aggregate(errors: Vec<FoundryError>) -> FoundryError {
        let mut flat = Vec::with_capacity(errors.len());
        for err in errors {
            match err {
                FoundryError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        FoundryError::Aggregate(flat)
    }

    /// True for [`FoundryError::Cancelled`].
    ///
    /// Cancellation is a terminal state distinct from workflow failure;
    /// call sites use this to decide whether to skip compensation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FoundryError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_flattens_nested_aggregates() {
        let inner = FoundryError::aggregate(vec![
            FoundryError::InvalidArgument("a".into()),
            FoundryError::InvalidArgument("b".into()),
        ]);
        let outer = FoundryError::aggregate(vec![inner, FoundryError::Timeout]);
        match outer {
            FoundryError::Aggregate(errs) => assert_eq!(errs.len(), 3),
            _ => panic!("expected aggregate"),
        }
    }

    #[test]
    fn is_cancelled_only_matches_cancelled_variant() {
        assert!(FoundryError::Cancelled.is_cancelled());
        assert!(!FoundryError::Timeout.is_cancelled());
    }
}
