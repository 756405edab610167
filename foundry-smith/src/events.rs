//! Workflow and compensation events (spec §6), dispatched through
//! `foundry_core::EventBus` the same way operation events are.

use foundry_core::{DurationMs, Value};
use std::collections::HashMap;

/// Events emitted around a single `Smith::forge` call.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// The workflow run is starting.
    Started,
    /// The workflow run completed successfully.
    Completed {
        /// A snapshot of the foundry's properties at completion.
        properties: HashMap<String, Value>,
        /// Total run duration.
        duration: DurationMs,
    },
    /// The workflow run failed (excluding cancellation, which never emits
    /// this event — see spec §5).
    Failed {
        /// A rendering of the failure.
        error: String,
        /// The name of the operation whose failure ended the run, if one
        /// had started running before the failure was recorded.
        last_failed_operation_name: Option<String>,
        /// Total run duration before failure.
        duration: DurationMs,
    },
}

/// Events emitted around compensation (reverse-order restore).
#[derive(Debug, Clone)]
pub enum CompensationEvent {
    /// Compensation is starting.
    Triggered {
        /// Why compensation was triggered (the original failure,
        /// rendered).
        reason: String,
        /// The name of the operation whose failure triggered this.
        failed_operation_name: String,
    },
    /// A single operation's restore is starting.
    OperationRestoreStarted {
        /// The operation being restored.
        operation_name: String,
    },
    /// A single operation's restore completed successfully.
    OperationRestoreCompleted {
        /// The operation that was restored.
        operation_name: String,
        /// How long the restore took.
        duration: DurationMs,
    },
    /// A single operation's restore failed.
    OperationRestoreFailed {
        /// The operation whose restore failed.
        operation_name: String,
        /// A rendering of the failure.
        error: String,
        /// How long the restore ran before failing.
        duration: DurationMs,
    },
    /// Compensation has finished (whether or not every restore succeeded).
    Completed {
        /// How many restores succeeded.
        success_count: usize,
        /// How many restores failed.
        failure_count: usize,
        /// Total compensation duration.
        duration: DurationMs,
    },
}
