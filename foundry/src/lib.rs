#![deny(missing_docs)]
//! # foundry — in-process workflow orchestration
//!
//! A single import surface over the engine: the [`foundry_core`] protocol
//! (`Operation`, `Foundry`, `Value`), the [`foundry_smith`] orchestrator
//! (`Smith`, Saga compensation), and the [`foundry_ops`] built-in
//! composites (`Conditional`, `ForEach`), gated behind feature flags with
//! a [`prelude`] for the common path.

pub use foundry_core;

#[cfg(feature = "smith")]
pub use foundry_smith;

#[cfg(feature = "ops")]
pub use foundry_ops;

/// Happy-path imports for assembling and running a workflow.
pub mod prelude {
    pub use foundry_core::{
        Clock, DurationMs, EventBus, EventSubscriber, ExecutionId, Field, Foundry, FoundryError,
        Logger, NullLogger, Operation, OperationEvent, OperationId, OperationMiddleware, Options,
        SystemClock, TracingLogger, TypedOperation, Value, ValueList, Workflow, WorkflowBuilder,
        WorkflowId, operation_middleware_fn,
    };

    #[cfg(feature = "smith")]
    pub use foundry_smith::{CompensationEvent, Smith, WorkflowEvent, WorkflowMiddleware, workflow_middleware_fn};

    #[cfg(feature = "ops")]
    pub use foundry_ops::{Condition, Conditional, DataStrategy, ForEach, ForEachResults, condition_fn};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use foundry_core::test_support::EchoOperation;
    use std::sync::Arc;

    #[tokio::test]
    async fn prelude_assembles_a_workflow_end_to_end() {
        let workflow = Arc::new(
            WorkflowBuilder::new()
                .name("greet")
                .operation(Arc::new(EchoOperation::new("echo")))
                .build()
                .unwrap(),
        );
        let smith = Smith::simple();
        let out = smith.forge(workflow).await.unwrap();
        assert!(out.is_null());
    }
}
