//! # foundry-core — the engine's protocol boundary
//!
//! This crate defines the in-process workflow orchestration engine's core
//! protocol: the tagged-any [`Value`] boundary, the [`Operation`] contract,
//! the operation-level middleware pipeline, and [`Foundry`], the execution
//! driver that runs an operation list sequentially against a shared
//! concurrent property map.
//!
//! [`Operation`] and [`Foundry`] are mutually referential — an operation's
//! `execute` takes `&Foundry`, and a `Foundry` holds the operation list it
//! runs — so, like this engine's protocol-trait lineage, they live together
//! in one crate rather than split across a dependency edge.
//!
//! Workflow orchestration above a single Foundry (global concurrency,
//! workflow-level middleware, Saga compensation) lives in `foundry-smith`.
//! Conditional and ForEach, the two built-in composite operations, live in
//! `foundry-ops`.

#![deny(missing_docs)]

pub mod clock;
pub mod duration;
pub mod error;
pub mod events;
pub mod foundry;
pub mod id;
pub mod logging;
pub mod middleware;
pub mod operation;
pub mod options;
pub mod value;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use clock::{Clock, SystemClock};
pub use duration::DurationMs;
pub use error::FoundryError;
pub use events::{EventBus, EventSubscriber, OperationEvent};
pub use foundry::Foundry;
pub use id::{ExecutionId, OperationId, WorkflowId};
pub use logging::{Field, Logger, NullLogger, TracingLogger};
pub use middleware::{Next, OperationMiddleware, execute_with_middleware, operation_middleware_fn};
pub use operation::{Operation, TypedOperation, run_operation};
pub use options::Options;
pub use value::{Value, ValueList};
pub use workflow::{Workflow, WorkflowBuilder};
