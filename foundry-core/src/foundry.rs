//! Foundry: the execution driver (spec §4.2).
//!
//! Carries the concurrent property map, the to-run operation list, the
//! operation-middleware pipeline, and the operation event bus. The
//! `Properties` map follows the teacher lineage's
//! `layer0::test_utils::InMemoryStore` shape: a `std::sync::RwLock`-guarded
//! `HashMap`, not an async lock — every access is a short, synchronous
//! critical section.

use crate::clock::{Clock, SystemClock};
use crate::duration::DurationMs;
use crate::error::FoundryError;
use crate::events::{EventBus, EventSubscriber, OperationEvent};
use crate::id::ExecutionId;
use crate::logging::{Logger, NullLogger};
use crate::middleware::{OperationMiddleware, execute_with_middleware};
use crate::operation::Operation;
use crate::options::Options;
use crate::value::Value;
use crate::workflow::Workflow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Reserved `Properties` key prefix. User code should treat anything under
/// this namespace as a read-only engine output.
pub const RESERVED_PREFIX: &str = "Operation.";

/// The per-execution context: property store, to-run operation list,
/// operation-middleware pipeline, and operation events.
///
/// May be reused across sequential executions (never concurrent ones —
/// `forge` is not re-entrant, invariant 3).
pub struct Foundry {
    execution_id: ExecutionId,
    properties: RwLock<HashMap<String, Value>>,
    current_workflow: RwLock<Option<Arc<Workflow>>>,
    logger: Arc<dyn Logger>,
    options: Options,
    clock: Arc<dyn Clock>,
    operations: RwLock<Vec<Arc<dyn Operation>>>,
    operation_middlewares: RwLock<Vec<Arc<dyn OperationMiddleware>>>,
    operation_events: EventBus<OperationEvent>,
    frozen: AtomicBool,
    executing: AtomicBool,
    disposed: AtomicBool,
}

/// Clears `executing` and `frozen` on drop, so the "finally" half of the
/// forge algorithm runs even if the `forge` future is dropped mid-flight
/// (e.g. it loses a `select!`/timeout race one layer up) or a step panics.
struct ExecutionGuard<'a> {
    executing: &'a AtomicBool,
    frozen: &'a AtomicBool,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.executing.store(false, Ordering::Release);
        self.frozen.store(false, Ordering::Release);
    }
}

impl Foundry {
    /// Build a new, empty Foundry.
    pub fn new(logger: Arc<dyn Logger>, options: Options) -> Self {
        Foundry::with_clock(logger, options, Arc::new(SystemClock))
    }

    /// Build a new Foundry with an explicit clock (used by tests that need
    /// deterministic durations).
    pub fn with_clock(logger: Arc<dyn Logger>, options: Options, clock: Arc<dyn Clock>) -> Self {
        Foundry {
            execution_id: ExecutionId::generate(),
            properties: RwLock::new(HashMap::new()),
            current_workflow: RwLock::new(None),
            logger,
            options,
            clock,
            operations: RwLock::new(Vec::new()),
            operation_middlewares: RwLock::new(Vec::new()),
            operation_events: EventBus::new(),
            frozen: AtomicBool::new(false),
            executing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// A Foundry with a `NullLogger` and default options. Convenient for
    /// tests and quick scripts.
    pub fn simple() -> Self {
        Foundry::new(Arc::new(NullLogger), Options::default())
    }

    /// This execution's unique id.
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// This Foundry's logger.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// This Foundry's options snapshot.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The workflow currently bound to this Foundry, if any.
    pub fn current_workflow(&self) -> Option<Arc<Workflow>> {
        self.current_workflow.read().unwrap().clone()
    }

    /// True while `frozen` — mutating calls fail.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// True while a `forge` call is in flight.
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    /// True once `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn fail_if_frozen_or_disposed(&self) -> Result<(), FoundryError> {
        if self.is_disposed() {
            return Err(FoundryError::InvalidState("foundry is disposed".into()));
        }
        if self.is_frozen() {
            return Err(FoundryError::InvalidState(
                "foundry is frozen while executing".into(),
            ));
        }
        Ok(())
    }

    /// Bind a workflow: sets the current-workflow pointer. Does not install
    /// its operations — that's `forge`'s job once `execute_workflow`
    /// (Smith) calls `replace_operations`.
    pub fn set_current_workflow(&self, workflow: Arc<Workflow>) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        for (key, value) in workflow.properties() {
            self.properties.write().unwrap().insert(key.clone(), value.clone());
        }
        *self.current_workflow.write().unwrap() = Some(workflow);
        Ok(())
    }

    /// Append one operation to the to-run list.
    pub fn add_operation(&self, op: Arc<dyn Operation>) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        self.operations.write().unwrap().push(op);
        Ok(())
    }

    /// Replace the entire to-run list.
    pub fn replace_operations(&self, ops: Vec<Arc<dyn Operation>>) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        *self.operations.write().unwrap() = ops;
        Ok(())
    }

    /// Append one operation-middleware to the pipeline.
    pub fn add_middleware(&self, middleware: Arc<dyn OperationMiddleware>) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        self.operation_middlewares.write().unwrap().push(middleware);
        Ok(())
    }

    /// Append several operation-middlewares to the pipeline, preserving
    /// the order given (the first of `middlewares` becomes outermost
    /// relative to the others in this call, inserted after any middleware
    /// already registered).
    pub fn add_middlewares(
        &self,
        middlewares: impl IntoIterator<Item = Arc<dyn OperationMiddleware>>,
    ) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        self.operation_middlewares.write().unwrap().extend(middlewares);
        Ok(())
    }

    /// Remove a previously added middleware by `Arc` identity.
    pub fn remove_middleware(&self, middleware: &Arc<dyn OperationMiddleware>) -> Result<(), FoundryError> {
        self.fail_if_frozen_or_disposed()?;
        self.operation_middlewares
            .write()
            .unwrap()
            .retain(|m| !Arc::ptr_eq(m, middleware));
        Ok(())
    }

    /// Read-only introspection of the installed operation-middleware list
    /// (supplemented feature; see SPEC_FULL.md).
    pub fn operation_middlewares(&self) -> Vec<Arc<dyn OperationMiddleware>> {
        self.operation_middlewares.read().unwrap().clone()
    }

    /// Subscribe to operation events.
    pub fn subscribe_operation_events(&self, subscriber: Arc<dyn EventSubscriber<OperationEvent>>) {
        self.operation_events.subscribe(subscriber);
    }

    /// Read a property.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties.read().unwrap().get(key).cloned()
    }

    /// Write a property. Safe to call concurrently from any thread;
    /// user code must not write under the `Operation.` reserved prefix
    /// during the step in which the engine itself writes it (invariant 7).
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.properties.write().unwrap().insert(key.into(), value);
    }

    /// A snapshot of every property currently stored.
    pub fn properties_snapshot(&self) -> HashMap<String, Value> {
        self.properties.read().unwrap().clone()
    }

    /// Execute the to-run operation list sequentially (spec §4.2 Forge
    /// algorithm). Returns the final chained value (or `Value::null()` if
    /// chaining is disabled or the list only ever received null input).
    pub async fn forge(&self, cancel: tokio_util::sync::CancellationToken) -> Result<Value, FoundryError> {
        if self.is_disposed() {
            return Err(FoundryError::InvalidState("foundry is disposed".into()));
        }
        if self
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FoundryError::InvalidState(
                "foundry is already executing (not re-entrant)".into(),
            ));
        }
        self.frozen.store(true, Ordering::Release);
        let _guard = ExecutionGuard {
            executing: &self.executing,
            frozen: &self.frozen,
        };
        self.forge_inner(cancel).await
    }

    async fn forge_inner(&self, cancel: tokio_util::sync::CancellationToken) -> Result<Value, FoundryError> {
        let ops: Vec<Arc<dyn Operation>> = self.operations.read().unwrap().clone();
        let middlewares: Vec<Arc<dyn OperationMiddleware>> =
            self.operation_middlewares.read().unwrap().clone();

        let mut chained_input = Value::null();
        let mut errors: Vec<FoundryError> = Vec::new();

        for (index, op) in ops.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(FoundryError::Cancelled);
            }

            self.operation_events
                .emit(
                    OperationEvent::Started {
                        operation_id: op.id().clone(),
                        operation_name: op.name().to_string(),
                    },
                    self.logger.as_ref(),
                )
                .await;
            self.set_property("Operation.CurrentIndex", Value::new(index));

            let start = self.clock.now();
            let outcome = execute_with_middleware(
                op.as_ref(),
                &middlewares,
                chained_input.clone(),
                self,
                cancel.clone(),
            )
            .await;
            let duration = DurationMs::from(self.clock.now().duration_since(start));

            match outcome {
                Ok(output) => {
                    if self.options.enable_output_chaining {
                        chained_input = output.clone();
                    }
                    self.set_property(
                        format!("Operation.Output.{}.{}", index, op.name()),
                        output.clone(),
                    );
                    self.set_property("Operation.LastCompletedIndex", Value::new(index));
                    self.set_property("Operation.LastCompletedName", Value::new(op.name().to_string()));
                    self.set_property("Operation.LastCompletedId", Value::new(op.id().to_string()));
                    self.set_property(format!("Operation.{}.Output", op.id()), output.clone());
                    self.operation_events
                        .emit(
                            OperationEvent::Completed {
                                operation_id: op.id().clone(),
                                operation_name: op.name().to_string(),
                                result: output,
                                duration,
                            },
                            self.logger.as_ref(),
                        )
                        .await;
                }
                Err(err) => {
                    self.set_property("Operation.LastFailedIndex", Value::new(index));
                    self.set_property("Operation.LastFailedName", Value::new(op.name().to_string()));
                    self.set_property("Operation.LastFailedId", Value::new(op.id().to_string()));
                    self.operation_events
                        .emit(
                            OperationEvent::Failed {
                                operation_id: op.id().clone(),
                                operation_name: op.name().to_string(),
                                error: err.to_string(),
                                duration,
                            },
                            self.logger.as_ref(),
                        )
                        .await;

                    if err.is_cancelled() {
                        return Err(err);
                    }
                    if self.options.continue_on_error {
                        errors.push(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        if !errors.is_empty() {
            return Err(FoundryError::aggregate(errors));
        }
        Ok(chained_input)
    }

    /// Clear transient execution state while preserving identity: the
    /// execution id, logger, options, installed middleware list, and
    /// current-workflow pointer all survive. Fails if currently executing.
    /// (Supplemented feature — see SPEC_FULL.md Open Question
    /// resolutions.)
    pub fn reset(&self) -> Result<(), FoundryError> {
        if self.is_executing() {
            return Err(FoundryError::InvalidState(
                "cannot reset a foundry that is executing".into(),
            ));
        }
        self.properties.write().unwrap().clear();
        self.frozen.store(false, Ordering::Release);
        Ok(())
    }

    /// Detach event subscribers, dispose every installed operation once
    /// (swallowing each operation's dispose failure), and clear the
    /// operation list, middleware list, and property map.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return; // idempotent
        }
        let ops: Vec<Arc<dyn Operation>> = self.operations.write().unwrap().drain(..).collect();
        for op in ops {
            op.dispose().await;
        }
        self.operation_middlewares.write().unwrap().clear();
        self.properties.write().unwrap().clear();
    }
}
