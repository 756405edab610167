//! Smith: the orchestrator (spec §4.3).
//!
//! Runs a workflow on a foundry, enforces a global concurrency cap over
//! concurrent workflow executions, fires workflow-level events, and drives
//! reverse-order Saga compensation after failure. The dispatch/registration
//! shape (a long-lived struct a caller drives workflows through) is
//! grounded on `neuron-orch-local::LocalOrch`; the bounded-concurrency gate
//! is a `tokio::sync::Semaphore`, the same primitive `foundry-ops::ForEach`
//! uses for per-child throttling.

use crate::events::{CompensationEvent, WorkflowEvent};
use crate::middleware::{CoreFn, WorkflowMiddleware, execute_with_middleware};
use foundry_core::{DurationMs, EventBus, EventSubscriber, Foundry, FoundryError, Logger, NullLogger, Operation, Options, Value, Workflow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// The workflow orchestrator.
pub struct Smith {
    logger: Arc<dyn Logger>,
    options: Options,
    workflow_middlewares: RwLock<Vec<Arc<dyn WorkflowMiddleware>>>,
    semaphore: Option<Arc<Semaphore>>,
    workflow_events: EventBus<WorkflowEvent>,
    compensation_events: EventBus<CompensationEvent>,
    disposed: AtomicBool,
}

impl Smith {
    /// Build a new Smith.
    pub fn new(logger: Arc<dyn Logger>, options: Options) -> Self {
        let semaphore = if options.max_concurrent_workflows > 0 {
            Some(Arc::new(Semaphore::new(options.max_concurrent_workflows)))
        } else {
            None
        };
        Smith {
            logger,
            options,
            workflow_middlewares: RwLock::new(Vec::new()),
            semaphore,
            workflow_events: EventBus::new(),
            compensation_events: EventBus::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// A Smith with a `NullLogger` and default options.
    pub fn simple() -> Self {
        Smith::new(Arc::new(NullLogger), Options::default())
    }

    /// This Smith's options snapshot.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Extend the workflow-level middleware pipeline. Must be called
    /// before the first `forge` call that should observe it.
    pub fn add_workflow_middleware(&self, middleware: Arc<dyn WorkflowMiddleware>) -> Result<(), FoundryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(FoundryError::InvalidState("smith is disposed".into()));
        }
        self.workflow_middlewares.write().unwrap().push(middleware);
        Ok(())
    }

    /// Read-only introspection of the installed workflow-middleware list.
    pub fn workflow_middlewares(&self) -> Vec<Arc<dyn WorkflowMiddleware>> {
        self.workflow_middlewares.read().unwrap().clone()
    }

    /// Subscribe to workflow events.
    pub fn subscribe_workflow_events(&self, subscriber: Arc<dyn EventSubscriber<WorkflowEvent>>) {
        self.workflow_events.subscribe(subscriber);
    }

    /// Subscribe to compensation events.
    pub fn subscribe_compensation_events(&self, subscriber: Arc<dyn EventSubscriber<CompensationEvent>>) {
        self.compensation_events.subscribe(subscriber);
    }

    /// Build a new Foundry cloning this Smith's options and propagating
    /// its logger.
    pub fn create_foundry(&self) -> Foundry {
        Foundry::new(self.logger.clone(), self.options.clone())
    }

    /// Build a new Foundry already bound to `workflow`.
    pub fn create_foundry_for(&self, workflow: Arc<Workflow>) -> Result<Foundry, FoundryError> {
        let foundry = self.create_foundry();
        foundry.set_current_workflow(workflow)?;
        Ok(foundry)
    }

    /// Build a new Foundry seeded with `data`.
    pub fn create_foundry_with_data(&self, data: HashMap<String, Value>) -> Foundry {
        let foundry = self.create_foundry();
        for (key, value) in data {
            foundry.set_property(key, value);
        }
        foundry
    }

    /// Run `workflow` on a freshly created, internally owned foundry,
    /// disposing it afterward regardless of outcome.
    pub async fn forge(&self, workflow: Arc<Workflow>) -> Result<Value, FoundryError> {
        self.forge_with_data(workflow, HashMap::new()).await
    }

    /// Like [`Smith::forge`], seeding the internal foundry with `data`
    /// before running.
    pub async fn forge_with_data(
        &self,
        workflow: Arc<Workflow>,
        data: HashMap<String, Value>,
    ) -> Result<Value, FoundryError> {
        let foundry = self.create_foundry_with_data(data);
        foundry.set_current_workflow(workflow.clone())?;
        let result = self.forge_on(workflow, &foundry, CancellationToken::new()).await;
        foundry.dispose().await;
        result
    }

    /// Run `workflow` on a caller-owned `foundry`. The caller retains
    /// ownership of the foundry's lifetime (it is not disposed here).
    pub async fn forge_on(
        &self,
        workflow: Arc<Workflow>,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(FoundryError::InvalidState("smith is disposed".into()));
        }

        let _permit = match &self.semaphore {
            Some(semaphore) => {
                let semaphore = semaphore.clone();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FoundryError::Cancelled),
                    acquired = semaphore.acquire_owned() => {
                        match acquired {
                            Ok(permit) => Some(permit),
                            Err(_) => return Err(FoundryError::InvalidState("smith's concurrency gate is closed".into())),
                        }
                    }
                }
            }
            None => None,
        };

        foundry.set_current_workflow(workflow.clone())?;

        let middlewares = self.workflow_middlewares.read().unwrap().clone();
        let core: &CoreFn = &|foundry: &Foundry, cancel: CancellationToken| {
            Box::pin(self.execute_workflow_core(workflow.clone(), foundry, cancel))
        };
        execute_with_middleware(&middlewares, core, foundry, cancel).await
    }

    async fn execute_workflow_core(
        &self,
        workflow: Arc<Workflow>,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        let scoped_logger = self.logger.child(vec![
            ("workflow_id", workflow.id().to_string()),
            ("workflow_name", workflow.name().to_string()),
            ("execution_id", foundry.execution_id().to_string()),
        ]);

        self.workflow_events.emit(WorkflowEvent::Started, scoped_logger.as_ref()).await;

        foundry.replace_operations(workflow.operations().to_vec())?;

        let start = std::time::Instant::now();
        let outcome = foundry.forge(cancel.clone()).await;
        let duration = DurationMs::from(start.elapsed());

        match outcome {
            Ok(result) => {
                self.workflow_events
                    .emit(
                        WorkflowEvent::Completed {
                            properties: foundry.properties_snapshot(),
                            duration,
                        },
                        scoped_logger.as_ref(),
                    )
                    .await;
                Ok(result)
            }
            Err(err) if err.is_cancelled() => {
                scoped_logger.warn("workflow run cancelled", &[]);
                Err(err)
            }
            Err(err) => {
                let last_failed_name = foundry
                    .get_property("Operation.LastFailedName")
                    .and_then(|v| v.downcast_ref::<String>().cloned());
                self.workflow_events
                    .emit(
                        WorkflowEvent::Failed {
                            error: err.to_string(),
                            last_failed_operation_name: last_failed_name,
                            duration,
                        },
                        scoped_logger.as_ref(),
                    )
                    .await;

                let last_completed_index = foundry
                    .get_property("Operation.LastCompletedIndex")
                    .and_then(|v| v.downcast_ref::<usize>().copied())
                    .map(|i| i as i64)
                    .unwrap_or(-1);

                let compensation_errors = self
                    .run_compensation(
                        &workflow,
                        foundry,
                        last_completed_index,
                        err.to_string(),
                        scoped_logger.as_ref(),
                        cancel,
                    )
                    .await;

                if !compensation_errors.is_empty()
                    && (self.options.fail_fast_compensation || self.options.throw_on_compensation_error)
                {
                    let mut all = vec![err];
                    all.extend(compensation_errors);
                    Err(FoundryError::aggregate(all))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn run_compensation(
        &self,
        workflow: &Workflow,
        foundry: &Foundry,
        last_completed_index: i64,
        reason: String,
        logger: &dyn Logger,
        cancel: CancellationToken,
    ) -> Vec<FoundryError> {
        if last_completed_index < 0 {
            return Vec::new();
        }

        let failed_operation_name = foundry
            .get_property("Operation.LastFailedName")
            .and_then(|v| v.downcast_ref::<String>().cloned())
            .unwrap_or_default();

        self.compensation_events
            .emit(
                CompensationEvent::Triggered {
                    reason,
                    failed_operation_name,
                },
                logger,
            )
            .await;

        let start = std::time::Instant::now();
        let mut success_count = 0usize;
        let mut errors = Vec::new();

        let mut i = last_completed_index;
        while i >= 0 {
            let op: &Arc<dyn Operation> = &workflow.operations()[i as usize];
            if !op.supports_restore() {
                logger.debug("skipping restore: operation does not support it", &[("operation", op.name().to_string())]);
                i -= 1;
                continue;
            }

            self.compensation_events
                .emit(
                    CompensationEvent::OperationRestoreStarted {
                        operation_name: op.name().to_string(),
                    },
                    logger,
                )
                .await;

            let output = foundry
                .get_property(&format!("Operation.{}.Output", op.id()))
                .unwrap_or_else(Value::null);

            let restore_start = std::time::Instant::now();
            let restore_result = op.restore(output, foundry, cancel.clone()).await;
            let restore_duration = DurationMs::from(restore_start.elapsed());

            match restore_result {
                Ok(()) => {
                    success_count += 1;
                    self.compensation_events
                        .emit(
                            CompensationEvent::OperationRestoreCompleted {
                                operation_name: op.name().to_string(),
                                duration: restore_duration,
                            },
                            logger,
                        )
                        .await;
                }
                Err(err) => {
                    self.compensation_events
                        .emit(
                            CompensationEvent::OperationRestoreFailed {
                                operation_name: op.name().to_string(),
                                error: err.to_string(),
                                duration: restore_duration,
                            },
                            logger,
                        )
                        .await;
                    let fail_fast = self.options.fail_fast_compensation;
                    errors.push(err);
                    if fail_fast {
                        break;
                    }
                }
            }
            i -= 1;
        }

        self.compensation_events
            .emit(
                CompensationEvent::Completed {
                    success_count,
                    failure_count: errors.len(),
                    duration: DurationMs::from(start.elapsed()),
                },
                logger,
            )
            .await;

        errors
    }

    /// Release the concurrency gate. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(semaphore) = &self.semaphore {
            semaphore.close();
        }
    }
}
