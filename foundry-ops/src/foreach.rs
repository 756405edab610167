//! `ForEach`: bounded-parallel fan-out over a list of child operations
//! (spec §4.5 — "the hardest subsystem").
//!
//! Children are regular [`Operation`]s, so they may themselves be
//! composites (a `ForEach` of `Conditional`s, or nested `ForEach`). Child
//! futures are driven concurrently in the calling task via
//! `futures_util::stream::FuturesOrdered` rather than `tokio::spawn`,
//! since each child borrows `&Foundry` for the duration of its call and
//! that borrow generally isn't `'static`. Declared child order is
//! preserved in the result array regardless of completion order, because
//! `FuturesOrdered` yields items in push order, not completion order.

use async_trait::async_trait;
use foundry_core::{Foundry, FoundryError, Operation, OperationId, Value, ValueList};
use futures_util::stream::{FuturesOrdered, FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How input is distributed to each child (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStrategy {
    /// Every child receives the same input value.
    Shared,
    /// Every child receives `Value::null()`.
    None,
    /// Child `i` receives element `i` of a [`ValueList`] input (or `null`
    /// if `i` is out of range). A non-list input degenerates to `Shared`.
    Split,
}

/// The canonical output of a successful `ForEach::execute` (spec §4.5
/// step 6).
#[derive(Debug, Clone)]
pub struct ForEachResults {
    /// Per-child outputs, ordered by declared child index.
    pub results: ValueList,
    /// `results.len()`, kept as a field to match the wire shape described
    /// in the specification.
    pub total_results: usize,
    /// When this `ForEach` call finished assembling its results.
    pub timestamp: SystemTime,
}

/// Bounded-parallel fan-out: runs every child against a (possibly shared,
/// split, or null) per-child input, with optional concurrency throttling
/// and an optional timeout, and assembles a [`ForEachResults`].
pub struct ForEach {
    id: OperationId,
    name: String,
    children: Vec<Arc<dyn Operation>>,
    timeout: Option<Duration>,
    data_strategy: DataStrategy,
    max_concurrency: Option<usize>,
    disposed: AtomicBool,
}

impl ForEach {
    /// Build a new `ForEach` over `children` (must be non-empty).
    pub fn new(
        name: impl Into<String>,
        children: Vec<Arc<dyn Operation>>,
        data_strategy: DataStrategy,
        max_concurrency: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<Self, FoundryError> {
        if children.is_empty() {
            return Err(FoundryError::InvalidArgument(
                "foreach requires at least one child".into(),
            ));
        }
        if let Some(0) = max_concurrency {
            return Err(FoundryError::InvalidArgument(
                "foreach max_concurrency must be > 0 when set".into(),
            ));
        }
        Ok(ForEach {
            id: OperationId::generate(),
            name: name.into(),
            children,
            timeout,
            data_strategy,
            max_concurrency,
            disposed: AtomicBool::new(false),
        })
    }

    fn fail_if_disposed(&self) -> Result<(), FoundryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(FoundryError::InvalidState("foreach operation is disposed".into()));
        }
        Ok(())
    }

    fn child_input(&self, index: usize, input: &Value) -> Value {
        match self.data_strategy {
            DataStrategy::Shared => input.clone(),
            DataStrategy::None => Value::null(),
            DataStrategy::Split => match input.downcast_ref::<ValueList>() {
                Some(list) => list.get(index).cloned().unwrap_or_else(Value::null),
                None => input.clone(),
            },
        }
    }
}

#[async_trait]
impl Operation for ForEach {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_restore(&self) -> bool {
        self.children.iter().any(|c| c.supports_restore())
    }

    async fn execute(
        &self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        self.fail_if_disposed()?;

        let semaphore = self.max_concurrency.map(|c| Arc::new(Semaphore::new(c)));
        let linked = cancel.child_token();
        let timeout_guard = self.timeout.map(|duration| {
            let linked = linked.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => linked.cancel(),
                    _ = linked.cancelled() => {}
                }
            })
        });

        let mut pending = FuturesOrdered::new();
        for (index, child) in self.children.iter().enumerate() {
            let child_input = self.child_input(index, &input);
            let semaphore = semaphore.clone();
            let linked = linked.clone();
            pending.push_back(async move {
                let _permit = match semaphore {
                    Some(sem) => {
                        tokio::select! {
                            biased;
                            _ = linked.cancelled() => return Err(FoundryError::Cancelled),
                            acquired = sem.acquire_owned() => match acquired {
                                Ok(permit) => Some(permit),
                                Err(_) => {
                                    return Err(FoundryError::InvalidState(
                                        "foreach concurrency gate closed".into(),
                                    ));
                                }
                            },
                        }
                    }
                    None => None,
                };
                child.execute(child_input, foundry, linked.clone()).await
            });
        }

        let mut results = Vec::with_capacity(self.children.len());
        let mut first_error: Option<FoundryError> = None;
        let mut other_errors: Vec<FoundryError> = Vec::new();

        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    linked.cancel();
                    match &first_error {
                        None => first_error = Some(err),
                        Some(_) => other_errors.push(err),
                    }
                }
            }
        }

        if let Some(guard) = timeout_guard {
            guard.abort();
        }

        if let Some(err) = first_error {
            if err.is_cancelled() {
                return Err(if cancel.is_cancelled() {
                    FoundryError::Cancelled
                } else {
                    FoundryError::Timeout
                });
            }
            if other_errors.is_empty() {
                return Err(err);
            }
            let mut all = vec![err];
            all.extend(other_errors);
            return Err(FoundryError::aggregate(all));
        }

        Ok(Value::new(ForEachResults {
            total_results: results.len(),
            results,
            timestamp: SystemTime::now(),
        }))
    }

    async fn restore(
        &self,
        output: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<(), FoundryError> {
        self.fail_if_disposed()?;

        let per_child: ValueList = if let Some(results) = output.downcast_ref::<ForEachResults>() {
            results.results.clone()
        } else if let Some(list) = output.downcast_ref::<ValueList>() {
            list.clone()
        } else {
            vec![output]
        };

        let semaphore = self.max_concurrency.map(|c| Arc::new(Semaphore::new(c)));
        let linked = cancel.child_token();

        let mut pending = FuturesUnordered::new();
        for (index, child) in self.children.iter().enumerate() {
            let value = per_child.get(index).cloned().unwrap_or_else(Value::null);
            let semaphore = semaphore.clone();
            let linked = linked.clone();
            pending.push(async move {
                let _permit = match semaphore {
                    Some(sem) => {
                        tokio::select! {
                            biased;
                            _ = linked.cancelled() => return Err(FoundryError::Cancelled),
                            acquired = sem.acquire_owned() => match acquired {
                                Ok(permit) => Some(permit),
                                Err(_) => {
                                    return Err(FoundryError::InvalidState(
                                        "foreach concurrency gate closed".into(),
                                    ));
                                }
                            },
                        }
                    }
                    None => None,
                };
                child.restore(value, foundry, linked.clone()).await
            });
        }

        let mut errors = Vec::new();
        while let Some(outcome) = pending.next().await {
            if let Err(err) = outcome {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FoundryError::aggregate(errors))
        }
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for child in &self.children {
            child.dispose().await;
        }
    }
}
