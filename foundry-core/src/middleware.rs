//! Operation-level middleware: a Russian-doll pipeline wrapped around each
//! step's `execute` call.
//!
//! Structurally this is the teacher lineage's tool middleware
//! (`neuron_tool::middleware`) generalized from `ToolCall`/`ToolDyn` to
//! `Value`/`Operation`: a recursive `Next` that peels one middleware off
//! the front of the slice per call, so the first middleware added ends up
//! outermost (entered first, exited last).

use crate::error::FoundryError;
use crate::foundry::Foundry;
use crate::operation::{Operation, run_operation};
use crate::value::Value;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A single frame in the operation-middleware chain.
#[async_trait]
pub trait OperationMiddleware: Send + Sync {
    /// Run this middleware's logic, calling `next.run(...)` to continue the
    /// chain (zero, one, or many times — the engine places no retry loop
    /// around it).
    async fn execute(
        &self,
        op: &dyn Operation,
        foundry: &Foundry,
        input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError>;
}

/// The remainder of the operation-middleware chain, plus the operation it
/// ultimately wraps.
pub struct Next<'a> {
    op: &'a dyn Operation,
    middleware: &'a [Arc<dyn OperationMiddleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(op: &'a dyn Operation, middleware: &'a [Arc<dyn OperationMiddleware>]) -> Self {
        Next { op, middleware }
    }

    /// Continue the chain: either invoke the next middleware, or — once
    /// the chain is exhausted — run the operation itself.
    pub async fn run(
        self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        match self.middleware.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    op: self.op,
                    middleware: rest,
                };
                first
                    .execute(self.op, foundry, input, next, cancel)
                    .await
            }
            None => run_operation(self.op, input, foundry, cancel).await,
        }
    }
}

/// Drive `op` through `middleware` (outermost-first) with `input`.
///
/// This is `ExecuteWithMiddleware` from spec §4.2: the same original
/// `input` is handed to every middleware frame — it is not re-chained
/// across middlewares, only across steps.
pub async fn execute_with_middleware(
    op: &dyn Operation,
    middleware: &[Arc<dyn OperationMiddleware>],
    input: Value,
    foundry: &Foundry,
    cancel: CancellationToken,
) -> Result<Value, FoundryError> {
    Next::new(op, middleware).run(input, foundry, cancel).await
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Wraps a closure as an [`OperationMiddleware`], mirroring
/// `neuron_tool::tool_middleware_fn`: ad hoc middleware without naming a
/// struct.
struct MiddlewareFn<F>(F);

#[async_trait]
impl<F> OperationMiddleware for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a dyn Operation, &'a Foundry, Value, Next<'a>, CancellationToken) -> BoxFuture<'a, Result<Value, FoundryError>>
        + Send
        + Sync,
{
    async fn execute(
        &self,
        op: &dyn Operation,
        foundry: &Foundry,
        input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        (self.0)(op, foundry, input, next, cancel).await
    }
}

/// Build an [`OperationMiddleware`] from a closure.
pub fn operation_middleware_fn<F>(f: F) -> impl OperationMiddleware
where
    F: for<'a> Fn(&'a dyn Operation, &'a Foundry, Value, Next<'a>, CancellationToken) -> BoxFuture<'a, Result<Value, FoundryError>>
        + Send
        + Sync,
{
    MiddlewareFn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EchoOperation, fixed_foundry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingMiddleware {
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait]
    impl OperationMiddleware for RecordingMiddleware {
        async fn execute(
            &self,
            _op: &dyn Operation,
            foundry: &Foundry,
            input: Value,
            next: Next<'_>,
            cancel: CancellationToken,
        ) -> Result<Value, FoundryError> {
            self.order.lock().unwrap().push(self.tag);
            let result = next.run(input, foundry, cancel).await;
            self.order.lock().unwrap().push(self.tag);
            result
        }
    }

    #[tokio::test]
    async fn russian_doll_order_first_added_is_outermost() {
        let order: Arc<std::sync::Mutex<Vec<&'static str>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let m1: Arc<dyn OperationMiddleware> = Arc::new(RecordingMiddleware {
            order: order.clone(),
            tag: "m1",
        });
        let m2: Arc<dyn OperationMiddleware> = Arc::new(RecordingMiddleware {
            order: order.clone(),
            tag: "m2",
        });
        let op = EchoOperation::new("op");
        let foundry = fixed_foundry();
        execute_with_middleware(&op, &[m1, m2], Value::new(1i32), &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["m1", "m2", "m2", "m1"]);
    }

    #[tokio::test]
    async fn middleware_fn_can_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let mw = operation_middleware_fn(move |_op, _foundry, _input, _next, _cancel| {
            let calls = calls2.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::new("short-circuited".to_string()))
            })
        });
        let mw: Arc<dyn OperationMiddleware> = Arc::new(mw);
        let op = EchoOperation::new("op");
        let foundry = fixed_foundry();
        let out = execute_with_middleware(&op, &[mw], Value::new(1i32), &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.downcast_ref::<String>().unwrap(), "short-circuited");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
