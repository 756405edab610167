//! Workflow-level middleware: the same Russian-doll pattern as
//! `foundry_core::middleware`, applied around an entire workflow run
//! instead of a single step (spec §4.3 step 3).

use foundry_core::{Foundry, FoundryError, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The workflow's core execution block — what the innermost middleware
/// frame ultimately calls. Boxed so `Smith` doesn't need a generic
/// parameter per workflow shape.
pub(crate) type CoreFn = dyn for<'a> Fn(&'a Foundry, CancellationToken) -> BoxFuture<'a, Result<Value, FoundryError>>
    + Send
    + Sync;

/// A single frame in the workflow-middleware chain.
#[async_trait::async_trait]
pub trait WorkflowMiddleware: Send + Sync {
    /// Run this middleware's logic, calling `next.run(...)` to continue.
    async fn execute(
        &self,
        foundry: &Foundry,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError>;
}

/// The remainder of the workflow-middleware chain, plus the core execution
/// block it ultimately wraps.
pub struct Next<'a> {
    core: &'a CoreFn,
    middleware: &'a [Arc<dyn WorkflowMiddleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(core: &'a CoreFn, middleware: &'a [Arc<dyn WorkflowMiddleware>]) -> Self {
        Next { core, middleware }
    }

    /// Continue the chain: either invoke the next middleware, or — once
    /// exhausted — run the core execution block.
    pub async fn run(self, foundry: &Foundry, cancel: CancellationToken) -> Result<Value, FoundryError> {
        match self.middleware.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    core: self.core,
                    middleware: rest,
                };
                first.execute(foundry, next, cancel).await
            }
            None => (self.core)(foundry, cancel).await,
        }
    }
}

/// Drive `core` (the workflow's core execution block) through `middleware`
/// (outermost-first). Internal to this crate: `core` is always `Smith`'s
/// own execution algorithm, never user-supplied.
pub(crate) async fn execute_with_middleware(
    middleware: &[Arc<dyn WorkflowMiddleware>],
    core: &CoreFn,
    foundry: &Foundry,
    cancel: CancellationToken,
) -> Result<Value, FoundryError> {
    Next::new(core, middleware).run(foundry, cancel).await
}

struct MiddlewareFn<F>(F);

#[async_trait::async_trait]
impl<F> WorkflowMiddleware for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a Foundry, Next<'a>, CancellationToken) -> BoxFuture<'a, Result<Value, FoundryError>>
        + Send
        + Sync,
{
    async fn execute(
        &self,
        foundry: &Foundry,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        (self.0)(foundry, next, cancel).await
    }
}

/// Build a [`WorkflowMiddleware`] from a closure, mirroring
/// `foundry_core::operation_middleware_fn` at workflow scope.
pub fn workflow_middleware_fn<F>(f: F) -> impl WorkflowMiddleware
where
    F: for<'a> Fn(&'a Foundry, Next<'a>, CancellationToken) -> BoxFuture<'a, Result<Value, FoundryError>>
        + Send
        + Sync,
{
    MiddlewareFn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::Options;
    use std::sync::Mutex;

    #[tokio::test]
    async fn russian_doll_order_first_added_is_outermost() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let m1 = workflow_middleware_fn(move |foundry, next, cancel| {
            let o1 = o1.clone();
            Box::pin(async move {
                o1.lock().unwrap().push("m1-enter");
                let r = next.run(foundry, cancel).await;
                o1.lock().unwrap().push("m1-exit");
                r
            })
        });
        let o2 = order.clone();
        let m2 = workflow_middleware_fn(move |foundry, next, cancel| {
            let o2 = o2.clone();
            Box::pin(async move {
                o2.lock().unwrap().push("m2-enter");
                let r = next.run(foundry, cancel).await;
                o2.lock().unwrap().push("m2-exit");
                r
            })
        });
        let chain: Vec<Arc<dyn WorkflowMiddleware>> = vec![Arc::new(m1), Arc::new(m2)];
        let foundry = Foundry::new(Arc::new(foundry_core::NullLogger), Options::default());
        let core: &CoreFn = &|_f: &Foundry, _c: CancellationToken| -> BoxFuture<'_, Result<Value, FoundryError>> {
            Box::pin(async { Ok(Value::null()) })
        };
        execute_with_middleware(&chain, core, &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec!["m1-enter", "m2-enter", "m2-exit", "m1-exit"]
        );
    }
}
