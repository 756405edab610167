//! The condition predicate `Conditional` branches on, plus the closure
//! adapters spec §4.4 calls "factory variants" (data-aware, typed, and
//! simple sync conditions — they differ only in how the underlying
//! function is adapted into a [`Condition`]).

use async_trait::async_trait;
use foundry_core::{Foundry, FoundryError, Value};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A predicate a [`crate::Conditional`] evaluates once per `execute` call.
#[async_trait]
pub trait Condition: Send + Sync {
    /// Evaluate the predicate against the step's input and context.
    async fn evaluate(
        &self,
        input: &Value,
        foundry: &Foundry,
        cancel: &CancellationToken,
    ) -> Result<bool, FoundryError>;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct ConditionFn<F>(F);

#[async_trait]
impl<F> Condition for ConditionFn<F>
where
    F: for<'a> Fn(&'a Value, &'a Foundry, &'a CancellationToken) -> BoxFuture<'a, Result<bool, FoundryError>>
        + Send
        + Sync,
{
    async fn evaluate(
        &self,
        input: &Value,
        foundry: &Foundry,
        cancel: &CancellationToken,
    ) -> Result<bool, FoundryError> {
        (self.0)(input, foundry, cancel).await
    }
}

/// Build a data-aware [`Condition`] from an async closure with full access
/// to the input, foundry, and cancellation token.
pub fn condition_fn<F>(f: F) -> impl Condition
where
    F: for<'a> Fn(&'a Value, &'a Foundry, &'a CancellationToken) -> BoxFuture<'a, Result<bool, FoundryError>>
        + Send
        + Sync,
{
    ConditionFn(f)
}

struct TypedConditionFn<T, F> {
    f: F,
    _marker: std::marker::PhantomData<fn(&T)>,
}

#[async_trait]
impl<T, F> Condition for TypedConditionFn<T, F>
where
    T: std::any::Any + Send + Sync,
    F: Fn(&T) -> bool + Send + Sync,
{
    async fn evaluate(
        &self,
        input: &Value,
        _foundry: &Foundry,
        _cancel: &CancellationToken,
    ) -> Result<bool, FoundryError> {
        match input.downcast_ref::<T>() {
            Some(typed) => Ok((self.f)(typed)),
            None => Err(FoundryError::InvalidArgument(format!(
                "condition expects input type {}, got {}",
                std::any::type_name::<T>(),
                input.type_name()
            ))),
        }
    }
}

/// Build a [`Condition`] from a sync predicate over a checked-downcast
/// typed input, failing with `InvalidArgument` on a type mismatch.
pub fn typed_condition_fn<T, F>(f: F) -> impl Condition
where
    T: std::any::Any + Send + Sync,
    F: Fn(&T) -> bool + Send + Sync,
{
    TypedConditionFn {
        f,
        _marker: std::marker::PhantomData,
    }
}

struct SimpleConditionFn<F>(F);

#[async_trait]
impl<F> Condition for SimpleConditionFn<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    async fn evaluate(
        &self,
        input: &Value,
        _foundry: &Foundry,
        _cancel: &CancellationToken,
    ) -> Result<bool, FoundryError> {
        Ok((self.0)(input))
    }
}

/// Build a [`Condition`] from a plain sync predicate over the untyped
/// input, ignoring foundry and cancellation.
pub fn simple_condition_fn<F>(f: F) -> impl Condition
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    SimpleConditionFn(f)
}
