//! The operation contract (spec §4.1).
//!
//! `Operation` is the unit of work the engine drives: `execute`, optional
//! `restore` (compensation), and `dispose`. It's generalized from the
//! teacher lineage's single-method `Operator` trait (`async fn execute`)
//! into the four-behavior shape the spec calls for, keeping the same
//! object-safety discipline: one trait, `#[async_trait]`, `Send + Sync`,
//! dispatched through `Arc<dyn Operation>`.

use crate::error::FoundryError;
use crate::foundry::Foundry;
use crate::id::OperationId;
use crate::value::Value;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A single unit of work the engine can run, restore, and dispose.
///
/// Operations may hold internal mutable state, but the engine makes no
/// re-entrancy guarantee: an operation instance referenced by at most one
/// live [`crate::Workflow`] should not assume it won't be invoked again
/// concurrently unless it manages that itself.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Unique identity of this operation instance.
    fn id(&self) -> &OperationId;

    /// Free-form, human-readable name.
    fn name(&self) -> &str;

    /// Whether `restore` is meaningful for this operation. Defaults to
    /// `false`; compensation skips operations that report `false` rather
    /// than calling `restore` and swallowing a `NotSupported` error.
    fn supports_restore(&self) -> bool {
        false
    }

    /// Runs before `execute`, inside the same step (middlewares see this as
    /// part of `execute`, not as a separate step).
    async fn on_before_execute(
        &self,
        _input: &Value,
        _foundry: &Foundry,
        _cancel: &CancellationToken,
    ) -> Result<(), FoundryError> {
        Ok(())
    }

    /// The operation's primary behavior.
    async fn execute(
        &self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError>;

    /// Runs after `execute` returns successfully, inside the same step.
    async fn on_after_execute(
        &self,
        _input: &Value,
        _output: &Value,
        _foundry: &Foundry,
        _cancel: &CancellationToken,
    ) -> Result<(), FoundryError> {
        Ok(())
    }

    /// Reverses the effect of a prior `execute` call, given that call's
    /// output. Only ever invoked by engine-driven compensation when
    /// `supports_restore()` is `true`; a direct call on an operation that
    /// reports `false` returns [`FoundryError::NotSupported`].
    async fn restore(
        &self,
        _output: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<(), FoundryError> {
        Err(FoundryError::NotSupported(self.name().to_string()))
    }

    /// Releases any resources held by this operation. Must not let an
    /// internal failure escape; implementations that can fail should log
    /// and swallow.
    async fn dispose(&self) {}
}

/// Runs an operation's before/execute/after sequence as a single unit —
/// this is what sits at the innermost frame of the operation-middleware
/// chain (spec §4.1: "hooks run within the operation-middleware innermost
/// frame").
pub async fn run_operation(
    op: &dyn Operation,
    input: Value,
    foundry: &Foundry,
    cancel: CancellationToken,
) -> Result<Value, FoundryError> {
    op.on_before_execute(&input, foundry, &cancel).await?;
    let output = op.execute(input.clone(), foundry, cancel.clone()).await?;
    op.on_after_execute(&input, &output, foundry, &cancel).await?;
    Ok(output)
}

/// A checked-downcast wrapper around an [`Operation`] whose input and
/// output are a known concrete type.
///
/// On a type mismatch the wrapped operation is never invoked; the wrapper
/// fails with [`FoundryError::InvalidArgument`] carrying both the declared
/// and the actual type name, per spec §4.1.
pub struct TypedOperation<I, O> {
    inner: Box<dyn Operation>,
    _marker: std::marker::PhantomData<(I, O)>,
}

impl<I, O> TypedOperation<I, O>
where
    I: std::any::Any + Send + Sync + Clone,
    O: std::any::Any + Send + Sync + Clone,
{
    /// Wrap an existing operation with a typed input/output boundary.
    pub fn new(inner: Box<dyn Operation>) -> Self {
        TypedOperation {
            inner,
            _marker: std::marker::PhantomData,
        }
    }

    /// Execute with a concrete typed input, returning a concrete typed
    /// output. A `null` input is accepted only if `I` is `()`.
    pub async fn execute_typed(
        &self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<O, FoundryError> {
        if input.is_null() && !input.is::<I>() {
            return Err(FoundryError::InvalidArgument(format!(
                "null input is not accepted: declared type is {}",
                std::any::type_name::<I>()
            )));
        }
        if !input.is::<I>() {
            return Err(FoundryError::InvalidArgument(format!(
                "input type mismatch: declared {}, actual {}",
                std::any::type_name::<I>(),
                input.type_name()
            )));
        }
        let output = run_operation(self.inner.as_ref(), input, foundry, cancel).await?;
        match output.downcast_ref::<O>() {
            Some(o) => Ok(o.clone()),
            None => Err(FoundryError::InvalidArgument(format!(
                "output type mismatch: declared {}, actual {}",
                std::any::type_name::<O>(),
                output.type_name()
            ))),
        }
    }
}
