//! `Conditional`: a 1-of-N branch operation with branch-remembered
//! compensation (spec §4.4).

use crate::condition::Condition;
use async_trait::async_trait;
use foundry_core::{Foundry, FoundryError, Operation, OperationId, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Branches execution on a [`Condition`]: `true_op` on true, `false_op` on
/// false if set, otherwise `null`. Remembers which branch ran so `restore`
/// routes to the same one — restore never toggles branches across retries.
pub struct Conditional {
    id: OperationId,
    name: String,
    condition: Arc<dyn Condition>,
    true_op: Arc<dyn Operation>,
    false_op: Option<Arc<dyn Operation>>,
    last_branch: Mutex<Option<bool>>,
    disposed: AtomicBool,
}

impl Conditional {
    /// Build a new conditional operation.
    pub fn new(
        name: impl Into<String>,
        condition: Arc<dyn Condition>,
        true_op: Arc<dyn Operation>,
        false_op: Option<Arc<dyn Operation>>,
    ) -> Self {
        Conditional {
            id: OperationId::generate(),
            name: name.into(),
            condition,
            true_op,
            false_op,
            last_branch: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn fail_if_disposed(&self) -> Result<(), FoundryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(FoundryError::InvalidState(
                "conditional operation is disposed".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Operation for Conditional {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_restore(&self) -> bool {
        self.true_op.supports_restore() || self.false_op.as_ref().is_some_and(|op| op.supports_restore())
    }

    async fn execute(
        &self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        self.fail_if_disposed()?;
        let branch = self.condition.evaluate(&input, foundry, &cancel).await?;
        *self.last_branch.lock().unwrap() = Some(branch);

        if branch {
            self.true_op.execute(input, foundry, cancel).await
        } else if let Some(false_op) = &self.false_op {
            false_op.execute(input, foundry, cancel).await
        } else {
            Ok(Value::null())
        }
    }

    async fn restore(
        &self,
        output: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<(), FoundryError> {
        self.fail_if_disposed()?;
        let branch = *self.last_branch.lock().unwrap();
        match branch {
            Some(true) => self.true_op.restore(output, foundry, cancel).await,
            Some(false) => match &self.false_op {
                Some(false_op) => false_op.restore(output, foundry, cancel).await,
                None => Ok(()),
            },
            None => Err(FoundryError::InvalidState(
                "conditional operation has never executed".into(),
            )),
        }
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.true_op.dispose().await;
        if let Some(false_op) = &self.false_op {
            false_op.dispose().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::simple_condition_fn;
    use foundry_core::test_support::{EchoOperation, fixed_foundry};

    fn cond_true() -> Arc<dyn Condition> {
        Arc::new(simple_condition_fn(|_| true))
    }

    fn cond_false() -> Arc<dyn Condition> {
        Arc::new(simple_condition_fn(|_| false))
    }

    #[tokio::test]
    async fn true_branch_delegates_to_true_op() {
        let op = Conditional::new(
            "c",
            cond_true(),
            Arc::new(EchoOperation::new("t")),
            Some(Arc::new(EchoOperation::new("f"))),
        );
        let foundry = fixed_foundry();
        let out = op
            .execute(Value::new(1i32), &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.downcast_ref::<i32>(), Some(&1));
    }

    #[tokio::test]
    async fn false_branch_without_false_op_returns_null() {
        let op = Conditional::new("c", cond_false(), Arc::new(EchoOperation::new("t")), None);
        let foundry = fixed_foundry();
        let out = op
            .execute(Value::new(1i32), &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_null());
    }

    #[tokio::test]
    async fn restore_routes_to_the_branch_that_ran() {
        use foundry_core::test_support::RecordingOperation;
        let log = Arc::new(Mutex::new(Vec::new()));
        let true_op: Arc<dyn Operation> = Arc::new(RecordingOperation::new("t", false, log.clone()));
        let false_op: Arc<dyn Operation> = Arc::new(RecordingOperation::new("f", false, log.clone()));
        let op = Conditional::new("c", cond_false(), true_op, Some(false_op));
        let foundry = fixed_foundry();
        op.execute(Value::new(1i32), &foundry, CancellationToken::new())
            .await
            .unwrap();
        op.restore(Value::null(), &foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["execute:f", "restore:f"]);
    }

    #[tokio::test]
    async fn restore_before_execute_fails() {
        let op = Conditional::new("c", cond_true(), Arc::new(EchoOperation::new("t")), None);
        let foundry = fixed_foundry();
        let err = op
            .restore(Value::null(), &foundry, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FoundryError::InvalidState(_)));
    }

    #[tokio::test]
    async fn execute_after_dispose_fails() {
        let op = Conditional::new("c", cond_true(), Arc::new(EchoOperation::new("t")), None);
        op.dispose().await;
        let foundry = fixed_foundry();
        let err = op
            .execute(Value::null(), &foundry, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FoundryError::InvalidState(_)));
    }
}
