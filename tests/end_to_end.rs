//! Workspace-level integration tests exercising `foundry-core`,
//! `foundry-smith`, and `foundry-ops` together through the `foundry`
//! facade, the way `examples/custom_operator_barrier` exercises the
//! protocol crates together in the teacher lineage.

use async_trait::async_trait;
use foundry_core::test_support::EchoOperation;
use foundry_core::{
    Foundry, FoundryError, Next, Operation, OperationId, OperationMiddleware, Value, WorkflowBuilder,
};
use foundry_ops::{Condition, Conditional, DataStrategy, ForEach, ForEachResults, simple_condition_fn};
use foundry_smith::Smith;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// S6. Middleware order: one operation-level middleware pair plus the
/// hook sequence, end to end through `Smith`.
#[tokio::test]
async fn s6_middleware_and_hooks_run_in_the_documented_order() {
    struct RecordingMiddleware {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
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
            self.log.lock().unwrap().push(format!("{}.Before", self.label));
            let result = next.run(input, foundry, cancel).await;
            self.log.lock().unwrap().push(format!("{}.After", self.label));
            result
        }
    }

    struct HookedOperation {
        id: OperationId,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Operation for HookedOperation {
        fn id(&self) -> &OperationId {
            &self.id
        }

        fn name(&self) -> &str {
            "hooked"
        }

        async fn on_before_execute(
            &self,
            _input: &Value,
            _foundry: &Foundry,
            _cancel: &CancellationToken,
        ) -> Result<(), FoundryError> {
            self.log.lock().unwrap().push("op.OnBeforeExecute".to_string());
            Ok(())
        }

        async fn execute(
            &self,
            input: Value,
            _foundry: &Foundry,
            _cancel: CancellationToken,
        ) -> Result<Value, FoundryError> {
            self.log.lock().unwrap().push("op.Execute".to_string());
            Ok(input)
        }

        async fn on_after_execute(
            &self,
            _input: &Value,
            _output: &Value,
            _foundry: &Foundry,
            _cancel: &CancellationToken,
        ) -> Result<(), FoundryError> {
            self.log.lock().unwrap().push("op.OnAfterExecute".to_string());
            Ok(())
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let foundry = Foundry::simple();
    foundry
        .add_middleware(Arc::new(RecordingMiddleware {
            label: "m1",
            log: log.clone(),
        }))
        .unwrap();
    foundry
        .add_middleware(Arc::new(RecordingMiddleware {
            label: "m2",
            log: log.clone(),
        }))
        .unwrap();
    foundry
        .replace_operations(vec![Arc::new(HookedOperation {
            id: OperationId::generate(),
            log: log.clone(),
        })])
        .unwrap();

    foundry.forge(CancellationToken::new()).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "m1.Before",
            "m2.Before",
            "op.OnBeforeExecute",
            "op.Execute",
            "op.OnAfterExecute",
            "m2.After",
            "m1.After",
        ]
    );
}

/// A `ForEach` of `Conditional`s driven end to end through `Smith`, fed
/// by a split array input, proving the composites compose cleanly on top
/// of the orchestrator. The first step reads its input from a seeded
/// property rather than chained operation output, since a workflow's
/// first step always starts from `Value::null()`.
#[tokio::test]
async fn foreach_of_conditionals_runs_through_smith() {
    let double: Arc<dyn Condition> = Arc::new(simple_condition_fn(|v| {
        v.downcast_ref::<i32>().copied().unwrap_or(0) % 2 == 0
    }));

    let input: foundry_core::ValueList = vec![Value::new(2i32), Value::new(3i32), Value::new(4i32)];
    let mut data = std::collections::HashMap::new();
    data.insert("input".to_string(), Value::new(input));
    let smith = Smith::simple();
    let foundry = smith.create_foundry_with_data(data);

    struct SeedFromProperty {
        id: OperationId,
        inner: ForEach,
    }

    #[async_trait]
    impl Operation for SeedFromProperty {
        fn id(&self) -> &OperationId {
            &self.id
        }
        fn name(&self) -> &str {
            "seed-then-foreach"
        }
        async fn execute(
            &self,
            _input: Value,
            foundry: &Foundry,
            cancel: CancellationToken,
        ) -> Result<Value, FoundryError> {
            let seeded = foundry.get_property("input").unwrap();
            self.inner.execute(seeded, foundry, cancel).await
        }
    }

    let children: Vec<Arc<dyn Operation>> = (0..3)
        .map(|_| {
            Arc::new(Conditional::new(
                "branch",
                double.clone(),
                Arc::new(EchoOperation::new("even")),
                Some(Arc::new(EchoOperation::new("odd"))),
            )) as Arc<dyn Operation>
        })
        .collect();
    let seeded_op = SeedFromProperty {
        id: OperationId::generate(),
        inner: ForEach::new("branch-all", children, DataStrategy::Split, Some(2), None).unwrap(),
    };
    let workflow = Arc::new(
        WorkflowBuilder::new()
            .name("branching-foreach-seeded")
            .operation(Arc::new(seeded_op))
            .build()
            .unwrap(),
    );

    let result = smith.forge_on(workflow, &foundry, CancellationToken::new()).await.unwrap();
    let results = result.downcast_ref::<ForEachResults>().unwrap();
    assert_eq!(results.total_results, 3);
    assert_eq!(results.results[0].downcast_ref::<i32>(), Some(&2));
    assert_eq!(results.results[1].downcast_ref::<i32>(), Some(&3));
    assert_eq!(results.results[2].downcast_ref::<i32>(), Some(&4));
}
