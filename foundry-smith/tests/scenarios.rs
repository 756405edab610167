use foundry_core::test_support::{EchoOperation, FailOperation, RecordingOperation};
use foundry_core::{EventSubscriber, Foundry, FoundryError, Operation, Options, Workflow, WorkflowBuilder, Value};
use foundry_smith::{CompensationEvent, Smith};
use std::sync::{Arc, Mutex};

fn build_workflow(ops: Vec<Arc<dyn Operation>>) -> Arc<Workflow> {
    Arc::new(
        WorkflowBuilder::new()
            .name("wf")
            .operations(ops)
            .build()
            .unwrap(),
    )
}

/// S2. Compensation on middle failure.
#[tokio::test]
async fn s2_compensation_runs_in_reverse_on_middle_failure() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let a: Arc<dyn Operation> = Arc::new(RecordingOperation::new("A", false, log.clone()));
    let b: Arc<dyn Operation> = Arc::new(RecordingOperation::new("B", false, log.clone()));
    let c: Arc<dyn Operation> = Arc::new(RecordingOperation::new("C", true, log.clone()));
    let d: Arc<dyn Operation> = Arc::new(RecordingOperation::new("D", false, log.clone()));
    let workflow = build_workflow(vec![a, b, c, d]);

    let smith = Smith::simple();
    let err = smith.forge(workflow).await.unwrap_err();
    assert!(err.to_string().contains("boom"));

    let recorded = log.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            "execute:A",
            "execute:B",
            "execute:C",
            "restore:B",
            "restore:A",
        ]
    );
}

/// S5. ContinueOnError aggregation.
#[tokio::test]
async fn s5_continue_on_error_runs_every_step_and_aggregates() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let a: Arc<dyn Operation> = Arc::new(RecordingOperation::new("A", false, log.clone()));
    let b: Arc<dyn Operation> = Arc::new(RecordingOperation::new("B", true, log.clone()));
    let c: Arc<dyn Operation> = Arc::new(RecordingOperation::new("C", true, log.clone()));
    let d: Arc<dyn Operation> = Arc::new(RecordingOperation::new("D", false, log.clone()));
    let workflow = build_workflow(vec![a, b, c, d]);

    let smith = Smith::new(
        Arc::new(foundry_core::NullLogger),
        Options {
            continue_on_error: true,
            ..Options::default()
        },
    );
    let err = smith.forge(workflow).await.unwrap_err();
    match err {
        FoundryError::Aggregate(errs) => assert_eq!(errs.len(), 2),
        other => panic!("expected aggregate, got {other:?}"),
    }
    let recorded = log.lock().unwrap().clone();
    assert_eq!(recorded, vec!["execute:A", "execute:B", "execute:C", "execute:D"]);
}

struct Append {
    id: foundry_core::OperationId,
    suffix: &'static str,
}

impl Append {
    fn new(suffix: &'static str) -> Self {
        Append {
            id: foundry_core::OperationId::generate(),
            suffix,
        }
    }
}

#[async_trait::async_trait]
impl Operation for Append {
    fn id(&self) -> &foundry_core::OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        self.suffix
    }

    async fn execute(
        &self,
        input: Value,
        _foundry: &Foundry,
        _cancel: tokio_util::sync::CancellationToken,
    ) -> Result<Value, FoundryError> {
        let current = input.downcast_ref::<String>().cloned().unwrap_or_default();
        Ok(Value::new(format!("{current}{}", self.suffix)))
    }
}

/// §8: a workflow whose operations all report `supports_restore() ==
/// false` still gets a symmetric Triggered/Completed compensation event
/// pair on failure, with nothing actually restored.
#[tokio::test]
async fn compensation_events_fire_even_when_nothing_is_restorable() {
    struct RecordingSubscriber(Mutex<Vec<CompensationEvent>>);

    #[async_trait::async_trait]
    impl EventSubscriber<CompensationEvent> for RecordingSubscriber {
        async fn on_event(&self, event: &CompensationEvent) -> Result<(), FoundryError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    let a: Arc<dyn Operation> = Arc::new(EchoOperation::new("A"));
    let b: Arc<dyn Operation> = Arc::new(FailOperation::new("B", "boom"));
    let workflow = build_workflow(vec![a, b]);

    let smith = Smith::simple();
    let subscriber = Arc::new(RecordingSubscriber(Mutex::new(Vec::new())));
    smith.subscribe_compensation_events(subscriber.clone());

    let err = smith.forge(workflow).await.unwrap_err();
    assert!(err.to_string().contains("boom"));

    let events = subscriber.0.lock().unwrap();
    assert!(matches!(events[0], CompensationEvent::Triggered { .. }));
    match &events[1] {
        CompensationEvent::Completed {
            success_count,
            failure_count,
            ..
        } => {
            assert_eq!(*success_count, 0);
            assert_eq!(*failure_count, 0);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(events.len(), 2);
}

/// S1. Sequential success.
#[tokio::test]
async fn s1_sequential_success_chains_output() {
    let a: Arc<dyn Operation> = Arc::new(Append::new("1"));
    let b: Arc<dyn Operation> = Arc::new(Append::new("2"));
    let c: Arc<dyn Operation> = Arc::new(Append::new("3"));
    let workflow = build_workflow(vec![a, b, c]);

    let foundry = Foundry::simple();
    let smith = Smith::simple();
    let result = smith
        .forge_on(workflow, &foundry, tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    // chaining starts from Value::null(), which downcasts to "" via unwrap_or_default()
    assert_eq!(result.downcast_ref::<String>().unwrap(), "123");
    let last_index = foundry.get_property("Operation.LastCompletedIndex").unwrap();
    assert_eq!(last_index.downcast_ref::<usize>(), Some(&2));
}
