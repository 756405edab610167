//! The operation event surface (spec §6) and the generic subscriber
//! registry it's dispatched through.
//!
//! Grounded on `neuron_hooks::HookRegistry::dispatch`: subscribers are
//! collected under a snapshot, invoked in registration order, and any
//! subscriber error is logged and dropped — it never propagates into
//! workflow execution (invariant 6, spec §3).

use crate::duration::DurationMs;
use crate::error::FoundryError;
use crate::id::OperationId;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Events emitted around a single operation's execution.
#[derive(Debug, Clone)]
pub enum OperationEvent {
    /// The step is about to be dispatched.
    Started {
        /// The operation about to run.
        operation_id: OperationId,
        /// Its declared name.
        operation_name: String,
    },
    /// The step completed successfully.
    Completed {
        /// The operation that ran.
        operation_id: OperationId,
        /// Its declared name.
        operation_name: String,
        /// The value it returned.
        result: Value,
        /// How long it took.
        duration: DurationMs,
    },
    /// The step failed.
    Failed {
        /// The operation that ran.
        operation_id: OperationId,
        /// Its declared name.
        operation_name: String,
        /// A rendering of the failure (subscriber-facing; the real error
        /// already propagates through the return value).
        error: String,
        /// How long it ran before failing.
        duration: DurationMs,
    },
}

/// A subscriber to events of type `E`.
#[async_trait]
pub trait EventSubscriber<E>: Send + Sync {
    /// Handle one event. Any `Err` is logged and discarded by the bus —
    /// it never affects the outcome of the operation being observed.
    async fn on_event(&self, event: &E) -> Result<(), FoundryError>;
}

/// A registry of subscribers for events of type `E`.
///
/// Emission iterates a snapshot of the subscriber list (cloning the `Arc`s
/// under a short-lived read lock, mirroring `HookRegistry::dispatch`), so a
/// subscriber added mid-emission cannot observe or be observed by the
/// in-flight emission.
pub struct EventBus<E> {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber<E>>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        EventBus {
            subscribers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> EventBus<E> {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are invoked in registration
    /// order on every subsequent emission.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber<E>>) {
        self.subscribers.write().unwrap().push(subscriber);
    }

    /// How many subscribers are currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }

    /// Emit an event to every subscriber. Each subscriber's error is
    /// logged at error level and dropped; emission never alters the
    /// emitting operation's success/failure outcome.
    pub async fn emit(&self, event: E, logger: &dyn crate::logging::Logger) {
        let snapshot: Vec<_> = self.subscribers.read().unwrap().iter().cloned().collect();
        for subscriber in snapshot {
            if let Err(err) = subscriber.on_event(&event).await {
                logger.error(
                    "event subscriber failed",
                    &[("error", err.to_string())],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber(Arc<AtomicUsize>);

    #[async_trait]
    impl EventSubscriber<OperationEvent> for CountingSubscriber {
        async fn on_event(&self, _event: &OperationEvent) -> Result<(), FoundryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSubscriber;

    #[async_trait]
    impl EventSubscriber<OperationEvent> for FailingSubscriber {
        async fn on_event(&self, _event: &OperationEvent) -> Result<(), FoundryError> {
            Err(FoundryError::Other("subscriber blew up".into()))
        }
    }

    #[tokio::test]
    async fn emit_reaches_every_subscriber_in_order() {
        let bus: EventBus<OperationEvent> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.emit(
            OperationEvent::Started {
                operation_id: OperationId::new("op-1"),
                operation_name: "op".into(),
            },
            &NullLogger,
        )
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failing_subscriber_does_not_stop_the_rest() {
        let bus: EventBus<OperationEvent> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(FailingSubscriber));
        bus.subscribe(Arc::new(CountingSubscriber(count.clone())));
        bus.emit(
            OperationEvent::Started {
                operation_id: OperationId::new("op-1"),
                operation_name: "op".into(),
            },
            &NullLogger,
        )
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
