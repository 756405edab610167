//! Test doubles, grounded on `layer0::test_utils`: an echo operation, a
//! failing operation, and a recording logger, gated behind the
//! `test-utils` feature (also available unconditionally to this crate's
//! own unit tests).

use crate::error::FoundryError;
use crate::foundry::Foundry;
use crate::id::OperationId;
use crate::logging::{Field, Logger, NullLogger};
use crate::operation::Operation;
use crate::options::Options;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Returns its input unchanged. Does not support restore.
pub struct EchoOperation {
    id: OperationId,
    name: String,
}

impl EchoOperation {
    /// Build a new echo operation with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        EchoOperation {
            id: OperationId::generate(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl Operation for EchoOperation {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        input: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        Ok(input)
    }
}

/// Always fails with the configured message, wrapped as
/// [`FoundryError::OperationFailure`].
pub struct FailOperation {
    id: OperationId,
    name: String,
    message: String,
}

impl FailOperation {
    /// Build a new operation that always fails with `message`.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        FailOperation {
            id: OperationId::generate(),
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Operation for FailOperation {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _input: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        Err(FoundryError::OperationFailure {
            execution_id: crate::id::ExecutionId::new("test"),
            workflow_id: None,
            operation_name: self.name.clone(),
            operation_id: self.id.clone(),
            cause: self.message.clone().into(),
        })
    }
}

/// A restorable operation that records every `execute`/`restore` call by
/// name, for assertions about compensation order.
pub struct RecordingOperation {
    id: OperationId,
    name: String,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingOperation {
    /// Build an operation sharing `log` with its siblings, so a test can
    /// assert the full execute/restore sequence across a workflow.
    pub fn new(name: impl Into<String>, fail: bool, log: Arc<Mutex<Vec<String>>>) -> Self {
        RecordingOperation {
            id: OperationId::generate(),
            name: name.into(),
            fail,
            log,
        }
    }
}

#[async_trait]
impl Operation for RecordingOperation {
    fn id(&self) -> &OperationId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_restore(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        input: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<Value, FoundryError> {
        self.log.lock().unwrap().push(format!("execute:{}", self.name));
        if self.fail {
            return Err(FoundryError::OperationFailure {
                execution_id: crate::id::ExecutionId::new("test"),
                workflow_id: None,
                operation_name: self.name.clone(),
                operation_id: self.id.clone(),
                cause: "boom".into(),
            });
        }
        Ok(input)
    }

    async fn restore(
        &self,
        _output: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<(), FoundryError> {
        self.log.lock().unwrap().push(format!("restore:{}", self.name));
        Ok(())
    }
}

/// Captures every logged line behind a mutex, for assertions.
#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(String, String)>>,
}

impl RecordingLogger {
    /// A fresh, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(level, message)` pair logged so far.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().unwrap().clone()
    }

    fn record(&self, level: &str, message: &str) {
        self.lines.lock().unwrap().push((level.to_string(), message.to_string()));
    }
}

impl Logger for RecordingLogger {
    fn trace(&self, message: &str, _fields: &[Field]) {
        self.record("trace", message);
    }
    fn debug(&self, message: &str, _fields: &[Field]) {
        self.record("debug", message);
    }
    fn info(&self, message: &str, _fields: &[Field]) {
        self.record("info", message);
    }
    fn warn(&self, message: &str, _fields: &[Field]) {
        self.record("warn", message);
    }
    fn error(&self, message: &str, _fields: &[Field]) {
        self.record("error", message);
    }
    fn critical(&self, message: &str, _fields: &[Field]) {
        self.record("critical", message);
    }

    fn child(&self, _fields: Vec<Field>) -> Arc<dyn Logger> {
        Arc::new(NullLogger)
    }
}

/// A Foundry with a `NullLogger` and default options, for tests that only
/// need somewhere to run operations.
pub fn fixed_foundry() -> Foundry {
    Foundry::new(Arc::new(NullLogger), Options::default())
}
