//! Workflow: an immutable, ordered sequence of operations plus metadata
//! (spec §3), and the builder that assembles one.

use crate::error::FoundryError;
use crate::id::WorkflowId;
use crate::operation::Operation;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// An immutable, ordered sequence of operations plus metadata.
///
/// Created by [`WorkflowBuilder`]; passed to `Smith::forge` any number of
/// times; disposed by its owner (which disposes each operation exactly
/// once).
pub struct Workflow {
    id: WorkflowId,
    name: String,
    description: Option<String>,
    version: String,
    operations: Vec<Arc<dyn Operation>>,
    properties: HashMap<String, Value>,
    created_at: SystemTime,
}

impl Workflow {
    /// Unique id.
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    /// Non-empty name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional human-readable description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Semantic version, defaults to `"1.0.0"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The ordered operations this workflow runs, length &ge; 1.
    pub fn operations(&self) -> &[Arc<dyn Operation>] {
        &self.operations
    }

    /// Read-only metadata properties attached at build time.
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// When this workflow was built.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Dispose every operation exactly once, swallowing each operation's
    /// own dispose failure (operations are specified to never let dispose
    /// throw across the engine boundary; this is belt-and-suspenders for
    /// implementations that panic internally on a caught `Result` anyway).
    pub async fn dispose(&self) {
        for op in &self.operations {
            op.dispose().await;
        }
    }
}

/// Assembles a [`Workflow`] from operations and metadata, with validation
/// (invariant 1, spec §3: at least one operation, a non-empty name).
#[derive(Default)]
pub struct WorkflowBuilder {
    id: Option<WorkflowId>,
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    operations: Vec<Arc<dyn Operation>>,
    properties: HashMap<String, Value>,
}

impl WorkflowBuilder {
    /// Start a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit workflow id; if omitted, one is generated.
    pub fn id(mut self, id: impl Into<WorkflowId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the workflow name. Required.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an optional description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the version string. Defaults to `"1.0.0"` if never called.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Append one operation to the end of the sequence.
    pub fn operation(mut self, op: Arc<dyn Operation>) -> Self {
        self.operations.push(op);
        self
    }

    /// Append several operations to the end of the sequence.
    pub fn operations(mut self, ops: impl IntoIterator<Item = Arc<dyn Operation>>) -> Self {
        self.operations.extend(ops);
        self
    }

    /// Attach a read-only metadata property, merged into the Foundry's
    /// property store when this workflow is bound (supplemented feature;
    /// see SPEC_FULL.md).
    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Validate and construct the workflow.
    pub fn build(self) -> Result<Workflow, FoundryError> {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FoundryError::InvalidArgument("workflow name must be non-empty".into()))?;
        if self.operations.is_empty() {
            return Err(FoundryError::InvalidArgument(
                "workflow must have at least one operation".into(),
            ));
        }
        Ok(Workflow {
            id: self.id.unwrap_or_else(WorkflowId::generate),
            name,
            description: self.description,
            version: self.version.unwrap_or_else(|| "1.0.0".to_string()),
            operations: self.operations,
            properties: self.properties,
            created_at: SystemTime::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EchoOperation;

    #[test]
    fn build_fails_without_operations() {
        let err = WorkflowBuilder::new().name("wf").build().unwrap_err();
        assert!(matches!(err, FoundryError::InvalidArgument(_)));
    }

    #[test]
    fn build_fails_without_name() {
        let op: Arc<dyn Operation> = Arc::new(EchoOperation::new("op"));
        let err = WorkflowBuilder::new().operation(op).build().unwrap_err();
        assert!(matches!(err, FoundryError::InvalidArgument(_)));
    }

    #[test]
    fn build_defaults_version_to_1_0_0() {
        let op: Arc<dyn Operation> = Arc::new(EchoOperation::new("op"));
        let wf = WorkflowBuilder::new().name("wf").operation(op).build().unwrap();
        assert_eq!(wf.version(), "1.0.0");
        assert_eq!(wf.operations().len(), 1);
    }
}
