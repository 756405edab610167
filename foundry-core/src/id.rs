//! Typed ID wrappers for execution, workflow, and operation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up execution IDs, workflow IDs, and
/// operation IDs. They're strings underneath; the engine enforces no format.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, random ID.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(ExecutionId, "Unique identifier for a single Foundry::forge run.");
typed_id!(WorkflowId, "Unique identifier for a Workflow.");
typed_id!(OperationId, "Unique identifier for an Operation instance.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_ids() {
        assert_ne!(ExecutionId::generate(), ExecutionId::generate());
    }

    #[test]
    fn display_matches_inner_string() {
        let id = WorkflowId::new("wf-1");
        assert_eq!(id.to_string(), "wf-1");
        assert_eq!(id.as_str(), "wf-1");
    }
}
