//! Object identity and parent-link types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace-scoped identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// The namespace.
    pub namespace: String,
    /// The name, unique within the namespace.
    pub name: String,
}

impl ObjectKey {
    /// Creates a new object key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle link from a dependent object to the object that owns it.
///
/// The store garbage-collects dependents when their owner is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Kind of the owner (e.g. "Workflow").
    pub kind: String,
    /// Name of the owner, in the dependent's namespace.
    pub name: String,
    /// Unique id of the owner.
    pub uid: Uuid,
    /// Whether the owner is the managing controller.
    pub controller: bool,
}

impl OwnerReference {
    /// Creates a controller owner reference.
    #[must_use]
    pub fn controller(kind: impl Into<String>, name: impl Into<String>, uid: Uuid) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            uid,
            controller: true,
        }
    }
}

/// Identity of the workflow a build is produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    /// Namespace and name of the workflow.
    pub key: ObjectKey,
    /// Unique id of the workflow object.
    pub uid: Uuid,
}

impl WorkflowRef {
    /// Kind recorded in owner references.
    pub const KIND: &'static str = "Workflow";

    /// Creates a workflow reference.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: Uuid) -> Self {
        Self {
            key: ObjectKey::new(namespace, name),
            uid,
        }
    }

    /// Returns the owner reference a dependent of this workflow carries.
    #[must_use]
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference::controller(Self::KIND, &self.key.name, self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("default", "greetings").to_string(), "default/greetings");
    }

    #[test]
    fn test_workflow_owner_reference() {
        let uid = Uuid::new_v4();
        let workflow = WorkflowRef::new("default", "greetings", uid);
        let owner = workflow.owner_reference();

        assert_eq!(owner.kind, "Workflow");
        assert_eq!(owner.name, "greetings");
        assert_eq!(owner.uid, uid);
        assert!(owner.controller);
    }
}
