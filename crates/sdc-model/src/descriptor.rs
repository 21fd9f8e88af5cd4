use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a stored component descriptor object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorRef {
    pub name: String,
    pub namespace: String,
}

impl DescriptorRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// A versioned node in the component reference graph.
///
/// Descriptors are owned by the component-model client and read-only
/// to the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub references: Vec<ComponentReference>,
}

/// A named resource declared by a component descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub extra_identity: BTreeMap<String, String>,
}

/// A named edge to a child descriptor in the reference graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReference {
    /// Reference name, the key used in an object's reference path.
    pub name: String,
    /// Fully qualified name of the referenced component.
    pub component_name: String,
    pub version: String,
    /// Where the child descriptor object lives.
    pub descriptor_ref: DescriptorRef,
}
