use crate::condition::Conditions;
use sdc_model::DescriptorRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Externally authored object describing a resource to materialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub namespace: String,
    /// Spec generation counter, bumped by the external actor on edits.
    pub generation: i64,
    pub spec: ResourceSpec,
    #[serde(default)]
    pub status: ResourceStatus,
}

impl Resource {
    /// The configured poll interval used as the success requeue.
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.spec.interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub source_ref: SourceRef,
    #[serde(default)]
    pub middleware: Vec<MiddlewareSpec>,
    #[serde(default)]
    pub suspend: bool,
    /// Poll interval in seconds between successful reconciliations.
    pub interval_seconds: u64,
}

/// Pointer to the parent Component object plus the named resource to
/// extract from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub name: String,
    /// Defaults to the object's own namespace when unset.
    #[serde(default)]
    pub namespace: Option<String>,
    pub resource_ref: ResourceRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub extra_identity: BTreeMap<String, String>,
    /// Ordered reference names locating the owning descriptor in the
    /// component reference graph. Empty means the root component.
    #[serde(default)]
    pub reference_path: Vec<String>,
}

/// One sandboxed transformation step, versioned and distributed
/// independently of the content it transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareSpec {
    /// Resource name of the plugin binary inside its hosting component.
    pub name: String,
    /// Registry holding the plugin's hosting component.
    pub registry: String,
    /// Hosting component as `name:version`.
    pub component: String,
    /// Raw configuration payload handed to the plugin's entry point.
    #[serde(default)]
    pub values: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Generation last fully processed; -1 until first initialised.
    pub observed_generation: i64,
    #[serde(default)]
    pub snapshot_name: String,
    #[serde(default)]
    pub last_applied_resource_version: String,
    #[serde(default)]
    pub last_applied_component_version: String,
    #[serde(default)]
    pub conditions: Conditions,
}

impl Default for ResourceStatus {
    fn default() -> Self {
        Self {
            observed_generation: -1,
            snapshot_name: String::new(),
            last_applied_resource_version: String::new(),
            last_applied_component_version: String::new(),
            conditions: Conditions::default(),
        }
    }
}

/// The parent Component object a Resource's source reference points
/// at. Owned by the component controller; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub namespace: String,
    pub status: ComponentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Component version most recently reconciled by its own controller.
    pub reconciled_version: String,
    /// Root descriptor for the reconciled version.
    pub component_descriptor: DescriptorRef,
}
