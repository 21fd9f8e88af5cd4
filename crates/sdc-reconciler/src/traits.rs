//! Collaborator seams of the reconciler.
//!
//! The engine drives everything through these traits and owns none of
//! the implementations. All of them are synchronous; an async caller
//! can wrap them as needed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sdc_api::{Component, Resource};
use sdc_model::{AccessSpec, ComponentDescriptor, DescriptorRef, Identity};

/// Read/write access to the object store holding `Resource` and
/// `Component` objects and their descriptors.
pub trait ClusterClient: Send + Sync {
    /// Fetch a component object by namespace and name. `Ok(None)`
    /// means the object does not exist.
    fn get_component(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Component>>;

    /// Fetch a stored component descriptor. `Ok(None)` means the
    /// descriptor does not exist.
    fn get_descriptor(&self, reference: &DescriptorRef)
        -> anyhow::Result<Option<ComponentDescriptor>>;

    /// Persist the object's current status block.
    fn patch_status(&self, object: &Resource) -> anyhow::Result<()>;
}

/// Entry point into the component model: builds authenticated
/// contexts and resolves component versions.
pub trait ModelClient: Send + Sync {
    /// Build an authenticated context for the component's registry
    /// credentials. Failure here is soft; the reconciler continues
    /// without a context.
    fn create_authenticated_context(
        &self,
        component: &Component,
    ) -> anyhow::Result<Box<dyn ModelContext>>;

    /// Resolve the component version the parent object points at,
    /// optionally through an authenticated context.
    fn get_component_version(
        &self,
        context: Option<&dyn ModelContext>,
        component: &Component,
    ) -> anyhow::Result<Arc<dyn ComponentVersion>>;
}

/// An authenticated session against one or more registries.
pub trait ModelContext: Send + Sync {
    /// Resolve an arbitrary component version in a named registry.
    /// Used by the pipeline for independently hosted middleware
    /// components.
    fn lookup_component_version(
        &self,
        registry: &str,
        name: &str,
        version: &str,
    ) -> anyhow::Result<Arc<dyn ComponentVersion>>;
}

/// A resolved component version and its named resources.
pub trait ComponentVersion: Send + Sync {
    fn version(&self) -> &str;

    fn get_resource(&self, name: &str) -> anyhow::Result<Box<dyn ResourceAccess>>;
}

/// Handle on one resource inside a component version.
pub trait ResourceAccess: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// The resource's access specification, used to derive an
    /// external reference without fetching content.
    fn access(&self) -> anyhow::Result<AccessSpec>;

    /// Fetch the resource content into memory. Used for small blobs
    /// such as plugin binaries.
    fn get(&self) -> anyhow::Result<Vec<u8>>;

    /// Download the resource content into `dir`.
    fn download_to(&self, dir: &Path) -> anyhow::Result<()>;
}

/// Sink for the finished artifact. Receives the working directory
/// contents and the computed identity, returns the persisted snapshot
/// version.
pub trait SnapshotWriter: Send + Sync {
    fn write(&self, owner: &Resource, content: &Path, identity: &Identity)
        -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Outbound notification channel for operator-visible events.
pub trait EventRecorder: Send + Sync {
    fn event(
        &self,
        object: &Resource,
        severity: Severity,
        message: &str,
        metadata: Option<BTreeMap<String, String>>,
    );
}
