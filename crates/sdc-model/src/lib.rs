//! Component-model data types shared across the delivery controller.
//!
//! Everything in this crate is plain data: descriptor graph nodes,
//! snapshot identities, and resource access specifications. Network
//! and registry concerns live behind the collaborator traits in
//! `sdc-reconciler`.

mod access;
mod descriptor;
mod identity;

pub use access::{dereference, AccessError, AccessSpec};
pub use descriptor::{ComponentDescriptor, ComponentReference, DescriptorRef, ResourceEntry};
pub use identity::{
    Identity, COMPONENT_NAME_KEY, COMPONENT_VERSION_KEY, RESOURCE_NAME_KEY, RESOURCE_VERSION_KEY,
};
