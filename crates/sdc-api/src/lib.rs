//! Desired-state object types for the snapshot delivery controller.
//!
//! These mirror the externally authored objects the engine reconciles:
//! the `Resource` object describing what to materialize, the parent
//! `Component` object it points at, and the status condition set the
//! engine writes back.

mod condition;
mod resource;

pub use condition::{
    reason, Condition, ConditionStatus, Conditions, READY_CONDITION, RECONCILING_CONDITION,
    STALLED_CONDITION,
};
pub use resource::{
    Component, ComponentStatus, MiddlewareSpec, Resource, ResourceRef, ResourceSpec,
    ResourceStatus, SourceRef,
};
