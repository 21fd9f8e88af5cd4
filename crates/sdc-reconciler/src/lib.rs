//! Reconciliation engine turning declared `Resource` objects into
//! published content snapshots.
//!
//! The engine reads the object's source through the component-model
//! collaborators, materializes the content into a scoped working
//! directory, runs the declared middleware plugins over it in a wasm
//! sandbox, and hands the result to the snapshot writer. Status
//! conditions and scheduling follow the Ready / Stalled / Reconciling
//! model: transient failures requeue with backoff, terminal failures
//! stall the object until its spec changes.

mod error;
mod materialize;
mod pipeline;
mod reconciler;
mod resolver;
mod snapshot;
mod status;
mod traits;

pub use error::{MaterializeError, PipelineError, ReconcileError};
pub use pipeline::HOST_BINDING;
pub use reconciler::{Outcome, ReconcilerOptions, ResourceReconciler};
pub use resolver::find_descriptor;
pub use snapshot::generate_snapshot_name;
pub use traits::{
    ClusterClient, ComponentVersion, EventRecorder, ModelClient, ModelContext, ResourceAccess,
    Severity, SnapshotWriter,
};
