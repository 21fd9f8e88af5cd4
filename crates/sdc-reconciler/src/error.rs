use sdc_sandbox::SandboxError;
use thiserror::Error;

/// Failures of a single reconciliation attempt.
///
/// Everything except [`ReconcileError::StatusPatch`] and the combined
/// variant describes the attempt itself; the two patch variants are
/// produced by the finalization step when persisting status fails.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to get component object '{namespace}/{name}': {source}")]
    GetComponent {
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to get component version: {0}")]
    GetComponentVersion(#[source] anyhow::Error),
    #[error("failed to get resource: {0}")]
    GetResource(#[source] anyhow::Error),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to look up component descriptor: {0}")]
    DescriptorLookup(#[source] anyhow::Error),
    #[error("reference path exceeds the configured depth limit of {limit}")]
    ReferencePathTooDeep { limit: usize },
    #[error("snapshot name should not be empty")]
    MissingSnapshotName,
    #[error("failed to write snapshot: {0}")]
    WriteSnapshot(#[source] anyhow::Error),
    #[error("object is not ready: {0}")]
    NotReady(String),
    #[error("failed to patch object status: {0}")]
    StatusPatch(#[source] anyhow::Error),
    #[error("{attempt}; additionally, failed to patch object status: {patch}")]
    StatusPatchCombined {
        #[source]
        attempt: Box<ReconcileError>,
        patch: anyhow::Error,
    },
}

/// Failures while assembling the working directory contents.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("failed to prepare working directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to download resource content: {0}")]
    Download(#[source] anyhow::Error),
    #[error("failed to rewrite manifest '{path}': {source}")]
    Normalize {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the middleware pipeline. The first faulting entry
/// aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("middleware '{0}' requires an authenticated model context")]
    MissingContext(String),
    #[error("middleware component must be 'name:version', got '{0}'")]
    InvalidComponentRef(String),
    #[error("failed to resolve middleware component '{component}': {source}")]
    Resolve {
        component: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to fetch plugin '{name}': {source}")]
    FetchPlugin {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to encode middleware values: {0}")]
    EncodeValues(#[from] serde_json::Error),
    #[error("middleware '{name}' failed: {source}")]
    Sandbox {
        name: String,
        #[source]
        source: SandboxError,
    },
}
